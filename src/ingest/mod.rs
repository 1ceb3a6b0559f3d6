//! Marketing-webhook payload normalization.
//!
//! Lead webhooks arrive in several vendor shapes that put the same logical
//! field in different nested locations. Rather than chaining optional
//! lookups inline at call sites, each logical field carries an explicit
//! precedence list of JSON paths (try the first, then the next), encoded as
//! const data so the order is inspectable and testable. Normalization
//! produces one canonical [`LeadRecord`]; a payload with no resolvable email
//! is rejected as invalid rather than stored half-empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Canonical lead record produced from any supported webhook shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Contact email. The only mandatory field.
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Originating channel, e.g. "facebook", "website".
    pub source: Option<String>,
    pub campaign_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Field precedence tables
// ─────────────────────────────────────────────────────────────────────────────
//
// Order within each table is the resolution order. Earlier paths belong to
// newer webhook shapes; the trailing entries cover legacy vendors still
// posting the old layout.

const EMAIL_PATHS: &[&[&str]] = &[
    &["email"],
    &["lead", "email"],
    &["contact", "email"],
    &["data", "email_address"],
];

const NAME_PATHS: &[&[&str]] = &[
    &["name"],
    &["full_name"],
    &["lead", "name"],
    &["contact", "name"],
];

const PHONE_PATHS: &[&[&str]] = &[
    &["phone"],
    &["phone_number"],
    &["lead", "phone"],
    &["contact", "phone"],
];

const SOURCE_PATHS: &[&[&str]] = &[&["source"], &["lead", "source"], &["meta", "source"]];

const CAMPAIGN_ID_PATHS: &[&[&str]] = &[
    &["campaign_id"],
    &["campaign", "id"],
    &["meta", "campaign_id"],
];

/// Normalize a loosely-typed webhook body into a [`LeadRecord`].
///
/// Returns a validation error when no precedence path yields an email.
pub fn normalize_lead(payload: &Value) -> Result<LeadRecord> {
    let email = resolve_string(payload, EMAIL_PATHS).ok_or_else(|| {
        CoreError::Validation("lead payload has no resolvable email".to_string())
    })?;

    let record = LeadRecord {
        email,
        name: resolve_string(payload, NAME_PATHS),
        phone: resolve_string(payload, PHONE_PATHS),
        source: resolve_string(payload, SOURCE_PATHS),
        campaign_id: resolve_string(payload, CAMPAIGN_ID_PATHS),
    };

    debug!(email = %record.email, source = ?record.source, "Normalized lead payload");
    Ok(record)
}

/// Resolve the first non-empty string found along a precedence list.
fn resolve_string(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        let value = lookup(payload, path)?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            // Numeric campaign ids show up from one vendor.
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

/// Walk one nested path.
fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |current, segment| current.get(segment))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
