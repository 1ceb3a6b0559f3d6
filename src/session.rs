//! Session types and session resolution.
//!
//! The core does not authenticate anyone itself: sessions are produced by an
//! external authentication collaborator and consumed read-only by the RBAC
//! gate. [`SessionResolver`] is the seam where that collaborator plugs in;
//! [`TokenTableResolver`] is a small in-memory implementation used for tests
//! and local wiring.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::rbac::Role;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_uuid() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════════

/// An authenticated user's session, as produced by the upstream
/// authentication collaborator.
///
/// Consumed read-only by this core; never created, mutated, or persisted
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// User identifier.
    pub id: UserId,
    /// User email (actor identity in audit logs).
    pub email: String,
    /// The user's role.
    pub role: Role,
    /// Department the user belongs to, if assigned.
    pub department: Option<String>,
}

impl Session {
    /// Build a session record.
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            email: email.into(),
            role,
            department: None,
        }
    }

    /// Attach a department.
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves the current session from an inbound request.
///
/// The production implementation calls the authentication service; its I/O,
/// caching, and cancellation policies are its own. `None` means the request
/// is unauthenticated, which is an expected state, not an error.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// In-memory resolver mapping bearer tokens to sessions.
///
/// Intended for tests and local wiring, mirroring the shape of the real
/// session store without the network hop.
#[derive(Debug, Clone, Default)]
pub struct TokenTableResolver {
    sessions: HashMap<String, Session>,
}

impl TokenTableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token → session mapping.
    pub fn insert(mut self, token: impl Into<String>, session: Session) -> Self {
        self.sessions.insert(token.into(), session);
        self
    }

    pub fn into_shared(self) -> Arc<dyn SessionResolver> {
        Arc::new(self)
    }

    fn extract_token(headers: &HeaderMap) -> Option<&str> {
        headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
    }
}

#[async_trait]
impl SessionResolver for TokenTableResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = Self::extract_token(headers)?;
        self.sessions.get(token).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_token_table_resolves_known_token() {
        let resolver = TokenTableResolver::new().insert(
            "tok-1",
            Session::new("u1", "ana@shavi.academy", Role::Hr).with_department("hr"),
        );

        let session = resolver.resolve(&headers_with_token("tok-1")).await.unwrap();
        assert_eq!(session.email, "ana@shavi.academy");
        assert_eq!(session.role, Role::Hr);
        assert_eq!(session.department.as_deref(), Some("hr"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let resolver = TokenTableResolver::new();
        assert!(resolver.resolve(&headers_with_token("nope")).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let resolver = TokenTableResolver::new()
            .insert("tok-1", Session::new("u1", "a@b.c", Role::User));
        assert!(resolver.resolve(&HeaderMap::new()).await.is_none());
    }

    #[test]
    fn test_session_serialization_round_trip() {
        let session = Session::new("u-9", "ops@shavi.academy", Role::Operations);
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"operations\""));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::Operations);
    }
}
