//! Coarse, path-prefix-based route gating.
//!
//! Applied once per request by the edge middleware, before any handler
//! dispatch. The decision table is evaluated top to bottom, first match
//! wins:
//!
//! 1. no session and the path is under the tech console → redirect to login,
//!    preserving the requested path for the post-login hop
//! 2. super-role (admin, developer, manager) → permit anywhere, except that
//!    manager is denied the tech console, the single most-sensitive subtree
//! 3. role matches the department the path prefix implies → permit
//! 4. everything else → redirect to the landing page
//!
//! The gate is a pure function of (session, path); the redirect decision is
//! its only output.

use super::roles::Role;
use crate::session::Session;

/// Subtree reserved for admin and developer tooling.
pub const TECH_CONSOLE_PREFIX: &str = "/tech-console";

/// Department subtrees and the role each one implies. Matching is exact on
/// the leading path segment.
pub const DEPARTMENT_PREFIXES: &[(&str, Role)] = &[
    ("/sales", Role::Sales),
    ("/support", Role::CustomerSuccess),
    ("/hr", Role::Hr),
    ("/finance", Role::Finance),
    ("/operations", Role::Operations),
    ("/training", Role::Trainer),
];

/// Outcome of the path-prefix gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Let the request through to the router.
    Permit,
    /// Send the caller to login, carrying the originally requested path.
    RedirectToLogin { next: String },
    /// Send the caller to a safe landing page.
    Redirect { to: String },
}

impl RouteDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::Permit)
    }
}

/// The path-prefix gate with its redirect targets.
#[derive(Debug, Clone)]
pub struct PathGate {
    login_path: String,
    landing_path: String,
}

impl Default for PathGate {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            landing_path: "/dashboard".to_string(),
        }
    }
}

impl PathGate {
    pub fn new(login_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            landing_path: landing_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Evaluate the decision table for a request.
    pub fn evaluate(&self, session: Option<&Session>, path: &str) -> RouteDecision {
        let under_console = path_has_prefix(path, TECH_CONSOLE_PREFIX);

        let session = match session {
            Some(s) => s,
            None if under_console => {
                return RouteDecision::RedirectToLogin {
                    next: path.to_string(),
                };
            }
            None => {
                return RouteDecision::Redirect {
                    to: self.landing_path.clone(),
                };
            }
        };

        if session.role.is_super() {
            // Manager is trusted everywhere but the console.
            if session.role == Role::Manager && under_console {
                return RouteDecision::Redirect {
                    to: self.landing_path.clone(),
                };
            }
            return RouteDecision::Permit;
        }

        if department_for_path(path) == Some(session.role) {
            return RouteDecision::Permit;
        }

        RouteDecision::Redirect {
            to: self.landing_path.clone(),
        }
    }
}

/// Resolve the role a path prefix implies, if any.
pub fn department_for_path(path: &str) -> Option<Role> {
    DEPARTMENT_PREFIXES
        .iter()
        .find(|(prefix, _)| path_has_prefix(path, prefix))
        .map(|(_, role)| *role)
}

/// Prefix match on a segment boundary: `/hr` covers `/hr` and `/hr/payroll`
/// but not `/hresources`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
