//! The closed role enumeration used across Shavi Academy OS.
//!
//! | Role             | Description                                          |
//! |------------------|------------------------------------------------------|
//! | Admin            | Full access to every subtree and operation           |
//! | Developer        | Full access, including the tech console              |
//! | Manager          | Full access except the tech console                  |
//! | Sales            | Sales pipeline subtree                               |
//! | CustomerSuccess  | Support ticketing subtree                            |
//! | Hr               | HR and payroll subtree                               |
//! | Finance          | Finance subtree                                      |
//! | Operations       | Operations dashboards subtree                        |
//! | Trainer          | Training delivery subtree                            |
//! | User             | Baseline authenticated user, no department subtree   |
//!
//! Roles are compared by exact variant: there is no inheritance or hierarchy
//! beyond the super-role set, and whatever a call site wants granted it must
//! list explicitly in its allow-list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user role. Closed enumeration; unknown role strings do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Developer,
    Manager,
    Sales,
    CustomerSuccess,
    Hr,
    Finance,
    Operations,
    Trainer,
    User,
}

/// Roles trusted everywhere by the path-prefix gate. Manager is carved out of
/// the tech console only; see [`super::path_gate`].
pub const SUPER_ROLES: &[Role] = &[Role::Admin, Role::Developer, Role::Manager];

impl Role {
    /// Get the canonical (case-sensitive) string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Developer => "developer",
            Self::Manager => "manager",
            Self::Sales => "sales",
            Self::CustomerSuccess => "customer_success",
            Self::Hr => "hr",
            Self::Finance => "finance",
            Self::Operations => "operations",
            Self::Trainer => "trainer",
            Self::User => "user",
        }
    }

    /// Parse a role from its canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "developer" => Some(Self::Developer),
            "manager" => Some(Self::Manager),
            "sales" => Some(Self::Sales),
            "customer_success" => Some(Self::CustomerSuccess),
            "hr" => Some(Self::Hr),
            "finance" => Some(Self::Finance),
            "operations" => Some(Self::Operations),
            "trainer" => Some(Self::Trainer),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    /// Check membership in the trusted super-role set.
    pub fn is_super(&self) -> bool {
        SUPER_ROLES.contains(self)
    }

    /// Return all roles.
    pub fn all() -> Vec<Role> {
        vec![
            Self::Admin,
            Self::Developer,
            Self::Manager,
            Self::Sales,
            Self::CustomerSuccess,
            Self::Hr,
            Self::Finance,
            Self::Operations,
            Self::Trainer,
            Self::User,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
