//! Operation-level authorization gate.
//!
//! Every sensitive server operation calls [`authorize`] at entry with the
//! policy describing who may perform it. The gate answers with the resolved
//! session (so the handler can proceed) or a classified denial:
//! `Unauthenticated` when no session exists, `Forbidden` when the session's
//! role is not in the allow-list. The HTTP layer decides what each
//! classification becomes (login prompt vs. access-denied); the gate only
//! classifies.
//!
//! Policies are explicit named values constructed once in [`policies`] and
//! referenced by name, instead of ad hoc role arrays duplicated at call
//! sites. Call sites that genuinely need a one-off list can still use
//! [`authorize_roles`].

use metrics::counter;
use tracing::{error, warn};

use super::roles::Role;
use crate::error::{CoreError, Result};
use crate::session::Session;

// ═══════════════════════════════════════════════════════════════════════════════
// Operation Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// A protected operation's allow-list, constructed once and referenced by
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPolicy {
    /// Operation name, used in audit logs.
    pub name: &'static str,
    /// Roles permitted to perform the operation. Exact membership, no
    /// hierarchy: a role absent from the list is denied even if it is a
    /// super-role elsewhere.
    pub allowed: &'static [Role],
}

impl OperationPolicy {
    pub const fn new(name: &'static str, allowed: &'static [Role]) -> Self {
        Self { name, allowed }
    }

    /// Check whether a role is in the allow-list.
    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

/// The central policy table for Shavi Academy OS server operations.
///
/// Keeping these in one place is what prevents the allow-lists from drifting
/// apart as handlers multiply.
pub mod policies {
    use super::OperationPolicy;
    use crate::rbac::Role;

    pub const ASSIGN_TICKET: OperationPolicy =
        OperationPolicy::new("assignTicket", &[Role::Admin, Role::Manager]);

    pub const UPDATE_TICKET_STATUS: OperationPolicy = OperationPolicy::new(
        "updateTicketStatus",
        &[Role::Admin, Role::Manager, Role::CustomerSuccess],
    );

    pub const CREATE_DEAL: OperationPolicy =
        OperationPolicy::new("createDeal", &[Role::Admin, Role::Manager, Role::Sales]);

    pub const UPDATE_DEAL_STAGE: OperationPolicy = OperationPolicy::new(
        "updateDealStage",
        &[Role::Admin, Role::Manager, Role::Sales],
    );

    pub const CONVERT_LEAD: OperationPolicy =
        OperationPolicy::new("convertLead", &[Role::Admin, Role::Manager, Role::Sales]);

    pub const DELETE_CAMPAIGN: OperationPolicy =
        OperationPolicy::new("deleteCampaign", &[Role::Admin, Role::Manager]);

    pub const GENERATE_PAYROLL: OperationPolicy =
        OperationPolicy::new("generatePayroll", &[Role::Admin, Role::Hr]);

    pub const APPROVE_PAYROLL: OperationPolicy =
        OperationPolicy::new("approvePayroll", &[Role::Admin, Role::Hr, Role::Finance]);

    pub const RECORD_EXPENSE: OperationPolicy =
        OperationPolicy::new("recordExpense", &[Role::Admin, Role::Finance]);

    pub const ENROLL_STUDENT: OperationPolicy = OperationPolicy::new(
        "enrollStudent",
        &[Role::Admin, Role::Manager, Role::Operations, Role::Trainer],
    );

    pub const MANAGE_USERS: OperationPolicy =
        OperationPolicy::new("manageUsers", &[Role::Admin, Role::Developer]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════════════════════════

/// Authorize an operation under a named policy.
///
/// Returns the session for the caller to proceed with, or a classified
/// denial. Denials are logged here with the audit fields the policy
/// requires; successes are not logged (the resulting data mutation is the
/// caller's to log). The gate itself mutates nothing.
pub fn authorize(policy: &OperationPolicy, session: Option<&Session>) -> Result<Session> {
    authorize_roles(policy.name, policy.allowed, session)
}

/// Authorize an operation against an explicit allow-list.
pub fn authorize_roles(
    operation: &str,
    allowed: &[Role],
    session: Option<&Session>,
) -> Result<Session> {
    let session = match session {
        Some(s) => s,
        None => {
            warn!(operation = %operation, "Operation denied: no session");
            record_decision(operation, "unauthenticated");
            return Err(CoreError::unauthenticated(operation));
        }
    };

    if !allowed.contains(&session.role) {
        error!(
            operation = %operation,
            actor = %session.email,
            role = %session.role,
            "Operation denied: role not permitted"
        );
        record_decision(operation, "forbidden");
        return Err(CoreError::forbidden(
            operation,
            session.email.clone(),
            session.role.as_str(),
        ));
    }

    record_decision(operation, "permitted");
    Ok(session.clone())
}

fn record_decision(operation: &str, outcome: &'static str) {
    counter!(
        "shavi_authorization_decisions_total",
        "operation" => operation.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn session(role: Role) -> Session {
        Session::new("u1", "actor@shavi.academy", role)
    }

    #[test]
    fn test_permitted_role_gets_session_back() {
        let result = authorize(&policies::ASSIGN_TICKET, Some(&session(Role::Manager)));
        let resolved = result.unwrap();
        assert_eq!(resolved.role, Role::Manager);
        assert_eq!(resolved.email, "actor@shavi.academy");
    }

    #[test]
    fn test_wrong_role_is_forbidden() {
        let err = authorize(&policies::ASSIGN_TICKET, Some(&session(Role::CustomerSuccess)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_no_session_is_unauthenticated() {
        let err = authorize(&policies::ASSIGN_TICKET, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthenticated);
    }

    #[test]
    fn test_no_implicit_super_role_grant() {
        // Developer is a super-role at the path gate but is not listed on
        // generatePayroll, so the operation gate denies it.
        let err =
            authorize(&policies::GENERATE_PAYROLL, Some(&session(Role::Developer))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_membership_is_exact_and_case_sensitive() {
        // The enum makes near-miss strings unrepresentable; the closest
        // runtime equivalent is an unknown role string failing to parse.
        assert_eq!(Role::parse("Manager"), None);
        assert!(policies::ASSIGN_TICKET.permits(Role::Manager));
        assert!(!policies::ASSIGN_TICKET.permits(Role::User));
    }

    #[test]
    fn test_ad_hoc_allow_list() {
        let allowed = [Role::Finance];
        assert!(authorize_roles("closeBooks", &allowed, Some(&session(Role::Finance))).is_ok());
        assert!(authorize_roles("closeBooks", &allowed, Some(&session(Role::Hr))).is_err());
    }

    #[test]
    fn test_denial_does_not_mutate_session() {
        let s = session(Role::User);
        let before = s.clone();
        let _ = authorize(&policies::ASSIGN_TICKET, Some(&s));
        assert_eq!(s.email, before.email);
        assert_eq!(s.role, before.role);
    }
}
