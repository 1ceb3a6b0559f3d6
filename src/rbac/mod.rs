//! Role-Based Access Control for Shavi Academy OS.
//!
//! Authorization happens at two granularities:
//! - **Path-prefix gate** ([`path_gate`]): coarse gating of whole route
//!   subtrees, evaluated once per request by the edge middleware before
//!   handler dispatch.
//! - **Operation gate** ([`policy`]): fine, per-operation allow-list checks
//!   invoked synchronously at the top of every sensitive server action.
//!
//! Roles are a closed enumeration ([`roles::Role`]); allow-lists are exact
//! membership tests with no inheritance. The two denial classifications,
//! `Unauthenticated` and `Forbidden`, stay distinct all the way to the HTTP
//! layer so it can choose between prompting login and showing access-denied.

pub mod middleware;
pub mod path_gate;
pub mod policy;
pub mod roles;

pub use middleware::{AccessControlLayer, AccessControlService};
pub use path_gate::{department_for_path, PathGate, RouteDecision, TECH_CONSOLE_PREFIX};
pub use policy::{authorize, authorize_roles, policies, OperationPolicy};
pub use roles::{Role, SUPER_ROLES};
