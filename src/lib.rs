//! # Shavi Core
//!
//! Request-admission and authorization core for Shavi Academy OS.
//!
//! ## Architecture
//!
//! - **Rate Limiting**: Process-local sliding-window admission control with
//!   lazy pruning and approximate bulk eviction
//! - **RBAC**: Two-granularity gate, a path-prefix decision table at the edge
//!   and per-operation allow-lists at every sensitive server action
//! - **Sessions**: Pluggable async session resolution feeding both gates
//! - **Ingest**: Precedence-list normalization of loosely-typed marketing
//!   webhook payloads
//! - **Telemetry**: Structured logging via `tracing`, counters via `metrics`

pub mod config;
pub mod error;
pub mod ingest;
pub mod middleware;
pub mod rbac;
pub mod session;
pub mod telemetry;

pub use error::{CoreError, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AccessConfig, Config};
    pub use crate::error::{CoreError, ErrorCode, Result};
    pub use crate::ingest::{normalize_lead, LeadRecord};
    pub use crate::middleware::{
        ManualClock, RateLimitConfig, RateLimitLayer, SlidingWindowLimiter, SystemClock,
        UNKNOWN_IP,
    };
    pub use crate::rbac::{
        authorize, authorize_roles, policies, AccessControlLayer, OperationPolicy, PathGate,
        Role, RouteDecision, SUPER_ROLES, TECH_CONSOLE_PREFIX,
    };
    pub use crate::session::{Session, SessionResolver, TokenTableResolver, UserId};
    pub use crate::telemetry::{init_logging, LogFormat, LoggingConfig};
}
