//! Edge middleware stack.
//!
//! Ordering matters: rate limiting runs first so rejected traffic never
//! costs a session lookup, then the access-control gate, then the router.

pub mod rate_limit;

pub use rate_limit::{
    client_key, Clock, ManualClock, RateLimitConfig, RateLimitDecision, RateLimitLayer,
    RateLimitService, SlidingWindowLimiter, SystemClock, UNKNOWN_IP,
};
