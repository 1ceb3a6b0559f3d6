//! Telemetry: structured logging setup.
//!
//! Counters are emitted through the `metrics` facade at the call sites that
//! own them; this module only owns subscriber initialization.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
