//! Sliding-window admission control for the edge middleware.
//!
//! Features:
//! - Per-client sliding window of request timestamps, pruned lazily on each
//!   check (no background sweep)
//! - Process-local, keyed in-memory state; per-key read-prune-append is a
//!   single critical section
//! - Approximate bulk eviction when tracked-key cardinality exceeds a
//!   configured ceiling
//! - Tower layer answering HTTP 429 before any session resolution or
//!   database work happens
//!
//! # Scaling limitation
//!
//! State is process-local: a deployment with N instances multiplies the
//! effective limit by N. A shared external counter would be needed for
//! cross-instance consistency; this module does not provide one.
//!
//! # Eviction imprecision
//!
//! Eviction removes the earliest-*inserted* keys, not the least recently
//! used, and removes them outright even when their entries are still inside
//! the active window. Under sustained high key cardinality an active
//! client's state can be evicted, resetting its count to zero and letting it
//! burst past the nominal limit. That trade-off is intentional and covered
//! by a regression test.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::BoxFuture;
use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::{Layer, Service};
use tracing::debug;

use crate::error::CoreError;

/// Bucket shared by every client whose address cannot be determined.
/// A deliberate policy trade-off: unidentifiable traffic throttles itself
/// collectively rather than bypassing the limiter.
pub const UNKNOWN_IP: &str = "unknown-ip";

/// Number of earliest-inserted keys dropped per eviction sweep.
const EVICTION_BATCH: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════════

/// Millisecond clock, injectable so window behavior is testable.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// System clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the absolute time in milliseconds.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, std::sync::atomic::Ordering::SeqCst);
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, millis: u64) {
        self.now
            .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Max permitted events per key per window (the fixed limit the edge
    /// middleware passes to `check`).
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Soft ceiling on distinct tracked keys before bulk eviction triggers.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_requests: default_max_requests(),
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_max_requests() -> usize {
    10
}

fn default_max_tracked_keys() -> usize {
    500
}

impl RateLimitConfig {
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::default()
    }
}

/// Builder for rate limit configuration.
#[derive(Debug, Default)]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn interval_ms(mut self, millis: u64) -> Self {
        self.config.interval_ms = millis;
        self
    }

    pub fn max_requests(mut self, count: usize) -> Self {
        self.config.max_requests = count;
        self
    }

    pub fn max_tracked_keys(mut self, count: usize) -> Self {
        self.config.max_tracked_keys = count;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a rate limit check. Rejection is an expected outcome, not a
/// fault, and is always resolved synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// The limit that was applied.
    pub limit: usize,
    /// Requests remaining in the current window.
    pub remaining: usize,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sliding Window Limiter
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-local sliding-window counter keyed by client identifier.
///
/// Each key maps to the ordered timestamps of its recent requests; the
/// stored sequence only ever contains events within `interval_ms` of the
/// last access. The limiter has no global state machine: a check is a pure
/// function of (now, stored timestamps, limit) with the side effect of
/// storing the updated sequence.
pub struct SlidingWindowLimiter {
    entries: DashMap<String, Vec<u64>>,
    /// Keys in first-insertion order, the eviction queue. Never held across
    /// a map mutation.
    insertion_order: Mutex<VecDeque<String>>,
    interval_ms: u64,
    max_tracked_keys: usize,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create a limiter on the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter on an injected clock.
    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            interval_ms: config.interval_ms,
            max_tracked_keys: config.max_tracked_keys,
            clock,
        }
    }

    /// Check whether a request from `key` is admitted under `limit`.
    ///
    /// Prunes the key's stale timestamps, then either rejects (recording
    /// nothing) or appends the current time and admits. Callers that cannot
    /// identify the client should pass [`UNKNOWN_IP`] rather than an empty
    /// key.
    pub fn check(&self, limit: usize, key: &str) -> RateLimitDecision {
        self.maybe_evict();

        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(self.interval_ms);

        let decision = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let timestamps = occupied.get_mut();
                timestamps.retain(|&t| t > cutoff);

                if timestamps.len() >= limit {
                    RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                    }
                } else {
                    timestamps.push(now);
                    RateLimitDecision {
                        allowed: true,
                        limit,
                        remaining: limit - timestamps.len(),
                    }
                }
            }
            Entry::Vacant(vacant) => {
                if limit == 0 {
                    RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                    }
                } else {
                    self.insertion_order.lock().push_back(key.to_string());
                    vacant.insert(vec![now]);
                    RateLimitDecision {
                        allowed: true,
                        limit,
                        remaining: limit - 1,
                    }
                }
            }
        };

        counter!(
            "shavi_rate_limit_checks_total",
            "allowed" => if decision.allowed { "true" } else { "false" },
        )
        .increment(1);

        decision
    }

    /// Number of distinct client identifiers currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Number of events currently stored for a key (without pruning).
    pub fn recorded_events(&self, key: &str) -> usize {
        self.entries.get(key).map(|e| e.len()).unwrap_or(0)
    }

    /// Evict a batch of the earliest-inserted keys once cardinality exceeds
    /// the ceiling. Runs inline in the call that crossed the threshold.
    fn maybe_evict(&self) {
        if self.entries.len() <= self.max_tracked_keys {
            return;
        }

        // Collect victims under the queue lock, then drop entries without
        // holding it, so the vacant-insert path cannot deadlock against us.
        let victims: Vec<String> = {
            let mut order = self.insertion_order.lock();
            let n = EVICTION_BATCH.min(order.len());
            order.drain(..n).collect()
        };

        for key in &victims {
            self.entries.remove(key);
        }

        debug!(evicted = victims.len(), "Rate limiter evicted oldest keys");
        counter!("shavi_rate_limit_evictions_total").increment(victims.len() as u64);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Client Key Extraction
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the client identifier for a request: first entry of
/// `x-forwarded-for`, else the socket peer address, else [`UNKNOWN_IP`].
pub fn client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    if let Some(value) = headers.get("x-forwarded-for") {
        if let Ok(s) = value.to_str() {
            let first = s.split(',').next().unwrap_or(s).trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Rate limiting layer for the edge router.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<SlidingWindowLimiter>,
    limit: usize,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<SlidingWindowLimiter>, limit: usize) -> Self {
        Self { limiter, limit }
    }

    /// Create the layer and its limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(SlidingWindowLimiter::new(config)),
            config.max_requests,
        )
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            limit: self.limit,
        }
    }
}

/// Rate limiting service. Runs before session resolution so rejected
/// traffic costs no upstream work.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<SlidingWindowLimiter>,
    limit: usize,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let limit = self.limit;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let remote_addr = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0);
            let key = client_key(request.headers(), remote_addr);

            let decision = limiter.check(limit, &key);

            if !decision.is_allowed() {
                counter!("shavi_rate_limit_rejected_total").increment(1);
                return Ok(CoreError::RateLimitExceeded.into_response());
            }

            let mut response = inner.call(request).await?;

            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
                headers.insert("X-RateLimit-Limit", v);
            }
            if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
                headers.insert("X-RateLimit-Remaining", v);
            }

            Ok(response)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_at(interval_ms: u64, max_tracked_keys: usize) -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = ManualClock::new();
        let config = RateLimitConfig::builder()
            .interval_ms(interval_ms)
            .max_tracked_keys(max_tracked_keys)
            .build();
        let limiter = SlidingWindowLimiter::with_clock(&config, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_window_correctness() {
        let (limiter, clock) = limiter_at(1000, 500);
        let key = "1.2.3.4";

        clock.set(0);
        assert!(limiter.check(3, key).is_allowed());
        clock.set(100);
        assert!(limiter.check(3, key).is_allowed());
        clock.set(200);
        assert!(limiter.check(3, key).is_allowed());

        // Fourth call inside the same window is rejected.
        clock.set(300);
        assert!(!limiter.check(3, key).is_allowed());

        // Once the window slides past the t=0 event, a slot frees up.
        clock.set(1050);
        assert!(limiter.check(3, key).is_allowed());
    }

    #[test]
    fn test_rejection_records_no_timestamp() {
        let (limiter, clock) = limiter_at(1000, 500);
        let key = "1.2.3.4";

        clock.set(0);
        for _ in 0..3 {
            assert!(limiter.check(3, key).is_allowed());
        }
        let before = limiter.recorded_events(key);

        assert!(!limiter.check(3, key).is_allowed());
        assert!(!limiter.check(3, key).is_allowed());

        assert_eq!(limiter.recorded_events(key), before);
    }

    #[test]
    fn test_key_isolation() {
        let (limiter, clock) = limiter_at(1000, 500);
        clock.set(0);

        for _ in 0..3 {
            assert!(limiter.check(3, "a").is_allowed());
        }
        assert!(!limiter.check(3, "a").is_allowed());

        // "b" still has its full budget.
        for _ in 0..3 {
            assert!(limiter.check(3, "b").is_allowed());
        }
        assert!(!limiter.check(3, "b").is_allowed());
        // And "b"'s exhaustion did not free "a".
        assert!(!limiter.check(3, "a").is_allowed());
    }

    #[test]
    fn test_eviction_readmits_limited_key() {
        // Regression test for the documented imprecision: eviction removes
        // the earliest-inserted keys outright, so a rate-limited client
        // whose state is evicted gets a fresh budget immediately.
        let (limiter, clock) = limiter_at(60_000, 4);
        clock.set(0);

        assert!(limiter.check(1, "victim").is_allowed());
        assert!(!limiter.check(1, "victim").is_allowed());

        for key in ["k1", "k2", "k3", "k4"] {
            assert!(limiter.check(1, key).is_allowed());
        }
        assert_eq!(limiter.tracked_keys(), 5);

        // Cardinality now exceeds the ceiling; the next check sweeps the
        // insertion-order queue, which includes "victim".
        assert!(limiter.check(1, "victim").is_allowed());
    }

    #[test]
    fn test_lazy_prune_only_on_access() {
        let (limiter, clock) = limiter_at(1000, 500);
        clock.set(0);
        assert!(limiter.check(3, "a").is_allowed());

        // No sweep happens while the key sits idle.
        clock.set(5000);
        assert_eq!(limiter.recorded_events("a"), 1);

        assert!(limiter.check(3, "a").is_allowed());
        // Access pruned the stale event and recorded the new one.
        assert_eq!(limiter.recorded_events("a"), 1);
    }

    #[test]
    fn test_zero_limit_rejects_without_tracking() {
        let (limiter, clock) = limiter_at(1000, 500);
        clock.set(0);
        assert!(!limiter.check(0, "a").is_allowed());
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_client_key_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.8.7.6, 10.0.0.1"));
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        assert_eq!(client_key(&headers, Some(addr)), "9.8.7.6");
        assert_eq!(client_key(&HeaderMap::new(), Some(addr)), "127.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), None), UNKNOWN_IP);
    }

    #[test]
    fn test_config_builder() {
        let config = RateLimitConfig::builder()
            .interval_ms(30_000)
            .max_requests(5)
            .max_tracked_keys(100)
            .build();

        assert_eq!(config.interval_ms, 30_000);
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.max_tracked_keys, 100);
    }
}
