//! A single scored proxy endpoint.
//!
//! Outcome counters and the success score are atomics so that concurrent
//! fetch tasks can record results without taking the pool lock.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;

/// Score values are stored as millionths in an `AtomicU32`.
const SCORE_SCALE: f64 = 1_000_000.0;

/// Lifecycle state of an endpoint, derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    /// Listed by the provider, no outcome recorded yet
    Candidate,
    /// At least one outcome recorded, score at or above the floor
    Active,
    /// Score below the floor, skipped during selection
    Degraded,
    /// Hit the consecutive-failure threshold, out until the next refresh
    Evicted,
}

/// One proxy endpoint with lock-free outcome tracking.
#[derive(Debug)]
pub struct ProxyEndpoint {
    /// `host:port`
    address: String,
    /// Proxy scheme (http, socks5)
    protocol: String,
    /// Anonymity level as reported by the provider (transparent,
    /// anonymous, elite)
    anonymity: String,
    /// Score in millionths (0..=1_000_000)
    score_micros: AtomicU32,
    consecutive_failures: AtomicU32,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    /// Epoch millis of the last success, 0 when never
    last_success_ms: AtomicI64,
    /// Epoch millis of the last failure, 0 when never
    last_failure_ms: AtomicI64,
    evicted: AtomicBool,
}

impl ProxyEndpoint {
    pub fn new(
        address: impl Into<String>,
        protocol: impl Into<String>,
        anonymity: impl Into<String>,
        initial_score: f64,
    ) -> Self {
        Self {
            address: address.into(),
            protocol: protocol.into(),
            anonymity: anonymity.into(),
            score_micros: AtomicU32::new(to_micros(initial_score)),
            consecutive_failures: AtomicU32::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_success_ms: AtomicI64::new(0),
            last_failure_ms: AtomicI64::new(0),
            evicted: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn anonymity(&self) -> &str {
        &self.anonymity
    }

    /// Full proxy URL, e.g. `http://1.2.3.4:8080`.
    pub fn url(&self) -> String {
        format!("{}://{}", self.protocol, self.address)
    }

    /// Current success score in `0.0..=1.0`.
    pub fn score(&self) -> f64 {
        self.score_micros.load(Ordering::Relaxed) as f64 / SCORE_SCALE
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Mark the endpoint evicted. It stays out of selection until the pool
    /// drops it at the next refresh.
    pub fn evict(&self) {
        self.evicted.store(true, Ordering::Relaxed);
    }

    /// Record a successful use. Moves the score toward 1.0 by `alpha` and
    /// clears the consecutive-failure streak.
    pub fn record_success(&self, alpha: f64) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_success_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.blend_score(1.0, alpha);
    }

    /// Record a failed use. Moves the score toward 0.0 by `alpha` and
    /// returns the new consecutive-failure streak.
    pub fn record_failure(&self, alpha: f64) -> u32 {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.blend_score(0.0, alpha);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Derive the lifecycle state against the given score floor.
    pub fn state(&self, score_floor: f64) -> EndpointState {
        if self.is_evicted() {
            return EndpointState::Evicted;
        }
        if self.success_count() == 0 && self.failure_count() == 0 {
            return EndpointState::Candidate;
        }
        if self.score() >= score_floor {
            EndpointState::Active
        } else {
            EndpointState::Degraded
        }
    }

    /// Whether selection may hand this endpoint out.
    pub fn is_acquirable(&self, score_floor: f64) -> bool {
        matches!(
            self.state(score_floor),
            EndpointState::Candidate | EndpointState::Active
        )
    }

    /// Exponential moving average update, lock-free via compare-and-swap.
    fn blend_score(&self, target: f64, alpha: f64) {
        let _ = self
            .score_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                let old = current as f64 / SCORE_SCALE;
                let new = old * (1.0 - alpha) + target * alpha;
                Some(to_micros(new))
            });
    }
}

fn to_micros(score: f64) -> u32 {
    (score.clamp(0.0, 1.0) * SCORE_SCALE) as u32
}

/// Point-in-time snapshot of one endpoint, for stats reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub address: String,
    pub protocol: String,
    pub anonymity: String,
    pub score: f64,
    pub state: EndpointState,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
}

impl EndpointSnapshot {
    pub fn of(endpoint: &ProxyEndpoint, score_floor: f64) -> Self {
        Self {
            address: endpoint.address().to_string(),
            protocol: endpoint.protocol().to_string(),
            anonymity: endpoint.anonymity().to_string(),
            score: endpoint.score(),
            state: endpoint.state(score_floor),
            success_count: endpoint.success_count(),
            failure_count: endpoint.failure_count(),
            consecutive_failures: endpoint.consecutive_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHA: f64 = 0.3;
    const FLOOR: f64 = 0.2;

    #[test]
    fn test_fresh_endpoint_is_candidate() {
        let ep = ProxyEndpoint::new("1.2.3.4:8080", "http", "elite", 0.5);
        assert_eq!(ep.state(FLOOR), EndpointState::Candidate);
        assert!(ep.is_acquirable(FLOOR));
        assert_eq!(ep.url(), "http://1.2.3.4:8080");
    }

    #[test]
    fn test_success_raises_score_and_clears_streak() {
        let ep = ProxyEndpoint::new("1.2.3.4:8080", "http", "elite", 0.5);
        ep.record_failure(ALPHA);
        ep.record_failure(ALPHA);
        assert_eq!(ep.consecutive_failures(), 2);

        let before = ep.score();
        ep.record_success(ALPHA);
        assert!(ep.score() > before);
        assert_eq!(ep.consecutive_failures(), 0);
        assert_eq!(ep.state(FLOOR), EndpointState::Active);
    }

    #[test]
    fn test_failures_degrade_below_floor() {
        let ep = ProxyEndpoint::new("1.2.3.4:8080", "http", "elite", 0.5);
        // 0.5 -> 0.35 -> 0.245 -> 0.1715
        ep.record_failure(ALPHA);
        ep.record_failure(ALPHA);
        ep.record_failure(ALPHA);
        assert!(ep.score() < FLOOR);
        assert_eq!(ep.state(FLOOR), EndpointState::Degraded);
        assert!(!ep.is_acquirable(FLOOR));
    }

    #[test]
    fn test_eviction_overrides_score() {
        let ep = ProxyEndpoint::new("1.2.3.4:8080", "http", "elite", 0.5);
        ep.record_success(ALPHA);
        ep.evict();
        assert_eq!(ep.state(FLOOR), EndpointState::Evicted);
        assert!(!ep.is_acquirable(FLOOR));
    }

    #[test]
    fn test_score_stays_in_unit_range() {
        let ep = ProxyEndpoint::new("1.2.3.4:8080", "http", "elite", 0.5);
        for _ in 0..50 {
            ep.record_success(ALPHA);
        }
        assert!(ep.score() <= 1.0);
        for _ in 0..50 {
            ep.record_failure(ALPHA);
        }
        assert!(ep.score() >= 0.0);
    }
}
