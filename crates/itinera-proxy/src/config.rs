//! Proxy pool configuration.

use std::time::Duration;

/// Configuration for the proxy pool and its provider.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How long a fetched candidate list stays fresh.
    pub refresh_ttl: Duration,
    /// Minimum wait between refresh attempts after a provider failure.
    pub retry_interval: Duration,
    /// Refresh early when fewer acquirable endpoints than this remain.
    pub min_pool_size: usize,
    /// Consecutive failures before an endpoint is evicted.
    pub eviction_threshold: u32,
    /// Weight of the newest outcome in the moving success score.
    pub score_alpha: f64,
    /// Endpoints scoring below this are not handed out.
    pub score_floor: f64,
    /// Score assigned to endpoints that have not been tried yet.
    pub initial_score: f64,
    /// Anonymity level requested from the provider (all, anonymous, elite).
    pub anonymity: String,
    /// Connect timeout, in milliseconds, requested from the provider.
    pub provider_timeout_ms: u32,
    /// Country filter requested from the provider ("all" for no filter).
    pub country: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refresh_ttl: Duration::from_secs(600),
            retry_interval: Duration::from_secs(30),
            min_pool_size: 5,
            eviction_threshold: 3,
            score_alpha: 0.3,
            score_floor: 0.2,
            initial_score: 0.5,
            anonymity: "elite".to_string(),
            provider_timeout_ms: 10_000,
            country: "all".to_string(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            refresh_ttl: Duration::from_secs(env_parse(
                "PROXY_POOL_REFRESH_TTL_SECS",
                defaults.refresh_ttl.as_secs(),
            )),
            retry_interval: Duration::from_secs(env_parse(
                "PROXY_POOL_RETRY_INTERVAL_SECS",
                defaults.retry_interval.as_secs(),
            )),
            min_pool_size: env_parse("PROXY_POOL_MIN_SIZE", defaults.min_pool_size),
            eviction_threshold: env_parse(
                "PROXY_POOL_EVICTION_THRESHOLD",
                defaults.eviction_threshold,
            ),
            score_alpha: env_parse("PROXY_POOL_SCORE_ALPHA", defaults.score_alpha),
            score_floor: env_parse("PROXY_POOL_SCORE_FLOOR", defaults.score_floor),
            initial_score: env_parse("PROXY_POOL_INITIAL_SCORE", defaults.initial_score),
            anonymity: std::env::var("PROXY_POOL_ANONYMITY").unwrap_or(defaults.anonymity),
            provider_timeout_ms: env_parse(
                "PROXY_POOL_PROVIDER_TIMEOUT_MS",
                defaults.provider_timeout_ms,
            ),
            country: std::env::var("PROXY_POOL_COUNTRY").unwrap_or(defaults.country),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.refresh_ttl, Duration::from_secs(600));
        assert_eq!(config.eviction_threshold, 3);
        assert!(config.score_floor < config.initial_score);
    }
}
