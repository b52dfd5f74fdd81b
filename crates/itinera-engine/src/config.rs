//! Engine configuration.

use std::time::Duration;

/// Configuration for the fetch orchestrator and generation pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pooled-proxy attempts per video before falling back to manual proxies
    pub max_pooled_attempts: u32,
    /// Lower bound of the randomized delay before each pooled attempt
    pub pooled_delay_min: Duration,
    /// Upper bound of the randomized delay before each pooled attempt
    pub pooled_delay_max: Duration,
    /// Base for the exponential backoff between pooled attempts
    pub backoff_base: Duration,
    /// Backoff cap
    pub backoff_max: Duration,
    /// Timeout for a single fetch attempt
    pub attempt_timeout: Duration,
    /// Maximum videos fetched concurrently within one batch
    pub batch_concurrency: usize,
    /// Maximum videos accepted per submission
    pub max_batch_size: usize,
    /// Synthesizer retries on transient failure (not counting the first call)
    pub synthesis_retries: u32,
    /// Operator-configured manual proxy URLs, tried after the pool
    pub manual_proxies: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pooled_attempts: 3,
            pooled_delay_min: Duration::from_secs(1),
            pooled_delay_max: Duration::from_secs(3),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(8),
            batch_concurrency: 5,
            max_batch_size: 5,
            synthesis_retries: 2,
            manual_proxies: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_pooled_attempts: env_parse("ENGINE_MAX_POOLED_ATTEMPTS", defaults.max_pooled_attempts),
            pooled_delay_min: Duration::from_millis(env_parse(
                "ENGINE_POOLED_DELAY_MIN_MS",
                defaults.pooled_delay_min.as_millis() as u64,
            )),
            pooled_delay_max: Duration::from_millis(env_parse(
                "ENGINE_POOLED_DELAY_MAX_MS",
                defaults.pooled_delay_max.as_millis() as u64,
            )),
            backoff_base: Duration::from_millis(env_parse(
                "ENGINE_BACKOFF_BASE_MS",
                defaults.backoff_base.as_millis() as u64,
            )),
            backoff_max: Duration::from_secs(env_parse(
                "ENGINE_BACKOFF_MAX_SECS",
                defaults.backoff_max.as_secs(),
            )),
            attempt_timeout: Duration::from_secs(env_parse(
                "ENGINE_ATTEMPT_TIMEOUT_SECS",
                defaults.attempt_timeout.as_secs(),
            )),
            batch_concurrency: env_parse("ENGINE_BATCH_CONCURRENCY", defaults.batch_concurrency)
                .clamp(1, 5),
            max_batch_size: env_parse("ENGINE_MAX_BATCH_SIZE", defaults.max_batch_size),
            synthesis_retries: env_parse("ENGINE_SYNTHESIS_RETRIES", defaults.synthesis_retries),
            manual_proxies: std::env::var("ENGINE_MANUAL_PROXIES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
