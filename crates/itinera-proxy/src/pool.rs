//! Scored, TTL-refreshed proxy pool.
//!
//! The pool caches candidate lists from a [`CandidateProvider`] and hands
//! out endpoints by weighted-random selection over their success scores.
//! Outcome recording is lock-free (atomics on the endpoint); the pool lock
//! only guards membership. Refreshes are serialized through an async mutex
//! with a double-check so concurrent callers trigger at most one provider
//! call per TTL window.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::endpoint::{EndpointSnapshot, ProxyEndpoint};
use crate::error::{ProxyError, ProxyResult};
use crate::provider::CandidateProvider;

struct PoolInner {
    endpoints: Vec<Arc<ProxyEndpoint>>,
    /// When the pool last refreshed successfully.
    last_refresh: Option<Instant>,
    /// When a refresh was last attempted, successful or not.
    last_attempt: Option<Instant>,
    /// Whether the most recent attempt failed.
    last_attempt_failed: bool,
}

/// Shared pool of scored proxy endpoints.
pub struct ProxyPool {
    provider: Arc<dyn CandidateProvider>,
    config: PoolConfig,
    inner: RwLock<PoolInner>,
    refresh_lock: Mutex<()>,
}

impl ProxyPool {
    pub fn new(provider: Arc<dyn CandidateProvider>, config: PoolConfig) -> Self {
        Self {
            provider,
            config,
            inner: RwLock::new(PoolInner {
                endpoints: Vec::new(),
                last_refresh: None,
                last_attempt: None,
                last_attempt_failed: false,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Refresh the candidate list if the cache is stale. A fresh cache is a
    /// hit: no provider call is made. Returns the acquirable endpoint count.
    pub async fn refresh(&self) -> ProxyResult<usize> {
        self.refresh_internal(false).await
    }

    async fn refresh_internal(&self, force: bool) -> ProxyResult<usize> {
        let _guard = self.refresh_lock.lock().await;

        // Double-check after acquiring the refresh lock: another task may
        // have refreshed while we waited.
        if !force && !self.needs_refresh() {
            return Ok(self.acquirable_count());
        }

        // Back off between attempts when the provider keeps failing.
        let in_backoff = self.read(|inner| {
            inner.last_attempt_failed
                && inner
                    .last_attempt
                    .is_some_and(|at| at.elapsed() < self.config.retry_interval)
        });
        if in_backoff {
            debug!("Skipping proxy refresh, provider retry interval not elapsed");
            return Ok(self.acquirable_count());
        }

        self.write(|inner| inner.last_attempt = Some(Instant::now()));

        let candidates = match self.provider.fetch_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                // Soft degrade: keep serving the stale pool.
                self.write(|inner| inner.last_attempt_failed = true);
                warn!(error = %e, "Proxy candidate refresh failed, keeping stale pool");
                metrics::counter!("proxy_pool_refresh_failures_total").increment(1);
                let count = self.acquirable_count();
                if count == 0 {
                    return Err(ProxyError::provider_unavailable(format!(
                        "refresh failed with an empty pool: {e}"
                    )));
                }
                return Ok(count);
            }
        };

        let count = self.write(|inner| {
            let previous: Vec<Arc<ProxyEndpoint>> = std::mem::take(&mut inner.endpoints);
            let mut next = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                // Keep accumulated scores for endpoints that survived the
                // refresh; evicted ones come back as fresh candidates.
                let existing = previous
                    .iter()
                    .find(|ep| ep.address() == candidate.address && !ep.is_evicted());
                match existing {
                    Some(ep) => next.push(Arc::clone(ep)),
                    None => next.push(Arc::new(ProxyEndpoint::new(
                        &candidate.address,
                        &candidate.protocol,
                        &candidate.anonymity,
                        self.config.initial_score,
                    ))),
                }
            }
            inner.endpoints = next;
            inner.last_refresh = Some(Instant::now());
            inner.last_attempt_failed = false;
            inner.endpoints.len()
        });

        info!(endpoint_count = count, "Proxy pool refreshed");
        metrics::counter!("proxy_pool_refreshes_total").increment(1);
        Ok(count)
    }

    /// Acquire an endpoint by weighted-random selection, skipping evicted
    /// and degraded endpoints plus any address in `exclude`.
    ///
    /// When nothing is acquirable, one forced refresh is attempted before
    /// giving up with [`ProxyError::PoolExhausted`].
    pub async fn acquire(&self, exclude: &HashSet<String>) -> ProxyResult<Arc<ProxyEndpoint>> {
        if self.needs_refresh() {
            self.refresh_internal(false).await?;
        }

        if let Some(endpoint) = self.select(exclude) {
            return Ok(endpoint);
        }

        self.refresh_internal(true).await?;

        self.select(exclude).ok_or_else(|| {
            ProxyError::exhausted(format!(
                "no acquirable endpoint ({} excluded, {} total)",
                exclude.len(),
                self.read(|inner| inner.endpoints.len())
            ))
        })
    }

    /// Feed one usage outcome back into the endpoint's score. Endpoints
    /// that hit the consecutive-failure threshold are evicted until the
    /// next refresh.
    pub fn record_outcome(&self, endpoint: &ProxyEndpoint, success: bool) {
        if success {
            endpoint.record_success(self.config.score_alpha);
            metrics::counter!("proxy_pool_outcomes_total", "outcome" => "success").increment(1);
            return;
        }

        let streak = endpoint.record_failure(self.config.score_alpha);
        metrics::counter!("proxy_pool_outcomes_total", "outcome" => "failure").increment(1);
        if streak >= self.config.eviction_threshold && !endpoint.is_evicted() {
            endpoint.evict();
            warn!(
                address = endpoint.address(),
                consecutive_failures = streak,
                score = endpoint.score(),
                "Proxy endpoint evicted"
            );
            metrics::counter!("proxy_pool_evictions_total").increment(1);
        }
    }

    /// Snapshot of every endpoint currently in the pool.
    pub fn stats(&self) -> PoolStats {
        self.read(|inner| {
            let snapshots: Vec<EndpointSnapshot> = inner
                .endpoints
                .iter()
                .map(|ep| EndpointSnapshot::of(ep, self.config.score_floor))
                .collect();
            let acquirable = inner
                .endpoints
                .iter()
                .filter(|ep| ep.is_acquirable(self.config.score_floor))
                .count();
            PoolStats {
                total: inner.endpoints.len(),
                acquirable,
                cache_age_secs: inner.last_refresh.map(|t| t.elapsed().as_secs()),
                endpoints: snapshots,
            }
        })
    }

    fn needs_refresh(&self) -> bool {
        self.read(|inner| match inner.last_refresh {
            None => true,
            Some(at) => at.elapsed() > self.config.refresh_ttl,
        }) || self.acquirable_count() < self.config.min_pool_size
    }

    fn acquirable_count(&self) -> usize {
        self.read(|inner| {
            inner
                .endpoints
                .iter()
                .filter(|ep| ep.is_acquirable(self.config.score_floor))
                .count()
        })
    }

    fn select(&self, exclude: &HashSet<String>) -> Option<Arc<ProxyEndpoint>> {
        self.read(|inner| {
            let eligible: Vec<&Arc<ProxyEndpoint>> = inner
                .endpoints
                .iter()
                .filter(|ep| {
                    ep.is_acquirable(self.config.score_floor) && !exclude.contains(ep.address())
                })
                .collect();
            if eligible.is_empty() {
                return None;
            }

            let weights: Vec<f64> = eligible.iter().map(|ep| ep.score().max(0.05)).collect();
            let total: f64 = weights.iter().sum();
            let mut rng = rand::rng();
            let mut roll = rng.random_range(0.0..total);
            for (endpoint, weight) in eligible.iter().zip(&weights) {
                if roll < *weight {
                    return Some(Arc::clone(endpoint));
                }
                roll -= weight;
            }
            // Floating-point rounding can leave the roll past the last
            // bucket; fall back to the final eligible endpoint.
            eligible.last().map(|ep| Arc::clone(ep))
        })
    }

    fn read<T>(&self, f: impl FnOnce(&PoolInner) -> T) -> T {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut PoolInner) -> T) -> T {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total: usize,
    pub acquirable: usize,
    /// Seconds since the last successful refresh, `None` before the first.
    pub cache_age_secs: Option<u64>,
    pub endpoints: Vec<EndpointSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CandidateDescriptor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeProvider {
        calls: AtomicUsize,
        candidates: Vec<CandidateDescriptor>,
        fail: bool,
    }

    impl FakeProvider {
        fn with_addresses(addresses: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                candidates: addresses
                    .iter()
                    .map(|a| CandidateDescriptor {
                        address: a.to_string(),
                        protocol: "http".to_string(),
                        anonymity: "elite".to_string(),
                    })
                    .collect(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                candidates: Vec::new(),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandidateProvider for FakeProvider {
        async fn fetch_candidates(&self) -> ProxyResult<Vec<CandidateDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProxyError::provider_unavailable("offline"));
            }
            Ok(self.candidates.clone())
        }
    }

    fn test_config() -> PoolConfig {
        PoolConfig {
            min_pool_size: 1,
            retry_interval: Duration::from_secs(0),
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_within_ttl_is_cache_hit() {
        let provider = Arc::new(FakeProvider::with_addresses(&["1.1.1.1:80", "2.2.2.2:80"]));
        let pool = ProxyPool::new(provider.clone(), test_config());

        assert_eq!(pool.refresh().await.unwrap(), 2);
        assert_eq!(pool.refresh().await.unwrap(), 2);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_acquire_excludes_given_addresses() {
        let provider = Arc::new(FakeProvider::with_addresses(&["1.1.1.1:80", "2.2.2.2:80"]));
        let pool = ProxyPool::new(provider, test_config());

        let mut exclude = HashSet::new();
        exclude.insert("1.1.1.1:80".to_string());
        for _ in 0..10 {
            let endpoint = pool.acquire(&exclude).await.unwrap();
            assert_eq!(endpoint.address(), "2.2.2.2:80");
        }
    }

    #[tokio::test]
    async fn test_eviction_after_threshold_failures() {
        let provider = Arc::new(FakeProvider::with_addresses(&["1.1.1.1:80", "2.2.2.2:80"]));
        let pool = ProxyPool::new(provider, test_config());
        pool.refresh().await.unwrap();

        let exclude = HashSet::new();
        let victim = pool
            .stats()
            .endpoints
            .iter()
            .find(|ep| ep.address == "1.1.1.1:80")
            .map(|ep| ep.address.clone())
            .unwrap();

        // Drive the victim to the eviction threshold.
        let endpoint = {
            let inner = pool.read(|inner| {
                inner
                    .endpoints
                    .iter()
                    .find(|ep| ep.address() == victim)
                    .cloned()
            });
            inner.unwrap()
        };
        for _ in 0..pool.config().eviction_threshold {
            pool.record_outcome(&endpoint, false);
        }
        assert!(endpoint.is_evicted());

        // The evicted endpoint is never handed out again.
        for _ in 0..10 {
            let acquired = pool.acquire(&exclude).await.unwrap();
            assert_ne!(acquired.address(), victim);
        }
    }

    #[tokio::test]
    async fn test_exhausted_when_everything_excluded() {
        let provider = Arc::new(FakeProvider::with_addresses(&["1.1.1.1:80"]));
        let pool = ProxyPool::new(provider, test_config());

        let mut exclude = HashSet::new();
        exclude.insert("1.1.1.1:80".to_string());
        let err = pool.acquire(&exclude).await.unwrap_err();
        assert!(matches!(err, ProxyError::PoolExhausted(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_with_empty_pool_is_unavailable() {
        let provider = Arc::new(FakeProvider::failing());
        let pool = ProxyPool::new(provider, test_config());

        let err = pool.acquire(&HashSet::new()).await.unwrap_err();
        assert!(matches!(err, ProxyError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_success_outcome_raises_score() {
        let provider = Arc::new(FakeProvider::with_addresses(&["1.1.1.1:80"]));
        let pool = ProxyPool::new(provider, test_config());
        pool.refresh().await.unwrap();

        let endpoint = pool.acquire(&HashSet::new()).await.unwrap();
        let before = endpoint.score();
        pool.record_outcome(&endpoint, true);
        assert!(endpoint.score() > before);
    }

    #[tokio::test]
    async fn test_weighted_selection_prefers_higher_scores() {
        let provider = Arc::new(FakeProvider::with_addresses(&["good:80", "bad:80"]));
        let pool = ProxyPool::new(provider, test_config());
        pool.refresh().await.unwrap();

        let (good, bad) = pool.read(|inner| {
            let good = inner
                .endpoints
                .iter()
                .find(|ep| ep.address() == "good:80")
                .cloned()
                .unwrap();
            let bad = inner
                .endpoints
                .iter()
                .find(|ep| ep.address() == "bad:80")
                .cloned()
                .unwrap();
            (good, bad)
        });
        for _ in 0..10 {
            pool.record_outcome(&good, true);
        }
        // Two failures degrade without crossing the floor or the threshold.
        pool.record_outcome(&bad, false);
        pool.record_outcome(&bad, true);
        pool.record_outcome(&bad, false);

        let mut good_picks = 0;
        for _ in 0..500 {
            if pool.acquire(&HashSet::new()).await.unwrap().address() == "good:80" {
                good_picks += 1;
            }
        }
        // score(good) ~ 1.0 vs score(bad) ~ 0.3: good should dominate.
        assert!(good_picks > 300, "good picked only {good_picks}/500 times");
    }
}
