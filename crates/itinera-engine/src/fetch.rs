//! Fetch orchestrator: the direct / pooled / manual fallback chain.
//!
//! One video at a time. Direct connection first, then up to a configured
//! number of pooled proxy attempts (fresh endpoint each time, randomized
//! pacing, exponential backoff after blocks), then operator-configured
//! manual proxies in order. Content-level failures (no captions, private
//! video) stop the chain immediately: no route can fetch a transcript that
//! does not exist.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use itinera_models::{FetchAttempt, FetchMechanism, FetchPayload, FetchResult, VideoReference};
use itinera_proxy::ProxyPool;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::transport::{TranscriptTransport, TransportError};

/// Drives the fallback chain for single-video fetches.
pub struct FetchOrchestrator {
    transport: Arc<dyn TranscriptTransport>,
    pool: Arc<ProxyPool>,
    config: EngineConfig,
}

impl FetchOrchestrator {
    pub fn new(
        transport: Arc<dyn TranscriptTransport>,
        pool: Arc<ProxyPool>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            pool,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch one video, capturing any failure in the returned result.
    ///
    /// This is the batch-facing entry point: per-video errors never
    /// propagate as `Err`.
    pub async fn fetch_with_fallback(&self, reference: &VideoReference) -> FetchResult {
        match self.fetch_one(reference).await {
            Ok(payload) => FetchResult::success(reference.clone(), payload),
            Err(e) => {
                let detail = match &e {
                    EngineError::TranscriptUnavailable { attempts } => {
                        format!("transcript unavailable: [{}]", attempts.join("; "))
                    }
                    other => other.to_string(),
                };
                FetchResult::error(reference.clone(), detail)
            }
        }
    }

    /// Run the full fallback chain for one video.
    pub async fn fetch_one(&self, reference: &VideoReference) -> EngineResult<FetchPayload> {
        let video_id = reference.canonical_id.as_str();
        let mut attempts: Vec<FetchAttempt> = Vec::new();

        // Stage 1: direct connection.
        match self.attempt(video_id, FetchMechanism::Direct, None, &mut attempts).await {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_content_level() => {
                return Err(EngineError::content_unavailable(e.to_string()));
            }
            Err(e) => {
                debug!(video_id, error = %e, "Direct fetch failed, falling back to proxy pool");
            }
        }

        // Stage 2: pooled proxies, a fresh endpoint per attempt.
        let mut used: HashSet<String> = HashSet::new();
        for pooled_attempt in 0..self.config.max_pooled_attempts {
            self.proxied_pause(pooled_attempt).await;

            let endpoint = match self.pool.acquire(&used).await {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(video_id, error = %e, "Proxy pool gave no endpoint, trying manual proxies");
                    attempts.push(chain_note(video_id, FetchMechanism::PooledProxy, e.to_string()));
                    break;
                }
            };
            used.insert(endpoint.address().to_string());

            let outcome = self
                .attempt(
                    video_id,
                    FetchMechanism::PooledProxy,
                    Some(endpoint.url()),
                    &mut attempts,
                )
                .await;
            match outcome {
                Ok(payload) => {
                    self.pool.record_outcome(&endpoint, true);
                    return Ok(payload);
                }
                Err(e) if e.is_content_level() => {
                    // The route worked; the video has nothing to give.
                    self.pool.record_outcome(&endpoint, true);
                    return Err(EngineError::content_unavailable(e.to_string()));
                }
                Err(e) => {
                    self.pool.record_outcome(&endpoint, false);
                    debug!(
                        video_id,
                        endpoint = endpoint.address(),
                        attempt = pooled_attempt + 1,
                        error = %e,
                        "Pooled fetch failed"
                    );
                }
            }
        }

        // Stage 3: manual proxies, in configured order, paced like the
        // pooled attempts.
        for (manual_attempt, proxy_url) in self.config.manual_proxies.iter().enumerate() {
            self.proxied_pause(manual_attempt as u32).await;
            let outcome = self
                .attempt(
                    video_id,
                    FetchMechanism::ManualProxy,
                    Some(proxy_url.clone()),
                    &mut attempts,
                )
                .await;
            match outcome {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_content_level() => {
                    return Err(EngineError::content_unavailable(e.to_string()));
                }
                Err(e) => {
                    debug!(video_id, proxy = %proxy_url, error = %e, "Manual proxy fetch failed");
                }
            }
        }

        metrics::counter!("fetch_chain_exhausted_total").increment(1);
        info!(
            video_id,
            attempt_count = attempts.len(),
            "Fallback chain exhausted"
        );
        Err(EngineError::TranscriptUnavailable {
            attempts: attempts.iter().map(|a| a.summary()).collect(),
        })
    }

    /// One transport attempt, recorded into the trail.
    async fn attempt(
        &self,
        video_id: &str,
        mechanism: FetchMechanism,
        proxy_url: Option<String>,
        attempts: &mut Vec<FetchAttempt>,
    ) -> Result<FetchPayload, TransportError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let outcome = self.transport.fetch(video_id, proxy_url.as_deref()).await;
        let latency = timer.elapsed();

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) if e.is_content_level() => "content_unavailable",
            Err(_) => "failure",
        };
        metrics::counter!(
            "fetch_attempts_total",
            "mechanism" => mechanism.to_string(),
            "outcome" => label,
        )
        .increment(1);

        attempts.push(FetchAttempt {
            canonical_id: video_id.to_string(),
            mechanism,
            proxy: proxy_url,
            started_at,
            latency,
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });
        outcome
    }

    /// Randomized pacing before each proxied attempt, plus exponential
    /// backoff once earlier attempts through the same mechanism have
    /// failed.
    async fn proxied_pause(&self, attempt: u32) {
        let delay = {
            let mut rng = rand::rng();
            let min_ms = self.config.pooled_delay_min.as_millis() as u64;
            let max_ms = (self.config.pooled_delay_max.as_millis() as u64).max(min_ms);
            std::time::Duration::from_millis(rng.random_range(min_ms..=max_ms))
        };
        tokio::time::sleep(delay).await;

        if attempt > 0 {
            let backoff = self
                .config
                .backoff_base
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(self.config.backoff_max);
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Trail entry for chain events that are not transport attempts.
fn chain_note(video_id: &str, mechanism: FetchMechanism, error: String) -> FetchAttempt {
    FetchAttempt {
        canonical_id: video_id.to_string(),
        mechanism,
        proxy: None,
        started_at: Utc::now(),
        latency: std::time::Duration::ZERO,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use itinera_models::reference::resolve;
    use itinera_models::{Transcript, TranscriptSegment};
    use itinera_proxy::{CandidateDescriptor, CandidateProvider, PoolConfig, ProxyResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ListProvider {
        addresses: Vec<String>,
    }

    #[async_trait]
    impl CandidateProvider for ListProvider {
        async fn fetch_candidates(&self) -> ProxyResult<Vec<CandidateDescriptor>> {
            Ok(self
                .addresses
                .iter()
                .map(|a| CandidateDescriptor {
                    address: a.clone(),
                    protocol: "http".to_string(),
                    anonymity: "elite".to_string(),
                })
                .collect())
        }
    }

    /// Transport whose behavior depends on the route used.
    struct ScriptedTransport {
        /// Outcome for direct (no proxy) attempts
        direct: ScriptedOutcome,
        /// Outcome for any pooled endpoint
        pooled: ScriptedOutcome,
        /// Outcome for manual proxies
        manual: ScriptedOutcome,
        calls: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    enum ScriptedOutcome {
        Ok,
        Blocked,
        NoCaptions,
    }

    impl ScriptedTransport {
        fn new(direct: ScriptedOutcome, pooled: ScriptedOutcome, manual: ScriptedOutcome) -> Self {
            Self {
                direct,
                pooled,
                manual,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn payload(video_id: &str) -> FetchPayload {
        FetchPayload {
            metadata: None,
            transcript: Transcript::from_segments(
                video_id,
                "en",
                false,
                vec![TranscriptSegment {
                    text: "hello".to_string(),
                    start: 0.0,
                    duration: 1.0,
                }],
            ),
        }
    }

    #[async_trait]
    impl TranscriptTransport for ScriptedTransport {
        async fn fetch(
            &self,
            video_id: &str,
            proxy_url: Option<&str>,
        ) -> Result<FetchPayload, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = match proxy_url {
                None => self.direct,
                Some(url) if url.contains("manual") => self.manual,
                Some(_) => self.pooled,
            };
            match outcome {
                ScriptedOutcome::Ok => Ok(payload(video_id)),
                ScriptedOutcome::Blocked => {
                    Err(TransportError::Blocked("status 429".to_string()))
                }
                ScriptedOutcome::NoCaptions => Err(TransportError::ContentUnavailable(
                    "no caption tracks".to_string(),
                )),
            }
        }
    }

    fn fast_config(manual: Vec<String>) -> EngineConfig {
        EngineConfig {
            pooled_delay_min: Duration::from_millis(1),
            pooled_delay_max: Duration::from_millis(2),
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(4),
            manual_proxies: manual,
            ..EngineConfig::default()
        }
    }

    fn pool_with(addresses: &[&str]) -> Arc<ProxyPool> {
        Arc::new(ProxyPool::new(
            Arc::new(ListProvider {
                addresses: addresses.iter().map(|s| s.to_string()).collect(),
            }),
            PoolConfig {
                min_pool_size: 1,
                retry_interval: Duration::from_secs(0),
                ..PoolConfig::default()
            },
        ))
    }

    fn orchestrator(
        transport: Arc<ScriptedTransport>,
        pool: Arc<ProxyPool>,
        manual: Vec<String>,
    ) -> FetchOrchestrator {
        FetchOrchestrator::new(transport, pool, fast_config(manual))
    }

    #[tokio::test]
    async fn test_direct_success_uses_no_proxy() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Ok,
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
        ));
        let orch = orchestrator(transport.clone(), pool_with(&["1.1.1.1:80"]), vec![]);

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let result = orch.fetch_with_fallback(&reference).await;
        assert!(result.is_usable());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_pool_after_direct_block() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Ok,
            ScriptedOutcome::Blocked,
        ));
        let orch = orchestrator(transport.clone(), pool_with(&["1.1.1.1:80"]), vec![]);

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let result = orch.fetch_with_fallback(&reference).await;
        assert!(result.is_usable());
        // Direct, then one pooled attempt.
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_content_error_short_circuits_the_chain() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::NoCaptions,
            ScriptedOutcome::Ok,
            ScriptedOutcome::Ok,
        ));
        let orch = orchestrator(
            transport.clone(),
            pool_with(&["1.1.1.1:80"]),
            vec!["http://manual:80".to_string()],
        );

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let err = orch.fetch_one(&reference).await.unwrap_err();
        assert!(matches!(err, EngineError::ContentUnavailable(_)));
        // No proxy attempt happened: the failure is a property of the video.
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_proxies_tried_after_pool() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Ok,
        ));
        let orch = orchestrator(
            transport.clone(),
            pool_with(&["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]),
            vec!["http://manual:80".to_string()],
        );

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let result = orch.fetch_with_fallback(&reference).await;
        assert!(result.is_usable());
        // Direct + three pooled + one manual.
        assert_eq!(transport.call_count(), 5);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_ordered_attempt_trail() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
        ));
        let orch = orchestrator(
            transport.clone(),
            pool_with(&["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]),
            vec!["http://manual:80".to_string()],
        );

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let err = orch.fetch_one(&reference).await.unwrap_err();
        match err {
            EngineError::TranscriptUnavailable { attempts } => {
                assert_eq!(attempts.len(), 5);
                assert!(attempts[0].starts_with("direct"));
                assert!(attempts[1].starts_with("pooled_proxy"));
                assert!(attempts[4].starts_with("manual_proxy"));
            }
            other => panic!("expected TranscriptUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manual_attempts_keep_the_delay_discipline() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
        ));
        let mut config = fast_config(vec![
            "http://manual-a:80".to_string(),
            "http://manual-b:80".to_string(),
            "http://manual-c:80".to_string(),
        ]);
        config.max_pooled_attempts = 0;
        config.pooled_delay_min = Duration::from_millis(25);
        config.pooled_delay_max = Duration::from_millis(30);
        let orch = FetchOrchestrator::new(transport, pool_with(&["1.1.1.1:80"]), config);

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let started = Instant::now();
        let err = orch.fetch_one(&reference).await.unwrap_err();
        assert!(matches!(err, EngineError::TranscriptUnavailable { .. }));
        // Three manual attempts, each preceded by at least the minimum
        // randomized pause.
        assert!(
            started.elapsed() >= Duration::from_millis(75),
            "manual attempts ran without pacing: {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_pooled_attempts_use_distinct_endpoints() {
        let transport = Arc::new(ScriptedTransport::new(
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
            ScriptedOutcome::Blocked,
        ));
        let pool = pool_with(&["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]);
        let orch = orchestrator(transport, pool, vec![]);

        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let err = orch.fetch_one(&reference).await.unwrap_err();
        match err {
            EngineError::TranscriptUnavailable { attempts } => {
                let pooled: Vec<&String> = attempts
                    .iter()
                    .filter(|a| a.starts_with("pooled_proxy"))
                    .collect();
                assert_eq!(pooled.len(), 3);
                let unique: HashSet<&&String> = pooled.iter().collect();
                assert_eq!(unique.len(), 3, "each pooled attempt used a fresh endpoint");
            }
            other => panic!("expected TranscriptUnavailable, got {other:?}"),
        }
    }
}
