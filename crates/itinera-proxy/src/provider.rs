//! Candidate providers: sources of raw proxy endpoint lists.
//!
//! The pool only ever talks to the [`CandidateProvider`] trait, so tests
//! and alternative list sources plug in without touching pool logic.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{ProxyError, ProxyResult};

/// A raw endpoint as listed by a provider, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDescriptor {
    /// `host:port`
    pub address: String,
    /// Proxy scheme (http, socks5)
    pub protocol: String,
    /// Reported anonymity level (transparent, anonymous, elite)
    pub anonymity: String,
}

/// Source of fresh proxy candidates.
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    async fn fetch_candidates(&self) -> ProxyResult<Vec<CandidateDescriptor>>;
}

/// JSON response shape of the public proxy-list API.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    proxies: Vec<ListedProxy>,
}

#[derive(Debug, Deserialize)]
struct ListedProxy {
    ip: String,
    port: u16,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    anonymity: Option<String>,
}

/// HTTP client for the free proxy-list API.
///
/// Tries the structured JSON format first and falls back to the plain-text
/// `host:port` line format when the JSON endpoint misbehaves.
pub struct HttpListProvider {
    client: reqwest::Client,
    base_url: String,
    config: PoolConfig,
}

/// Public proxy-list API endpoint.
const DEFAULT_LIST_URL: &str = "https://api.proxyscrape.com/v2/";

impl HttpListProvider {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_base_url(config, DEFAULT_LIST_URL)
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_base_url(config: PoolConfig, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            config,
        }
    }

    fn query(&self, format: &str) -> Vec<(String, String)> {
        vec![
            ("request".to_string(), "displayproxies".to_string()),
            ("protocol".to_string(), "http".to_string()),
            (
                "timeout".to_string(),
                self.config.provider_timeout_ms.to_string(),
            ),
            ("country".to_string(), self.config.country.clone()),
            ("ssl".to_string(), "all".to_string()),
            ("anonymity".to_string(), self.config.anonymity.clone()),
            ("format".to_string(), format.to_string()),
        ]
    }

    async fn fetch_json(&self) -> ProxyResult<Vec<CandidateDescriptor>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query("json"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProxyError::provider_unavailable(format!(
                "list endpoint returned {}",
                response.status()
            )));
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::provider_unavailable(format!("bad json payload: {e}")))?;

        Ok(body
            .proxies
            .into_iter()
            .map(|p| CandidateDescriptor {
                address: format!("{}:{}", p.ip, p.port),
                protocol: p.protocol.unwrap_or_else(|| "http".to_string()),
                anonymity: p
                    .anonymity
                    .unwrap_or_else(|| self.config.anonymity.clone()),
            })
            .collect())
    }

    async fn fetch_text(&self) -> ProxyResult<Vec<CandidateDescriptor>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query("textplain"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProxyError::provider_unavailable(format!(
                "list endpoint returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(parse_text_list(&body, &self.config.anonymity))
    }
}

/// Parse the `host:port` line format, skipping lines that do not look like
/// an endpoint. The plain-text format carries no per-proxy anonymity, so
/// the requested filter level is assumed.
fn parse_text_list(body: &str, anonymity: &str) -> Vec<CandidateDescriptor> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (host, port) = line.rsplit_once(':')?;
            if host.is_empty() || port.parse::<u16>().is_err() {
                return None;
            }
            Some(CandidateDescriptor {
                address: line.to_string(),
                protocol: "http".to_string(),
                anonymity: anonymity.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl CandidateProvider for HttpListProvider {
    async fn fetch_candidates(&self) -> ProxyResult<Vec<CandidateDescriptor>> {
        match self.fetch_json().await {
            Ok(candidates) if !candidates.is_empty() => {
                debug!(count = candidates.len(), "Fetched proxy candidates (json)");
                return Ok(candidates);
            }
            Ok(_) => {
                debug!("JSON proxy list was empty, trying text format");
            }
            Err(e) => {
                warn!(error = %e, "JSON proxy list fetch failed, trying text format");
            }
        }

        let candidates = self.fetch_text().await?;
        if candidates.is_empty() {
            return Err(ProxyError::provider_unavailable(
                "provider returned no usable candidates",
            ));
        }
        debug!(count = candidates.len(), "Fetched proxy candidates (text)");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_text_list_skips_garbage() {
        let body = "1.2.3.4:8080\n\nnot a proxy\n5.6.7.8:3128\n9.9.9.9:notaport\n";
        let candidates = parse_text_list(body, "elite");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].address, "1.2.3.4:8080");
        assert_eq!(candidates[1].address, "5.6.7.8:3128");
    }

    #[tokio::test]
    async fn test_fetch_json_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "proxies": [
                    {"ip": "1.2.3.4", "port": 8080, "protocol": "http"},
                    {"ip": "5.6.7.8", "port": 3128}
                ]
            })))
            .mount(&server)
            .await;

        let provider = HttpListProvider::with_base_url(PoolConfig::default(), server.uri());
        let candidates = provider.fetch_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].address, "1.2.3.4:8080");
        assert_eq!(candidates[1].protocol, "http");
    }

    #[tokio::test]
    async fn test_falls_back_to_text_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("format", "textplain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.2.3.4:8080\n5.6.7.8:3128"))
            .mount(&server)
            .await;

        let provider = HttpListProvider::with_base_url(PoolConfig::default(), server.uri());
        let candidates = provider.fetch_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_both_formats_down_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpListProvider::with_base_url(PoolConfig::default(), server.uri());
        let err = provider.fetch_candidates().await.unwrap_err();
        assert!(matches!(err, ProxyError::ProviderUnavailable(_)));
    }
}
