//! Error types for the proxy pool.

use thiserror::Error;

/// Errors raised by the proxy pool and its candidate providers.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No acquirable endpoint remains, even after a refresh attempt.
    #[error("proxy pool exhausted: {0}")]
    PoolExhausted(String),

    /// The proxy-list provider could not be reached or returned garbage.
    #[error("proxy provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Network-level failure talking to the provider.
    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl ProxyError {
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::PoolExhausted(msg.into())
    }

    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
