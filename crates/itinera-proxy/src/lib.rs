//! Scored, TTL-refreshed proxy pool for resilient outbound fetching.
//!
//! The pool pulls candidate endpoints from a pluggable provider, tracks a
//! moving success score per endpoint, and evicts endpoints that fail
//! repeatedly. Selection is weighted-random over scores so traffic drifts
//! toward endpoints that keep working.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod pool;
pub mod provider;

pub use config::PoolConfig;
pub use endpoint::{EndpointSnapshot, EndpointState, ProxyEndpoint};
pub use error::{ProxyError, ProxyResult};
pub use pool::{PoolStats, ProxyPool};
pub use provider::{CandidateDescriptor, CandidateProvider, HttpListProvider};
