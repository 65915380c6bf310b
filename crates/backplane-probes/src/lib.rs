//! backplane-probes - Concrete data store backends
//!
//! Each backend implements both [`BackendProbe`](backplane_core::BackendProbe)
//! and [`QueryExecutor`](backplane_core::QueryExecutor):
//!
//! - [`RedisBackend`] - key-value
//! - [`PostgresBackend`] - relational
//! - [`ElasticsearchBackend`] - search
//! - [`QdrantBackend`] - vector
//!
//! [`MockBackend`] stands in for any of them in tests and demo mode.

pub mod config;
pub mod http;
pub mod mock;
pub mod postgres;
pub mod redis;
pub mod search;
pub mod vector;

pub use config::{
    BackendsConfig, ConfigError, ElasticsearchConfig, PostgresConfig, ProbeConfig, QdrantConfig,
    RedisConfig,
};
pub use mock::MockBackend;
pub use postgres::PostgresBackend;
pub use redis::RedisBackend;
pub use search::ElasticsearchBackend;
pub use vector::QdrantBackend;
