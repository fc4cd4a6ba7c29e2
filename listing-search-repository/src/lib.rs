//! # Listing Search Repository
//!
//! This crate provides the search backend contract and its implementations
//! (Meilisearch, OpenSearch, PostgreSQL, in-memory and no-op), the gateway
//! that owns the configured backend, and read access to the marketplace
//! catalog and trending cache.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod interfaces;
pub mod meilisearch;
pub mod memory;
pub mod noop;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use config::{
    BackendSettings, BackendVendor, MeilisearchSettings, OpenSearchSettings, SearchGatewayConfig,
    DEFAULT_HEALTH_CHECK_TIMEOUT,
};
pub use errors::{CatalogError, SearchError};
pub use gateway::SearchGateway;
pub use interfaces::{CatalogStore, SearchBackend, TrendingCacheStore};
pub use meilisearch::MeilisearchBackend;
pub use memory::{InMemorySearchBackend, InMemoryTrendingCache};
pub use noop::NoopSearchBackend;
pub use opensearch::OpenSearchBackend;
pub use postgres::{PostgresCatalogStore, PostgresSearchBackend, PostgresTrendingCache, MIGRATOR};
pub use types::ReindexSummary;
