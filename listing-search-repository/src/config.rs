//! Configuration types for the SearchGateway and its backends.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::SearchError;

/// Default bound on the health check.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Identifies which search backend a gateway should own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendVendor {
    /// Hosted full-text index (Meilisearch HTTP API).
    Meilisearch,
    /// Self-hosted text-search cluster.
    OpenSearch,
    /// Relational fallback querying the catalog directly.
    Postgres,
    /// Process-local index.
    Memory,
    /// Always-empty backend for deployments without search.
    Noop,
}

impl BackendVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendVendor::Meilisearch => "meilisearch",
            BackendVendor::OpenSearch => "opensearch",
            BackendVendor::Postgres => "postgres",
            BackendVendor::Memory => "memory",
            BackendVendor::Noop => "noop",
        }
    }
}

impl fmt::Display for BackendVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendVendor {
    type Err = SearchError;

    /// Parse a vendor identifier (case-insensitive).
    ///
    /// Unknown identifiers are a configuration error: there is no silent
    /// default backend.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "meilisearch" | "meili" | "hosted" => Ok(Self::Meilisearch),
            "opensearch" | "cluster" => Ok(Self::OpenSearch),
            "postgres" | "postgresql" | "database" | "fallback" => Ok(Self::Postgres),
            "memory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            "noop" | "none" | "disabled" => Ok(Self::Noop),
            other => Err(SearchError::config(format!(
                "Unknown search vendor '{}'",
                other
            ))),
        }
    }
}

/// Connection settings for the OpenSearch backend.
#[derive(Debug, Clone)]
pub struct OpenSearchSettings {
    pub url: String,
    /// Alias every read and write goes through.
    pub alias: String,
    /// Version of the physical index created on first start.
    pub version: u32,
}

impl Default for OpenSearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            alias: "listings".to_string(),
            version: 0,
        }
    }
}

/// Connection settings for the Meilisearch backend.
#[derive(Debug, Clone)]
pub struct MeilisearchSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub index_uid: String,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
}

impl Default for MeilisearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:7700".to_string(),
            api_key: None,
            index_uid: "listings".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything any backend may need to connect.
///
/// Only the settings of the selected vendor are read. The PostgreSQL backend
/// needs `postgres_pool` to be set.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub opensearch: OpenSearchSettings,
    pub meilisearch: MeilisearchSettings,
    pub postgres_pool: Option<sqlx::PgPool>,
}

/// Configuration for the SearchGateway.
#[derive(Debug, Clone)]
pub struct SearchGatewayConfig {
    /// Bound on `is_healthy`. A check that takes longer reports unhealthy.
    pub health_check_timeout: Duration,

    /// Maximum number of documents accepted by a single `reindex_all`.
    ///
    /// `None` (the default) accepts any corpus size.
    pub max_reindex_batch: Option<usize>,
}

impl Default for SearchGatewayConfig {
    fn default() -> Self {
        Self {
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
            max_reindex_batch: None,
        }
    }
}

impl SearchGatewayConfig {
    /// Create a config with a custom health check bound.
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// Create a config with a reindex batch size limit.
    pub fn with_max_reindex_batch(mut self, max: usize) -> Self {
        self.max_reindex_batch = Some(max);
        self
    }
}
