//! Service settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use listing_search_repository::{
    MeilisearchSettings, OpenSearchSettings, SearchGatewayConfig, DEFAULT_HEALTH_CHECK_TIMEOUT,
};
use tracing::warn;

/// Default primary search vendor.
pub const DEFAULT_SEARCH_VENDOR: &str = "postgres";

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default OpenSearch alias.
pub const DEFAULT_INDEX_ALIAS: &str = "listings";

/// Default Meilisearch URL.
pub const DEFAULT_MEILISEARCH_URL: &str = "http://localhost:7700";

/// Default Meilisearch index uid.
pub const DEFAULT_MEILISEARCH_INDEX_UID: &str = "listings";

/// Default trending refresh interval in seconds.
pub const DEFAULT_TRENDING_REFRESH_INTERVAL_SECS: u64 = 900;

/// Default database connection retry interval in seconds.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default size of the database pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// What to do when a dependency cannot be reached at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection on a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("fail-fast") | Some("failfast") | Some("fail_fast") => Self::FailFast,
            Some("retry") | None => Self::Retry,
            Some(_) => {
                warn!("Invalid DATABASE_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything the worker needs to wire its dependencies.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub search_vendor: String,
    pub fallback_vendor: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub opensearch: OpenSearchSettings,
    pub meilisearch: MeilisearchSettings,
    pub gateway: SearchGatewayConfig,
    pub trending_refresh_interval: Duration,
    pub reindex_on_start: bool,
}

impl ServiceSettings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_VENDOR`: Primary backend (default: postgres)
    /// - `SEARCH_FALLBACK_VENDOR`: Backend used when the primary is unreachable (default: none)
    /// - `DATABASE_URL`: Catalog database, required
    /// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
    /// - `DATABASE_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `DATABASE_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_ALIAS`: OpenSearch alias name (default: "listings")
    /// - `LISTINGS_INDEX_VERSION`: Initial physical index version (default: 0)
    /// - `MEILISEARCH_URL`: Meilisearch URL (default: http://localhost:7700)
    /// - `MEILISEARCH_API_KEY`: Meilisearch API key (default: none)
    /// - `MEILISEARCH_INDEX_UID`: Meilisearch index uid (default: "listings")
    /// - `HEALTH_CHECK_TIMEOUT_MS`: Bound on health checks (default: 2000)
    /// - `MAX_REINDEX_BATCH`: Largest accepted full rebuild (default: unlimited)
    /// - `TRENDING_REFRESH_INTERVAL_SECS`: Trending refresh period (default: 900)
    /// - `REINDEX_ON_START`: Rebuild the search corpus at startup (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let health_check_timeout = parse_or(
            "HEALTH_CHECK_TIMEOUT_MS",
            get("HEALTH_CHECK_TIMEOUT_MS"),
            DEFAULT_HEALTH_CHECK_TIMEOUT.as_millis() as u64,
        );
        let mut gateway = SearchGatewayConfig::default()
            .with_health_check_timeout(Duration::from_millis(health_check_timeout));
        if let Some(max) = get("MAX_REINDEX_BATCH").and_then(|v| v.parse::<usize>().ok()) {
            gateway = gateway.with_max_reindex_batch(max);
        }

        let meilisearch_defaults = MeilisearchSettings::default();

        Self {
            search_vendor: get("SEARCH_VENDOR")
                .unwrap_or_else(|| DEFAULT_SEARCH_VENDOR.to_string()),
            fallback_vendor: get("SEARCH_FALLBACK_VENDOR"),
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            ),
            connection_mode: ConnectionMode::parse(get("DATABASE_CONNECTION_MODE").as_deref()),
            retry_interval: Duration::from_secs(parse_or(
                "DATABASE_RETRY_INTERVAL_SECS",
                get("DATABASE_RETRY_INTERVAL_SECS"),
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            opensearch: OpenSearchSettings {
                url: get("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
                alias: get("INDEX_ALIAS").unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string()),
                version: parse_or("LISTINGS_INDEX_VERSION", get("LISTINGS_INDEX_VERSION"), 0),
            },
            meilisearch: MeilisearchSettings {
                url: get("MEILISEARCH_URL").unwrap_or_else(|| DEFAULT_MEILISEARCH_URL.to_string()),
                api_key: get("MEILISEARCH_API_KEY"),
                index_uid: get("MEILISEARCH_INDEX_UID")
                    .unwrap_or_else(|| DEFAULT_MEILISEARCH_INDEX_UID.to_string()),
                request_timeout: meilisearch_defaults.request_timeout,
            },
            gateway,
            trending_refresh_interval: Duration::from_secs(
                parse_or(
                    "TRENDING_REFRESH_INTERVAL_SECS",
                    get("TRENDING_REFRESH_INTERVAL_SECS"),
                    DEFAULT_TRENDING_REFRESH_INTERVAL_SECS,
                )
                .max(1),
            ),
            reindex_on_start: get("REINDEX_ON_START")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
        }
    }
}

/// Parse `value`, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, "Invalid value, using default");
            default
        }),
    }
}
