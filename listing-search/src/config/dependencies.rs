//! Dependency initialization and wiring for the listing search worker.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use listing_search_repository::{
    BackendSettings, BackendVendor, PostgresCatalogStore, PostgresTrendingCache, SearchError,
    SearchGateway, MIGRATOR,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::settings::{ConnectionMode, ServiceSettings};
use crate::service::DiscoveryService;
use crate::worker::{Worker, WorkerConfig};
use crate::AppError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The discovery service, shared with the worker.
    pub service: Arc<DiscoveryService>,
    /// The configured worker ready to run.
    pub worker: Worker,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`ServiceSettings::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If initialization fails (connection failures only
    ///   in fail-fast mode)
    pub async fn new() -> Result<Self, AppError> {
        Self::from_settings(ServiceSettings::from_env()).await
    }

    /// Initialize all dependencies from `settings`.
    pub async fn from_settings(settings: ServiceSettings) -> Result<Self, AppError> {
        info!(
            search_vendor = %settings.search_vendor,
            fallback_vendor = ?settings.fallback_vendor,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            trending_refresh_interval_secs = settings.trending_refresh_interval.as_secs(),
            "Initializing dependencies"
        );

        let pool = connect_pool(&settings).await?;

        info!("Database connection established");

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AppError::config(format!("Failed to run migrations: {}", e)))?;

        let backend_settings = BackendSettings {
            opensearch: settings.opensearch.clone(),
            meilisearch: settings.meilisearch.clone(),
            postgres_pool: Some(pool.clone()),
        };

        let gateway =
            Self::connect_gateway(&settings.search_vendor, &backend_settings, &settings).await?;

        let mut service = DiscoveryService::new(
            Arc::new(gateway),
            Arc::new(PostgresCatalogStore::new(pool.clone())),
            Arc::new(PostgresTrendingCache::new(pool.clone())),
        );

        if let Some(ref fallback_vendor) = settings.fallback_vendor {
            let fallback =
                Self::connect_gateway(fallback_vendor, &backend_settings, &settings).await?;
            service = service.with_fallback(Arc::new(fallback));
        }

        let service = Arc::new(service);
        let worker = Worker::new(
            service.clone(),
            WorkerConfig {
                trending_refresh_interval: settings.trending_refresh_interval,
                reindex_on_start: settings.reindex_on_start,
            },
        );

        Ok(Self { service, worker })
    }

    /// Build a gateway for `vendor` and make sure its index exists.
    ///
    /// Unknown vendors fail immediately; unreachable backends follow the
    /// connection mode.
    async fn connect_gateway(
        vendor: &str,
        backend_settings: &BackendSettings,
        settings: &ServiceSettings,
    ) -> Result<SearchGateway, AppError> {
        vendor.parse::<BackendVendor>()?;

        let gateway = with_connection_mode(
            vendor,
            settings.connection_mode,
            settings.retry_interval,
            move || async move {
                let gateway =
                    SearchGateway::connect(vendor, backend_settings, settings.gateway.clone())
                        .await?;
                gateway.ensure_index_exists().await?;
                Ok::<_, SearchError>(gateway)
            },
        )
        .await?;

        info!(vendor = %vendor, backend = gateway.backend_name(), "Search gateway initialized");
        Ok(gateway)
    }
}

/// Run `attempt` until it succeeds, or once in fail-fast mode.
async fn with_connection_mode<T, E, F, Fut>(
    target: &str,
    mode: ConnectionMode,
    retry_interval: Duration,
    mut attempt: F,
) -> Result<T, AppError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(AppError::config(format!(
                        "Failed to connect to {}: {}",
                        target, e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        target_name = %target,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to connect, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}

/// Connect the catalog database pool according to the connection mode.
async fn connect_pool(settings: &ServiceSettings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::config("DATABASE_URL must be set"))?;
    with_connection_mode(
        "database",
        settings.connection_mode,
        settings.retry_interval,
        || {
            PgPoolOptions::new()
                .max_connections(settings.database_max_connections)
                .connect(database_url)
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fail_fast_returns_first_error() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), AppError> = with_connection_mode(
            "search",
            ConnectionMode::FailFast,
            Duration::from_secs(15),
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("refused") }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::ConfigError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let attempts = AtomicUsize::new(0);
        let value = with_connection_mode(
            "search",
            ConnectionMode::Retry,
            Duration::from_secs(15),
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("refused")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_database_url_is_config_error() {
        let settings = ServiceSettings::from_lookup(|_| None);
        let result = Dependencies::from_settings(settings).await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
