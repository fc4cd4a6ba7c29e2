//! Search gateway implementation.
//!
//! This module provides the single entry point application code uses to talk
//! to whichever search backend is configured.

use listing_search_shared::{
    ListingDocument, RecommendationResult, SearchQuery, SearchResult, TrendingResult,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{BackendSettings, BackendVendor, SearchGatewayConfig};
use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::meilisearch::MeilisearchBackend;
use crate::memory::InMemorySearchBackend;
use crate::noop::NoopSearchBackend;
use crate::opensearch::{IndexConfig, OpenSearchBackend};
use crate::postgres::PostgresSearchBackend;
use crate::types::ReindexSummary;

/// The main entry point for search operations.
///
/// Owns exactly one `SearchBackend`, fixed at construction. It validates
/// queries before dispatch, guards full rebuilds with a batch-size limit and
/// bounds the health check with a timeout; everything else passes through.
///
/// # Example
///
/// ```no_run
/// use listing_search_repository::{BackendSettings, SearchGateway, SearchGatewayConfig};
/// use listing_search_shared::SearchQuery;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = SearchGateway::connect(
///     "opensearch",
///     &BackendSettings::default(),
///     SearchGatewayConfig::default(),
/// )
/// .await?;
///
/// let result = gateway.search(&SearchQuery::text("zone defense")).await?;
/// println!("{} hits", result.total_hits);
/// # Ok(())
/// # }
/// ```
pub struct SearchGateway {
    backend: Box<dyn SearchBackend>,
    config: SearchGatewayConfig,
}

impl SearchGateway {
    /// Create a gateway around an existing backend with default configuration.
    pub fn new(backend: Box<dyn SearchBackend>) -> Self {
        Self {
            backend,
            config: SearchGatewayConfig::default(),
        }
    }

    /// Create a gateway around an existing backend with custom configuration.
    pub fn with_config(backend: Box<dyn SearchBackend>, config: SearchGatewayConfig) -> Self {
        Self { backend, config }
    }

    /// Build the backend named by `vendor` and wrap it in a gateway.
    ///
    /// # Arguments
    ///
    /// * `vendor` - Backend identifier, e.g. "meilisearch", "opensearch", "postgres"
    /// * `settings` - Connection settings; only the selected vendor's are read
    /// * `config` - Gateway configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SearchGateway)` - A gateway owning the new backend
    /// * `Err(SearchError::ConfigError)` - If the vendor is unknown or its
    ///   settings are incomplete
    pub async fn connect(
        vendor: &str,
        settings: &BackendSettings,
        config: SearchGatewayConfig,
    ) -> Result<Self, SearchError> {
        let vendor: BackendVendor = vendor.parse()?;

        let backend: Box<dyn SearchBackend> = match vendor {
            BackendVendor::Meilisearch => Box::new(MeilisearchBackend::new(&settings.meilisearch)?),
            BackendVendor::OpenSearch => {
                let index_config = IndexConfig::new(
                    settings.opensearch.alias.clone(),
                    settings.opensearch.version,
                );
                Box::new(OpenSearchBackend::new(&settings.opensearch.url, index_config).await?)
            }
            BackendVendor::Postgres => {
                let pool = settings.postgres_pool.clone().ok_or_else(|| {
                    SearchError::config("The postgres search backend requires a database pool")
                })?;
                Box::new(PostgresSearchBackend::new(pool))
            }
            BackendVendor::Memory => Box::new(InMemorySearchBackend::new()),
            BackendVendor::Noop => Box::new(NoopSearchBackend),
        };

        info!(vendor = %vendor, "Search gateway ready");
        Ok(Self::with_config(backend, config))
    }

    /// Identifier of the wrapped backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchError> {
        if let Some(max) = self.config.max_reindex_batch {
            if size > max {
                return Err(SearchError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Create the index, aliases and settings the backend needs.
    pub async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        self.backend.ensure_index_exists().await
    }

    /// Execute a search.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The requested page; zero hits is a valid result
    /// * `Err(SearchError::ValidationError)` - If the query is invalid
    /// * `Err(SearchError)` - If the backend failed or could not be reached
    #[instrument(skip(self, query), fields(backend = self.backend.name(), page = query.page))]
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        query.validate().map_err(SearchError::ValidationError)?;
        self.backend.search(query).await
    }

    /// Insert or replace a single document.
    ///
    /// A failure is retryable and means the listing is not searchable yet.
    pub async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        self.backend.index_resource(document).await
    }

    /// Delete a single document. Unknown ids are not an error.
    pub async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError> {
        self.backend.remove_resource(id).await
    }

    /// Replace the whole corpus.
    ///
    /// # Returns
    ///
    /// * `Ok(ReindexSummary)` - The new corpus is live
    /// * `Err(SearchError::BatchSizeExceeded)` - If the corpus exceeds the configured limit
    /// * `Err(SearchError)` - If the rebuild failed; the previous corpus stays live
    #[instrument(
        skip(self, documents),
        fields(backend = self.backend.name(), documents = documents.len())
    )]
    pub async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        self.validate_batch_size(documents.len())?;
        let summary = self.backend.reindex_all(documents).await?;
        info!(
            indexed = summary.indexed,
            active_index = ?summary.active_index,
            "Corpus rebuilt"
        );
        Ok(summary)
    }

    /// Backend-native trending listings, empty when unsupported.
    pub async fn get_trending(&self, limit: usize) -> Result<Vec<TrendingResult>, SearchError> {
        self.backend.get_trending(limit).await
    }

    /// Backend-native related listings, empty when unsupported.
    pub async fn get_recommendations(
        &self,
        id: Uuid,
        limit: usize,
    ) -> Result<Vec<RecommendationResult>, SearchError> {
        self.backend.get_recommendations(id, limit).await
    }

    /// Liveness check bounded by `health_check_timeout`.
    ///
    /// A check that does not answer in time reports unhealthy.
    pub async fn is_healthy(&self) -> bool {
        match tokio::time::timeout(self.config.health_check_timeout, self.backend.is_healthy())
            .await
        {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!(
                    backend = self.backend.name(),
                    timeout_ms = self.config.health_check_timeout.as_millis() as u64,
                    "Health check timed out"
                );
                false
            }
        }
    }
}
