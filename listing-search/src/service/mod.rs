//! Discovery service.
//!
//! The facade callers use for search, trending, recommendations, index
//! maintenance and click signals. Searches that fail because the primary
//! backend is unreachable are retried on the fallback gateway, when one is
//! configured.

use std::sync::Arc;

use listing_search_repository::{
    CatalogStore, ReindexSummary, SearchError, SearchGateway, TrendingCacheStore,
};
use listing_search_shared::{
    ListingDocument, RecommendationResult, SearchQuery, SearchResult, TrendingResult,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clicks::{ClickEvent, ClickTracker, TracingClickTracker};
use crate::errors::DiscoveryError;
use crate::recommendation::RecommendationEngine;
use crate::trending::TrendingEngine;

pub struct DiscoveryService {
    gateway: Arc<SearchGateway>,
    fallback: Option<Arc<SearchGateway>>,
    catalog: Arc<dyn CatalogStore>,
    trending: TrendingEngine,
    recommendations: RecommendationEngine,
    clicks: Arc<dyn ClickTracker>,
}

impl DiscoveryService {
    /// Create a service with default engine weights, no fallback gateway and
    /// clicks written to the log.
    pub fn new(
        gateway: Arc<SearchGateway>,
        catalog: Arc<dyn CatalogStore>,
        trending_cache: Arc<dyn TrendingCacheStore>,
    ) -> Self {
        Self {
            gateway,
            fallback: None,
            trending: TrendingEngine::new(catalog.clone(), trending_cache),
            recommendations: RecommendationEngine::new(catalog.clone()),
            catalog,
            clicks: Arc::new(TracingClickTracker),
        }
    }

    /// Route searches to `fallback` when the primary gateway is unreachable.
    pub fn with_fallback(mut self, fallback: Arc<SearchGateway>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_click_tracker(mut self, clicks: Arc<dyn ClickTracker>) -> Self {
        self.clicks = clicks;
        self
    }

    pub fn with_trending_engine(mut self, trending: TrendingEngine) -> Self {
        self.trending = trending;
        self
    }

    pub fn with_recommendation_engine(mut self, recommendations: RecommendationEngine) -> Self {
        self.recommendations = recommendations;
        self
    }

    /// Identifier of the primary backend.
    pub fn backend_name(&self) -> &'static str {
        self.gateway.backend_name()
    }

    /// Execute a search.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - From the primary gateway, or from the fallback
    ///   when the primary could not be reached
    /// * `Err(SearchError)` - Validation errors and backend failures other
    ///   than unavailability, or the fallback's error
    #[instrument(skip(self, query), fields(backend = self.gateway.backend_name()))]
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        match self.gateway.search(query).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_unavailable() => match self.fallback {
                Some(ref fallback) => {
                    warn!(
                        error = %e,
                        fallback = fallback.backend_name(),
                        "Primary search backend unavailable, using fallback"
                    );
                    fallback.search(query).await
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Top `limit` trending listings.
    ///
    /// Served from the trending cache; when the cache is empty the backend's
    /// native trending is used. Failures yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_trending(&self, limit: usize) -> Vec<TrendingResult> {
        if limit == 0 {
            return Vec::new();
        }

        let cached = self.trending.top(limit).await;
        if !cached.is_empty() {
            return cached;
        }

        match self.gateway.get_trending(limit).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Backend trending failed");
                Vec::new()
            }
        }
    }

    /// Listings related to `resource_id`.
    ///
    /// Computed by the recommendation engine; when it finds nothing the
    /// backend's native similarity is used. Failures yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_recommendations(
        &self,
        resource_id: Uuid,
        limit: usize,
    ) -> Vec<RecommendationResult> {
        let computed = self.recommendations.recommend(resource_id, limit).await;
        if !computed.is_empty() || limit == 0 {
            return computed;
        }

        match self.gateway.get_recommendations(resource_id, limit).await {
            Ok(mut results) => {
                results.retain(|r| r.id != resource_id);
                results.truncate(limit);
                results
            }
            Err(e) => {
                warn!(error = %e, "Backend recommendations failed");
                Vec::new()
            }
        }
    }

    /// Insert or replace a listing in the search index.
    ///
    /// A listing whose indexing failed with a retryable error must not be
    /// treated as published.
    #[instrument(skip(self, document), fields(resource_id = %document.id))]
    pub async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        self.gateway.index_resource(document).await
    }

    #[instrument(skip(self))]
    pub async fn remove_resource(&self, resource_id: Uuid) -> Result<(), SearchError> {
        self.gateway.remove_resource(resource_id).await
    }

    /// Replace the search corpus with `documents`.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        self.gateway.reindex_all(documents).await
    }

    /// Rebuild the search corpus from the catalog's current listings.
    #[instrument(skip(self))]
    pub async fn reindex_from_catalog(&self) -> Result<ReindexSummary, DiscoveryError> {
        let listings = self.catalog.list_searchable_listings().await?;
        let total = listings.len();
        let documents: Vec<ListingDocument> = listings
            .into_iter()
            .filter(ListingDocument::is_searchable)
            .collect();

        if documents.len() < total {
            debug!(
                skipped = total - documents.len(),
                "Skipped catalog rows that are not searchable"
            );
        }

        let summary = self.gateway.reindex_all(&documents).await?;
        info!(indexed = summary.indexed, "Search corpus rebuilt from catalog");
        Ok(summary)
    }

    /// Recompute the trending cache.
    pub async fn refresh_trending(&self) -> Result<usize, DiscoveryError> {
        Ok(self.trending.refresh().await?)
    }

    /// Record that `resource_id` was clicked on the results of `query`.
    pub fn track_click(&self, query: &str, resource_id: Uuid, session_id: &str) {
        self.clicks
            .track(ClickEvent::new(query, resource_id, session_id));
    }

    /// Bounded health check of the primary backend.
    pub async fn is_healthy(&self) -> bool {
        self.gateway.is_healthy().await
    }
}
