//! Search backend trait definition.
//!
//! This module defines the abstract interface for search backend operations,
//! allowing for different backend implementations (Meilisearch, OpenSearch,
//! PostgreSQL, in-memory, no-op).

use async_trait::async_trait;
use listing_search_shared::{
    ListingDocument, RecommendationResult, SearchQuery, SearchResult, TrendingResult,
};
use uuid::Uuid;

use crate::errors::SearchError;
use crate::types::ReindexSummary;

/// Abstracts the underlying search backend implementation.
///
/// Implementations are injected into `SearchGateway`, which is the only type
/// application code talks to. A new backend is added by implementing this
/// trait; no implementation builds on another one.
///
/// # Contract
///
/// - `search` never fails for a query that passes `SearchQuery::validate`:
///   zero hits is a valid result. Errors are reserved for backend failures.
/// - The listed/active visibility filter is applied on every search, in
///   addition to whatever filters the caller supplies.
/// - `index_resource` and `remove_resource` are idempotent.
/// - `reindex_all` is atomic from the caller's point of view.
/// - `get_trending` and `get_recommendations` are optional fast paths; a
///   backend without native support returns an empty vector.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Ensure the search index and any required aliases or settings exist,
    /// creating them if necessary.
    ///
    /// Called during application startup. Backends without index state keep
    /// the default no-op.
    async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        Ok(())
    }

    /// Execute a search.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The requested page, possibly empty
    /// * `Err(SearchError)` - If the backend failed or could not be reached
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError>;

    /// Insert or replace a single document.
    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError>;

    /// Delete a single document.
    ///
    /// If the document doesn't exist, the operation is considered successful.
    async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError>;

    /// Replace the whole corpus with `documents`.
    ///
    /// Readers observe either the old corpus or the new one. If the rebuild
    /// fails, the old corpus stays active. An empty slice produces an empty
    /// but queryable corpus.
    async fn reindex_all(&self, documents: &[ListingDocument])
        -> Result<ReindexSummary, SearchError>;

    /// Natively computed trending listings, if the backend supports it.
    async fn get_trending(&self, _limit: usize) -> Result<Vec<TrendingResult>, SearchError> {
        Ok(Vec::new())
    }

    /// Natively computed related listings, if the backend supports it.
    async fn get_recommendations(
        &self,
        _id: Uuid,
        _limit: usize,
    ) -> Result<Vec<RecommendationResult>, SearchError> {
        Ok(Vec::new())
    }

    /// Cheap liveness check.
    ///
    /// Implementations should answer quickly; the gateway additionally bounds
    /// the call with a timeout.
    async fn is_healthy(&self) -> bool;
}
