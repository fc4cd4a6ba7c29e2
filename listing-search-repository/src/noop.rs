//! Search backend for deployments without a search service.

use async_trait::async_trait;
use listing_search_shared::{ListingDocument, SearchQuery, SearchResult};
use tracing::debug;
use uuid::Uuid;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::types::ReindexSummary;

/// A [`SearchBackend`] that stores nothing and finds nothing.
///
/// Every operation succeeds with a well-formed empty result, so callers need
/// no special casing when search is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchBackend;

#[async_trait]
impl SearchBackend for NoopSearchBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        Ok(SearchResult::empty(query.page, query.page_size))
    }

    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        debug!(doc_id = %document.id, "Search disabled, skipping index");
        Ok(())
    }

    async fn remove_resource(&self, _id: Uuid) -> Result<(), SearchError> {
        Ok(())
    }

    async fn reindex_all(
        &self,
        _documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        Ok(ReindexSummary::new(0))
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
