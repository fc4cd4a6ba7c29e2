//! Relational fallback search backend.
//!
//! Answers searches straight from the catalog tables with `ILIKE` text
//! matching and structured filters. Relevance is coarse, but it needs no
//! external index and stays available whenever the database is.

use std::time::Instant;

use async_trait::async_trait;
use listing_search_shared::{
    FacetCounts, ListingDocument, SearchHit, SearchQuery, SearchResult, TrendingResult,
};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::SearchError;
use crate::interfaces::{SearchBackend, TrendingCacheStore};
use crate::postgres::listing_row::ListingRow;
use crate::postgres::sql;
use crate::postgres::trending_cache::PostgresTrendingCache;
use crate::types::ReindexSummary;

/// PostgreSQL implementation of `SearchBackend`.
///
/// The catalog is the source of truth, so index mutations are accepted and
/// ignored: a listing is searchable here as soon as its row is listed and
/// active.
pub struct PostgresSearchBackend {
    pool: PgPool,
    trending: PostgresTrendingCache,
}

impl PostgresSearchBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            trending: PostgresTrendingCache::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl SearchBackend for PostgresSearchBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let started = Instant::now();

        let mut count_builder = sql::build_count_query(query);
        let total_hits: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_builder = sql::build_search_query(query);
        let rows: Vec<ListingRow> = page_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| SearchHit::from(ListingDocument::from(row)))
            .collect();

        // Facets cover the returned page only.
        let facets = FacetCounts::from_hits(&hits);
        let took_ms = started.elapsed().as_millis() as u64;

        debug!(
            total_hits,
            returned = hits.len(),
            took_ms,
            "Relational search completed"
        );

        Ok(SearchResult::new(
            hits,
            total_hits.max(0) as u64,
            query.page,
            query.page_size,
            took_ms,
        )
        .with_facets(facets))
    }

    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        debug!(doc_id = %document.id, "Catalog-backed search ignores index writes");
        Ok(())
    }

    async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError> {
        debug!(doc_id = %id, "Catalog-backed search ignores index deletes");
        Ok(())
    }

    async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        debug!(
            documents = documents.len(),
            "Catalog-backed search has no corpus to rebuild"
        );
        Ok(ReindexSummary::new(documents.len()))
    }

    /// Reads the persisted trending cache.
    async fn get_trending(&self, limit: usize) -> Result<Vec<TrendingResult>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.trending.top(limit).await?)
    }

    async fn is_healthy(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "PostgreSQL health check failed");
                false
            }
        }
    }
}
