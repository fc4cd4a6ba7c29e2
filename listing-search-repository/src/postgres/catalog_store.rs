//! PostgreSQL implementation of the catalog store.
//!
//! ## Database Tables
//!
//! - `resources`: listings, with taxonomy arrays and counters
//! - `purchases`: purchase records with a payment status
//! - `profiles`: seller display names

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listing_search_shared::{ContentWeights, ListingDocument, PurchaseRecord, PurchaseStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::CatalogError;
use crate::interfaces::CatalogStore;
use crate::postgres::listing_row::{
    ListingRow, LISTING_COLUMNS, LISTING_FROM, SEARCHABLE_PREDICATE,
};
use crate::postgres::sql;

/// Statuses counted as a completed sale.
const QUALIFYING_STATUSES: &str = "('completed', 'succeeded')";

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    buyer_id: Uuid,
    resource_id: Uuid,
    status: String,
    purchased_at: DateTime<Utc>,
}

impl From<PurchaseRow> for PurchaseRecord {
    fn from(row: PurchaseRow) -> Self {
        PurchaseRecord {
            buyer_id: row.buyer_id,
            resource_id: row.resource_id,
            status: PurchaseStatus::from_db(&row.status),
            purchased_at: row.purchased_at,
        }
    }
}

/// Read-only catalog access over a shared connection pool.
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn list_searchable_listings(&self) -> Result<Vec<ListingDocument>, CatalogError> {
        let query = format!(
            "SELECT {}{} WHERE {} ORDER BY r.id",
            LISTING_COLUMNS, LISTING_FROM, SEARCHABLE_PREDICATE
        );
        let rows: Vec<ListingRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ListingDocument::from).collect())
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<ListingDocument>, CatalogError> {
        let query = format!("SELECT {}{} WHERE r.id = $1", LISTING_COLUMNS, LISTING_FROM);
        let row: Option<ListingRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ListingDocument::from))
    }

    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingDocument>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = sql::build_listings_by_id_query(ids);
        let rows: Vec<ListingRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ListingDocument::from).collect())
    }

    async fn buyers_of(&self, resource_id: Uuid) -> Result<Vec<Uuid>, CatalogError> {
        let query = format!(
            "SELECT DISTINCT buyer_id FROM purchases \
             WHERE resource_id = $1 AND lower(status) IN {}",
            QUALIFYING_STATUSES
        );
        let buyers: Vec<Uuid> = sqlx::query_scalar(&query)
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(buyers)
    }

    async fn purchases_by_buyers(
        &self,
        buyer_ids: &[Uuid],
    ) -> Result<Vec<PurchaseRecord>, CatalogError> {
        if buyer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT buyer_id, resource_id, status, created_at AS purchased_at FROM purchases \
             WHERE buyer_id = ANY($1) AND lower(status) IN {}",
            QUALIFYING_STATUSES
        );
        let rows: Vec<PurchaseRow> = sqlx::query_as(&query)
            .bind(buyer_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PurchaseRecord::from).collect())
    }

    async fn content_candidates(
        &self,
        source: &ListingDocument,
        weights: &ContentWeights,
        limit: usize,
    ) -> Result<Vec<ListingDocument>, CatalogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut query_builder = sql::build_content_candidates_query(source, weights, limit);
        let rows: Vec<ListingRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ListingDocument::from).collect())
    }
}
