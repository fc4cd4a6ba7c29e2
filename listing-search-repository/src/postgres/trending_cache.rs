//! PostgreSQL implementation of the trending rank cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listing_search_shared::TrendingResult;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::errors::CatalogError;
use crate::interfaces::TrendingCacheStore;
use crate::postgres::listing_row::SEARCHABLE_PREDICATE;

/// Rows per `INSERT`. Each row binds four parameters and Postgres accepts
/// at most 65 535 per statement.
const INSERT_CHUNK_ROWS: usize = 5_000;

#[derive(Debug, sqlx::FromRow)]
struct TrendingRow {
    resource_id: Uuid,
    score: f64,
    rank_position: i32,
    title: String,
    sport: Option<String>,
    price_cents: i64,
    seller_name: Option<String>,
}

impl From<TrendingRow> for TrendingResult {
    fn from(row: TrendingRow) -> Self {
        TrendingResult {
            id: row.resource_id,
            title: row.title,
            sport: row.sport,
            price_cents: row.price_cents.max(0) as u64,
            score: row.score,
            rank: row.rank_position.max(0) as u32,
            seller_name: row.seller_name,
        }
    }
}

/// Trending cache stored in the `trending_cache` table.
///
/// A refresh deletes the previous generation and inserts the new one in a
/// single transaction, so readers see one generation or the other.
pub struct PostgresTrendingCache {
    pool: PgPool,
}

impl PostgresTrendingCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Timestamp of the current generation, if any.
    pub async fn computed_at(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
        let computed_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(computed_at) FROM trending_cache")
                .fetch_one(&self.pool)
                .await?;
        Ok(computed_at)
    }
}

#[async_trait]
impl TrendingCacheStore for PostgresTrendingCache {
    async fn replace_all(&self, entries: &[TrendingResult]) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM trending_cache")
            .execute(&mut *tx)
            .await?;

        let computed_at = Utc::now();
        for chunk in entries.chunks(INSERT_CHUNK_ROWS) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO trending_cache (resource_id, score, rank_position, computed_at)",
            );
            query_builder.push_values(chunk, |mut b, entry| {
                b.push_bind(entry.id)
                    .push_bind(entry.score)
                    .push_bind(i32::try_from(entry.rank).unwrap_or(i32::MAX))
                    .push_bind(computed_at);
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(entries = entries.len(), "Trending cache replaced");
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<TrendingResult>, CatalogError> {
        let query = format!(
            "SELECT t.resource_id, t.score, t.rank_position, r.title, \
                    r.sports[1] AS sport, \
                    COALESCE(r.price_cents, 0)::BIGINT AS price_cents, \
                    p.display_name AS seller_name \
             FROM trending_cache t \
             JOIN resources r ON r.id = t.resource_id \
             LEFT JOIN profiles p ON p.id = r.seller_id \
             WHERE {} \
             ORDER BY t.rank_position ASC \
             LIMIT $1",
            SEARCHABLE_PREDICATE
        );
        let rows: Vec<TrendingRow> = sqlx::query_as(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TrendingResult::from).collect())
    }
}
