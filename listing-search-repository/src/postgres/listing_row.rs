//! Mapping between catalog rows and listing documents.

use chrono::{DateTime, Utc};
use listing_search_shared::{ListingDocument, ListingStatus};
use uuid::Uuid;

/// Column list shared by every query that reads listings. Expects
/// `resources r` joined with `profiles p` on the seller.
pub const LISTING_COLUMNS: &str = "r.id, r.title, \
     COALESCE(r.description, '') AS description, \
     COALESCE(r.tags, '{}') AS tags, \
     COALESCE(r.sports, '{}') AS sports, \
     COALESCE(r.levels, '{}') AS levels, \
     r.category, r.file_type, \
     COALESCE(r.price_cents, 0)::BIGINT AS price_cents, \
     COALESCE(r.rating, 0)::DOUBLE PRECISION AS rating, \
     COALESCE(r.purchase_count, 0)::BIGINT AS purchase_count, \
     COALESCE(r.view_count, 0)::BIGINT AS view_count, \
     r.is_listed, r.status, r.seller_id, \
     p.display_name AS seller_name, \
     r.created_at AS uploaded_at";

/// `FROM` clause matching [`LISTING_COLUMNS`].
pub const LISTING_FROM: &str = " FROM resources r LEFT JOIN profiles p ON p.id = r.seller_id";

/// Predicate selecting listed, active listings. Must accept exactly the
/// statuses [`ListingStatus::from_db`] maps to `Active`.
pub const SEARCHABLE_PREDICATE: &str =
    "r.is_listed = TRUE AND lower(btrim(r.status)) IN ('active', 'published')";

/// A listing row as read from the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub sports: Vec<String>,
    pub levels: Vec<String>,
    pub category: Option<String>,
    pub file_type: Option<String>,
    pub price_cents: i64,
    pub rating: f64,
    pub purchase_count: i64,
    pub view_count: i64,
    pub is_listed: bool,
    pub status: String,
    pub seller_id: Uuid,
    pub seller_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<ListingRow> for ListingDocument {
    fn from(row: ListingRow) -> Self {
        ListingDocument {
            id: row.id,
            title: row.title,
            description: row.description,
            tags: row.tags,
            sports: row.sports,
            levels: row.levels,
            category: row.category,
            file_type: row.file_type,
            price_cents: ListingDocument::price_from_db(row.price_cents),
            rating: ListingDocument::clamp_rating(row.rating),
            purchase_count: row.purchase_count.max(0) as u64,
            view_count: row.view_count.max(0) as u64,
            is_listed: row.is_listed,
            status: ListingStatus::from_db(&row.status),
            seller_id: row.seller_id,
            seller_name: row.seller_name,
            uploaded_at: row.uploaded_at,
            indexed_at: Utc::now(),
        }
    }
}
