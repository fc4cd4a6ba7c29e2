//! Read-only access to the marketplace catalog.

use async_trait::async_trait;
use listing_search_shared::{ContentWeights, ListingDocument, PurchaseRecord};
use uuid::Uuid;

use crate::errors::CatalogError;

/// A trait that defines the read interface of the catalog store.
///
/// The catalog (listings, purchases, seller profiles) is owned by other
/// parts of the marketplace. The search core only reads from it to build
/// documents, compute trending scores and find related listings.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All listings that are currently listed and active.
    async fn list_searchable_listings(&self) -> Result<Vec<ListingDocument>, CatalogError>;

    /// A single listing by id, regardless of its visibility.
    async fn get_listing(&self, id: Uuid) -> Result<Option<ListingDocument>, CatalogError>;

    /// Listings by id, regardless of their visibility. Missing ids are skipped.
    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingDocument>, CatalogError>;

    /// Distinct buyers with a completed or succeeded purchase of `resource_id`.
    async fn buyers_of(&self, resource_id: Uuid) -> Result<Vec<Uuid>, CatalogError>;

    /// Completed or succeeded purchases made by any of `buyer_ids`.
    async fn purchases_by_buyers(
        &self,
        buyer_ids: &[Uuid],
    ) -> Result<Vec<PurchaseRecord>, CatalogError>;

    /// Listed and active listings other than `source` that share its seller,
    /// a sport tag, a level tag or its category.
    ///
    /// Ranked by [`ContentWeights::score`] against `source`, best first and
    /// ties by id ascending, then truncated to `limit` rows. Ranking happens
    /// before truncation.
    async fn content_candidates(
        &self,
        source: &ListingDocument,
        weights: &ContentWeights,
        limit: usize,
    ) -> Result<Vec<ListingDocument>, CatalogError>;
}
