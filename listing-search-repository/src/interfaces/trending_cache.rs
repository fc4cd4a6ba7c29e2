//! Persistence of the ranked trending list.

use async_trait::async_trait;
use listing_search_shared::TrendingResult;

use crate::errors::CatalogError;

/// Storage for the trending rank cache.
///
/// The cache is written only by the trending engine and is replaced as a
/// whole: `replace_all` must be a single atomic generation swap so that a
/// concurrent `top` observes either the previous generation or the new one,
/// never a mix of both.
#[async_trait]
pub trait TrendingCacheStore: Send + Sync {
    /// Replace the whole cache with `entries`, which are already ranked.
    async fn replace_all(&self, entries: &[TrendingResult]) -> Result<(), CatalogError>;

    /// The `limit` best-ranked entries, rank ascending.
    async fn top(&self, limit: usize) -> Result<Vec<TrendingResult>, CatalogError>;
}
