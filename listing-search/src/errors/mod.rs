//! Error types for the discovery service.

use listing_search_repository::{CatalogError, SearchError};
use thiserror::Error;

/// Errors from operations that touch both the catalog and a search backend.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Error from the search gateway.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Error reading the catalog or writing the trending cache.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl DiscoveryError {
    /// The operation may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Search(e) => e.is_retryable(),
            Self::Catalog(CatalogError::Unavailable(_)) => true,
            Self::Catalog(CatalogError::DatabaseError(e)) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::Catalog(CatalogError::InvalidRow(_)) => false,
        }
    }
}
