//! Error types for catalog and trending cache access.

use thiserror::Error;

/// Represents errors that can occur while reading the catalog store or
/// writing the trending cache.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
