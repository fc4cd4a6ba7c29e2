//! Error types for the listing search repository.
//!
//! [`SearchError`] covers search backend operations; [`CatalogError`] covers
//! catalog reads and trending cache writes.

mod catalog_error;
mod search_error;

pub use catalog_error::CatalogError;
pub use search_error::SearchError;
