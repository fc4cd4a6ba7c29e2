//! Interface definitions for the listing search repository.
//!
//! This module defines the abstract traits that allow for dependency
//! injection and swappable implementations:
//!
//! - [`SearchBackend`]: pluggable full-text search backends
//! - [`CatalogStore`]: read access to listings and purchases
//! - [`TrendingCacheStore`]: the persisted trending rank cache

mod catalog_store;
mod search_backend;
mod trending_cache;

pub use catalog_store::CatalogStore;
pub use search_backend::SearchBackend;
pub use trending_cache::TrendingCacheStore;
