//! PostgreSQL implementations: the relational fallback search backend, the
//! catalog store and the trending cache.
//!
//! The schema owned by this crate (the trending cache table) is created by
//! [`MIGRATOR`].

mod catalog_store;
mod listing_row;
mod search_backend;
pub mod sql;
mod trending_cache;

pub use catalog_store::PostgresCatalogStore;
pub use listing_row::ListingRow;
pub use search_backend::PostgresSearchBackend;
pub use trending_cache::PostgresTrendingCache;

/// Migrations for the tables owned by the search core.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("src/postgres/migrations");
