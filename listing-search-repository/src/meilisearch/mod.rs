//! Meilisearch implementation of the search backend (hosted full-text index).

mod backend;
pub mod query;

pub use backend::MeilisearchBackend;
