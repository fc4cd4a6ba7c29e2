//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend` using a
//! self-hosted OpenSearch cluster.

mod backend;
mod index_config;
pub mod query;

pub use backend::OpenSearchBackend;
pub use index_config::{get_index_settings, IndexConfig};
