//! Process-local implementations, used for local runs and tests.

mod backend;
mod trending_cache;

pub use backend::InMemorySearchBackend;
pub use trending_cache::InMemoryTrendingCache;
