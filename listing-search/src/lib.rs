//! # Listing Search
//!
//! Discovery service for the marketplace catalog: full-text search with
//! backend fallback, a time-decayed trending list and co-purchase
//! recommendations.
//!
//! ## Architecture
//!
//! 1. **Gateways**: a primary search gateway and an optional fallback gateway
//! 2. **Trending engine**: ranks listings by decayed engagement into a cache
//! 3. **Recommendation engine**: co-purchase analysis with content fill
//! 4. **Discovery service**: the facade callers talk to
//! 5. **Worker**: refreshes the trending cache on a fixed interval
//!
//! ## Modules
//!
//! - [`config`]: Environment configuration and dependency wiring
//! - [`service`]: The discovery service facade
//! - [`trending`]: Trending score computation and cache refresh
//! - [`recommendation`]: Related listing computation
//! - [`clicks`]: Search click signal sinks
//! - [`worker`]: Periodic refresh loop
//! - [`errors`]: Error types for the service

pub mod clicks;
pub mod config;
pub mod errors;
pub mod recommendation;
pub mod service;
pub mod trending;
pub mod worker;

pub use clicks::{ChannelClickTracker, ClickEvent, ClickTracker, TracingClickTracker};
pub use config::{Dependencies, ServiceSettings};
pub use errors::DiscoveryError;
pub use recommendation::{RecommendationConfig, RecommendationEngine, RecommendationWeights};
pub use service::DiscoveryService;
pub use trending::{TrendingEngine, TrendingWeights};
pub use worker::{Worker, WorkerConfig, WorkerReport};

use listing_search_repository::{CatalogError, SearchError};
use thiserror::Error;

/// Errors that can occur during service initialization or execution.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search backend error.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Catalog or trending cache error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<DiscoveryError> for AppError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Search(e) => Self::Search(e),
            DiscoveryError::Catalog(e) => Self::Catalog(e),
        }
    }
}
