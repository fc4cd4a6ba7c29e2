//! # Listing Search Shared
//!
//! This crate defines shared data structures used across the listing search
//! ecosystem: the indexable listing document, search queries and results,
//! trending scores and recommendation results.

pub mod types;

pub use types::listing_document::{ListingDocument, ListingStatus};
pub use types::purchase::{PurchaseRecord, PurchaseStatus};
pub use types::recommendation::{RecommendationReason, RecommendationResult};
pub use types::search_query::{SearchFilters, SearchQuery, SortDirection, SortField, SortMode};
pub use types::search_result::{FacetCounts, Highlight, SearchHit, SearchResult};
pub use types::similarity::{shared_tags, ContentMatch, ContentWeights};
pub use types::trending::{TrendingResult, TrendingScore};
