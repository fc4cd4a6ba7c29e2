//! This module defines the core data structures and types used across the listing
//! search engine: indexable documents, queries, results, and scoring outputs.

pub mod listing_document;
pub mod purchase;
pub mod recommendation;
pub mod search_query;
pub mod search_result;
pub mod similarity;
pub mod trending;

pub use listing_document::{ListingDocument, ListingStatus};
pub use purchase::{PurchaseRecord, PurchaseStatus};
pub use recommendation::{RecommendationReason, RecommendationResult};
pub use search_query::{SearchFilters, SearchQuery, SortDirection, SortField, SortMode};
pub use search_result::{FacetCounts, Highlight, SearchHit, SearchResult};
pub use similarity::{shared_tags, ContentMatch, ContentWeights};
pub use trending::{TrendingResult, TrendingScore};
