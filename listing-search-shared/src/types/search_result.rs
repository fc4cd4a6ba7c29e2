//! Search result types for the listing search engine.
//!
//! This module defines the response structures returned from search operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::listing_document::ListingDocument;

/// Highlighted snippets for a hit. Matches are wrapped in `<mark>` tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Highlight {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub sports: Vec<String>,
    pub levels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub price_cents: u64,
    pub rating: f64,
    pub purchase_count: u64,
    pub view_count: u64,
    pub uploaded_at: DateTime<Utc>,
    pub seller_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,

    /// Relevance score from the backend, when it produces one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl From<ListingDocument> for SearchHit {
    fn from(doc: ListingDocument) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            sports: doc.sports,
            levels: doc.levels,
            file_type: doc.file_type,
            price_cents: doc.price_cents,
            rating: doc.rating,
            purchase_count: doc.purchase_count,
            view_count: doc.view_count,
            uploaded_at: doc.uploaded_at,
            seller_id: doc.seller_id,
            seller_name: doc.seller_name,
            highlight: None,
            relevance_score: None,
        }
    }
}

/// Facet counts per bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FacetCounts {
    pub sports: BTreeMap<String, u64>,
    pub levels: BTreeMap<String, u64>,
    pub file_types: BTreeMap<String, u64>,
}

impl FacetCounts {
    /// Count facet buckets over a set of hits.
    pub fn from_hits<'a>(hits: impl IntoIterator<Item = &'a SearchHit>) -> Self {
        let mut facets = FacetCounts::default();
        for hit in hits {
            for sport in &hit.sports {
                *facets.sports.entry(sport.clone()).or_insert(0) += 1;
            }
            for level in &hit.levels {
                *facets.levels.entry(level.clone()).or_insert(0) += 1;
            }
            if let Some(ref file_type) = hit.file_type {
                *facets.file_types.entry(file_type.clone()).or_insert(0) += 1;
            }
        }
        facets
    }

    pub fn is_empty(&self) -> bool {
        self.sports.is_empty() && self.levels.is_empty() && self.file_types.is_empty()
    }
}

/// Complete search response with hits and paging metadata.
///
/// Build it with [`SearchResult::new`] so that `total_pages` and the page
/// size bound stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Hits of the requested page, in sort order.
    pub hits: Vec<SearchHit>,

    /// Total number of matching documents across all pages.
    pub total_hits: u64,

    /// 1-based page number of `hits`.
    pub page: u32,

    pub page_size: u32,

    /// `ceil(total_hits / page_size)`.
    pub total_pages: u64,

    /// Time taken to execute the search in milliseconds.
    pub took_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetCounts>,
}

/// `ceil(total_hits / page_size)`, zero for a zero page size.
pub fn total_pages(total_hits: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_hits.div_ceil(u64::from(page_size))
}

impl SearchResult {
    /// Create a new search result. Hits beyond `page_size` are dropped.
    pub fn new(
        mut hits: Vec<SearchHit>,
        total_hits: u64,
        page: u32,
        page_size: u32,
        took_ms: u64,
    ) -> Self {
        hits.truncate(page_size as usize);
        Self {
            hits,
            total_hits,
            page,
            page_size,
            total_pages: total_pages(total_hits, page_size),
            took_ms,
            facets: None,
        }
    }

    /// Create an empty result for the given page.
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size, 0)
    }

    pub fn with_facets(mut self, facets: FacetCounts) -> Self {
        self.facets = Some(facets);
        self
    }

    /// Returns true if there are no hits on this page.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits on this page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(sport: &str, file_type: Option<&str>) -> SearchHit {
        let mut doc = ListingDocument::new(Uuid::new_v4(), Uuid::new_v4(), "Drill", 100)
            .with_sports(vec![sport.to_string()])
            .with_levels(vec!["youth".to_string()]);
        doc.file_type = file_type.map(str::to_string);
        SearchHit::from(doc)
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(99, 10), 10);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_search_result_empty() {
        let result = SearchResult::empty(1, 20);
        assert!(result.is_empty());
        assert_eq!(result.total_hits, 0);
        assert_eq!(result.total_pages, 0);
    }

    #[test]
    fn test_search_result_truncates_to_page_size() {
        let hits = (0..5).map(|_| hit("soccer", None)).collect();
        let result = SearchResult::new(hits, 12, 1, 3, 4);

        assert_eq!(result.len(), 3);
        assert_eq!(result.total_pages, 4);
        assert_eq!(result.took_ms, 4);
    }

    #[test]
    fn test_facets_from_hits() {
        let hits = vec![
            hit("soccer", Some("pdf")),
            hit("soccer", Some("video")),
            hit("tennis", Some("pdf")),
        ];
        let facets = FacetCounts::from_hits(&hits);

        assert_eq!(facets.sports.get("soccer"), Some(&2));
        assert_eq!(facets.sports.get("tennis"), Some(&1));
        assert_eq!(facets.levels.get("youth"), Some(&3));
        assert_eq!(facets.file_types.get("pdf"), Some(&2));
    }

    #[test]
    fn test_serialization() {
        let result = SearchResult::new(vec![hit("soccer", None)], 1, 1, 20, 10)
            .with_facets(FacetCounts::default());

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: SearchResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result.total_hits, deserialized.total_hits);
        assert_eq!(result.hits.len(), deserialized.hits.len());
    }
}
