//! Search query types for the listing search engine.
//!
//! This module defines the query structures every search backend accepts,
//! together with the shared semantics of filters and sort modes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::listing_document::{ListingDocument, MAX_RATING};

/// Default number of hits per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the builder accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A document field a sort mode orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    /// Backend relevance score.
    Score,
    UploadedAt,
    Price,
    Rating,
    PurchaseCount,
    ViewCount,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Ordering applied to search hits.
///
/// Every mode other than `Relevance` is fully determined by document fields,
/// and every backend breaks ties by upload time, most recent first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Backend relevance score, ties by upload time descending.
    #[default]
    Relevance,
    /// Upload time descending.
    Newest,
    /// Purchase count then view count, both descending.
    Trending,
    /// Price ascending.
    PriceAsc,
    /// Price descending.
    PriceDesc,
    /// Rating descending.
    Rating,
    /// Purchase count descending.
    MostPurchased,
}

impl SortMode {
    /// All sort modes, in declaration order.
    pub const ALL: [SortMode; 7] = [
        SortMode::Relevance,
        SortMode::Newest,
        SortMode::Trending,
        SortMode::PriceAsc,
        SortMode::PriceDesc,
        SortMode::Rating,
        SortMode::MostPurchased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Relevance => "relevance",
            SortMode::Newest => "newest",
            SortMode::Trending => "trending",
            SortMode::PriceAsc => "price_asc",
            SortMode::PriceDesc => "price_desc",
            SortMode::Rating => "rating",
            SortMode::MostPurchased => "most_purchased",
        }
    }

    /// Parse a sort mode from a query-string value. Unknown values fall back
    /// to relevance.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "newest" => SortMode::Newest,
            "trending" => SortMode::Trending,
            "price_asc" => SortMode::PriceAsc,
            "price_desc" => SortMode::PriceDesc,
            "rating" => SortMode::Rating,
            "most_purchased" | "popular" => SortMode::MostPurchased,
            _ => SortMode::Relevance,
        }
    }

    /// Ordered sort keys for this mode, shared by every backend.
    ///
    /// The named field comes first, then upload time descending, then id
    /// ascending as the final deterministic key.
    pub fn sort_keys(&self) -> Vec<(SortField, SortDirection)> {
        use SortDirection::{Asc, Desc};

        let mut keys = match self {
            SortMode::Relevance => vec![(SortField::Score, Desc)],
            SortMode::Newest => vec![],
            SortMode::Trending => vec![
                (SortField::PurchaseCount, Desc),
                (SortField::ViewCount, Desc),
            ],
            SortMode::PriceAsc => vec![(SortField::Price, Asc)],
            SortMode::PriceDesc => vec![(SortField::Price, Desc)],
            SortMode::Rating => vec![(SortField::Rating, Desc)],
            SortMode::MostPurchased => vec![(SortField::PurchaseCount, Desc)],
        };
        keys.push((SortField::UploadedAt, Desc));
        keys.push((SortField::Id, Asc));
        keys
    }

    /// Compare two documents under this mode's field ordering.
    ///
    /// The named field decides first, then upload time (most recent first),
    /// then id ascending so the order is total. For `Relevance` only the
    /// tie-break keys apply; callers compare relevance scores before this.
    pub fn compare(&self, a: &ListingDocument, b: &ListingDocument) -> Ordering {
        let primary = match self {
            SortMode::Relevance | SortMode::Newest => Ordering::Equal,
            SortMode::Trending => b
                .purchase_count
                .cmp(&a.purchase_count)
                .then_with(|| b.view_count.cmp(&a.view_count)),
            SortMode::PriceAsc => a.price_cents.cmp(&b.price_cents),
            SortMode::PriceDesc => b.price_cents.cmp(&a.price_cents),
            SortMode::Rating => b.rating.total_cmp(&a.rating),
            SortMode::MostPurchased => b.purchase_count.cmp(&a.purchase_count),
        };

        primary
            .then_with(|| b.uploaded_at.cmp(&a.uploaded_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Structured filters. All kinds are combined with AND; values inside one
/// list are combined with OR. String comparisons ignore case.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price_cents: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price_cents: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn any_overlap(wanted: &[String], have: &[String]) -> bool {
    wanted
        .iter()
        .any(|w| have.iter().any(|h| h.eq_ignore_ascii_case(w)))
}

impl SearchFilters {
    /// Returns true when no filter is set.
    pub fn is_empty(&self) -> bool {
        *self == SearchFilters::default()
    }

    /// Evaluate the caller-supplied filters against a document.
    ///
    /// This does not include the listed/active visibility rule, which
    /// backends apply unconditionally on top of these filters.
    pub fn matches(&self, doc: &ListingDocument) -> bool {
        if !self.sports.is_empty() && !any_overlap(&self.sports, &doc.sports) {
            return false;
        }
        if !self.levels.is_empty() && !any_overlap(&self.levels, &doc.levels) {
            return false;
        }
        if !self.file_types.is_empty() {
            let matched = doc
                .file_type
                .as_deref()
                .is_some_and(|ft| self.file_types.iter().any(|w| w.eq_ignore_ascii_case(ft)));
            if !matched {
                return false;
            }
        }
        if !self.tags.is_empty() && !any_overlap(&self.tags, &doc.tags) {
            return false;
        }
        if self.min_price_cents.is_some_and(|min| doc.price_cents < min) {
            return false;
        }
        if self.max_price_cents.is_some_and(|max| doc.price_cents > max) {
            return false;
        }
        if self.min_rating.is_some_and(|min| doc.rating < min) {
            return false;
        }
        if self.uploaded_after.is_some_and(|after| doc.uploaded_at < after) {
            return false;
        }
        if self.uploaded_before.is_some_and(|before| doc.uploaded_at > before) {
            return false;
        }
        true
    }
}

/// Search query parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    /// Optional free-text query. Blank text means "match everything".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,

    /// Number of hits per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub filters: SearchFilters,

    #[serde(default)]
    pub sort: SortMode,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            page: default_page(),
            page_size: default_page_size(),
            filters: SearchFilters::default(),
            sort: SortMode::default(),
        }
    }
}

impl SearchQuery {
    /// Create a free-text query with default paging and relevance sort.
    ///
    /// # Example
    ///
    /// ```
    /// use listing_search_shared::{SearchQuery, SortMode};
    ///
    /// let query = SearchQuery::text("press break").with_sort(SortMode::Newest);
    /// assert_eq!(query.page, 1);
    /// ```
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create a browse query without free text.
    pub fn browse() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size, capped at [`MAX_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.min(MAX_PAGE_SIZE);
        self
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// The trimmed query text, or `None` if absent or blank.
    pub fn normalized_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Zero-based offset of the first hit of the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Validate the query parameters.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be at least 1".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }
        if let (Some(min), Some(max)) = (self.filters.min_price_cents, self.filters.max_price_cents)
        {
            if min > max {
                return Err(format!(
                    "min_price_cents ({}) cannot exceed max_price_cents ({})",
                    min, max
                ));
            }
        }
        if let Some(rating) = self.filters.min_rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(format!("min_rating must be within 0..=5, got {}", rating));
            }
        }
        if let (Some(after), Some(before)) =
            (self.filters.uploaded_after, self.filters.uploaded_before)
        {
            if after > before {
                return Err("uploaded_after cannot be later than uploaded_before".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn doc(price: u64, rating: f64, purchases: u64, age_days: i64) -> ListingDocument {
        ListingDocument::new(Uuid::new_v4(), Uuid::new_v4(), "Drill", price)
            .with_rating(rating)
            .with_counters(purchases, 0)
            .with_uploaded_at(Utc::now() - Duration::days(age_days))
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::text("zone");
        assert_eq!(query.text.as_deref(), Some("zone"));
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 20);
        assert_eq!(query.sort, SortMode::Relevance);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_with_page_size_caps_at_100() {
        let query = SearchQuery::browse().with_page_size(500);
        assert_eq!(query.page_size, 100);
    }

    #[test]
    fn test_offset() {
        assert_eq!(SearchQuery::browse().offset(), 0);
        assert_eq!(SearchQuery::browse().with_page(3).with_page_size(10).offset(), 20);
    }

    #[test]
    fn test_normalized_text() {
        assert_eq!(SearchQuery::text("  press  ").normalized_text(), Some("press"));
        assert_eq!(SearchQuery::text("   ").normalized_text(), None);
        assert_eq!(SearchQuery::browse().normalized_text(), None);
    }

    #[test]
    fn test_search_query_validation() {
        assert!(SearchQuery::browse().validate().is_ok());
        assert!(SearchQuery::browse().with_page(0).validate().is_err());

        let mut query = SearchQuery::browse();
        query.page_size = 0;
        assert!(query.validate().is_err());

        let query = SearchQuery::browse().with_filters(SearchFilters {
            min_price_cents: Some(500),
            max_price_cents: Some(100),
            ..Default::default()
        });
        assert!(query.validate().is_err());

        let query = SearchQuery::browse().with_filters(SearchFilters {
            min_rating: Some(6.0),
            ..Default::default()
        });
        assert!(query.validate().is_err());

        let now = Utc::now();
        let query = SearchQuery::browse().with_filters(SearchFilters {
            uploaded_after: Some(now),
            uploaded_before: Some(now - Duration::days(1)),
            ..Default::default()
        });
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_sort_mode_parse() {
        assert_eq!(SortMode::parse("price-asc"), SortMode::PriceAsc);
        assert_eq!(SortMode::parse("PRICE_DESC"), SortMode::PriceDesc);
        assert_eq!(SortMode::parse("most_purchased"), SortMode::MostPurchased);
        assert_eq!(SortMode::parse("whatever"), SortMode::Relevance);
        for mode in SortMode::ALL {
            assert_eq!(SortMode::parse(mode.as_str()), mode);
        }
    }

    #[test]
    fn test_compare_breaks_ties_by_upload_time() {
        let older = doc(1000, 4.0, 5, 10);
        let newer = doc(1000, 4.0, 5, 1);

        for mode in SortMode::ALL {
            assert_eq!(
                mode.compare(&newer, &older),
                Ordering::Less,
                "mode {:?} should place the newer listing first",
                mode
            );
        }
    }

    #[test]
    fn test_sort_keys_end_with_upload_time_then_id() {
        for mode in SortMode::ALL {
            let keys = mode.sort_keys();
            let n = keys.len();
            assert_eq!(keys[n - 2], (SortField::UploadedAt, SortDirection::Desc));
            assert_eq!(keys[n - 1], (SortField::Id, SortDirection::Asc));
        }
        assert_eq!(
            SortMode::PriceAsc.sort_keys()[0],
            (SortField::Price, SortDirection::Asc)
        );
        assert_eq!(SortMode::Newest.sort_keys().len(), 2);
    }

    #[test]
    fn test_compare_named_fields() {
        let cheap = doc(100, 1.0, 1, 1);
        let pricey = doc(900, 5.0, 9, 30);

        assert_eq!(SortMode::PriceAsc.compare(&cheap, &pricey), Ordering::Less);
        assert_eq!(SortMode::PriceDesc.compare(&pricey, &cheap), Ordering::Less);
        assert_eq!(SortMode::Rating.compare(&pricey, &cheap), Ordering::Less);
        assert_eq!(SortMode::MostPurchased.compare(&pricey, &cheap), Ordering::Less);
        assert_eq!(SortMode::Newest.compare(&cheap, &pricey), Ordering::Less);
    }

    #[test]
    fn test_filters_match() {
        let d = doc(1500, 4.5, 0, 3)
            .with_sports(vec!["Basketball".to_string()])
            .with_levels(vec!["varsity".to_string()])
            .with_file_type("pdf")
            .with_tags(vec!["defense".to_string()]);

        assert!(SearchFilters::default().matches(&d));

        let filters = SearchFilters {
            sports: vec!["basketball".to_string(), "soccer".to_string()],
            levels: vec!["VARSITY".to_string()],
            file_types: vec!["PDF".to_string()],
            tags: vec!["defense".to_string()],
            min_price_cents: Some(1000),
            max_price_cents: Some(1500),
            min_rating: Some(4.5),
            ..Default::default()
        };
        assert!(filters.matches(&d));

        let wrong_sport = SearchFilters {
            sports: vec!["hockey".to_string()],
            ..Default::default()
        };
        assert!(!wrong_sport.matches(&d));

        let too_expensive = SearchFilters {
            max_price_cents: Some(1499),
            ..Default::default()
        };
        assert!(!too_expensive.matches(&d));

        let too_recent = SearchFilters {
            uploaded_before: Some(Utc::now() - Duration::days(5)),
            ..Default::default()
        };
        assert!(!too_recent.matches(&d));
    }
}
