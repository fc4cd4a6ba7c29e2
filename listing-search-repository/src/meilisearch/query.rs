//! Request bodies and response parsing for the Meilisearch backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use listing_search_shared::{
    FacetCounts, Highlight, ListingDocument, SearchFilters, SearchHit, SearchQuery, SearchResult,
    SortField, SortMode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::SearchError;

const HIGHLIGHT_PRE_TAG: &str = "<mark>";
const HIGHLIGHT_POST_TAG: &str = "</mark>";

/// Attribute holding the upload time as Unix seconds, so it can be sorted
/// and range-filtered.
pub const UPLOADED_AT_TS: &str = "uploaded_at_ts";

/// A listing as stored in the hosted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedListing {
    #[serde(flatten)]
    pub document: ListingDocument,
    pub uploaded_at_ts: i64,
}

impl From<&ListingDocument> for IndexedListing {
    fn from(document: &ListingDocument) -> Self {
        Self {
            document: document.clone(),
            uploaded_at_ts: document.uploaded_at.timestamp(),
        }
    }
}

/// Index settings applied on startup and to every shadow index.
///
/// `sort` is the first ranking rule so explicit sort modes are strictly
/// ordered by their field; relevance searches send no sort and fall through
/// to the text rules, with upload time as the last tie-break.
pub fn index_settings() -> Value {
    json!({
        "searchableAttributes": ["title", "tags", "description"],
        "filterableAttributes": [
            "sports", "levels", "file_type", "tags", "category",
            "price_cents", "rating", UPLOADED_AT_TS, "is_listed", "status", "seller_id"
        ],
        "sortableAttributes": [
            UPLOADED_AT_TS, "price_cents", "rating", "purchase_count", "view_count", "id"
        ],
        "rankingRules": [
            "sort", "words", "typo", "proximity", "attribute", "exactness",
            format!("{}:desc", UPLOADED_AT_TS)
        ],
        "pagination": { "maxTotalHits": 10000 }
    })
}

/// Quote a string for a filter expression.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn in_list(attribute: &str, values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{} IN [{}]", attribute, quoted.join(", "))
}

fn timestamp(value: &DateTime<Utc>) -> i64 {
    value.timestamp()
}

/// Build the filter expression: visibility plus the caller's filters, all
/// joined with AND.
pub fn build_filter(filters: &SearchFilters) -> String {
    let mut clauses = vec!["is_listed = true".to_string(), "status = \"active\"".to_string()];

    if !filters.sports.is_empty() {
        clauses.push(in_list("sports", &filters.sports));
    }
    if !filters.levels.is_empty() {
        clauses.push(in_list("levels", &filters.levels));
    }
    if !filters.file_types.is_empty() {
        clauses.push(in_list("file_type", &filters.file_types));
    }
    if !filters.tags.is_empty() {
        clauses.push(in_list("tags", &filters.tags));
    }
    if let Some(min) = filters.min_price_cents {
        clauses.push(format!("price_cents >= {}", min));
    }
    if let Some(max) = filters.max_price_cents {
        clauses.push(format!("price_cents <= {}", max));
    }
    if let Some(min_rating) = filters.min_rating {
        clauses.push(format!("rating >= {}", min_rating));
    }
    if let Some(ref after) = filters.uploaded_after {
        clauses.push(format!("{} >= {}", UPLOADED_AT_TS, timestamp(after)));
    }
    if let Some(ref before) = filters.uploaded_before {
        clauses.push(format!("{} <= {}", UPLOADED_AT_TS, timestamp(before)));
    }

    clauses.join(" AND ")
}

fn sort_attribute(field: SortField) -> Option<&'static str> {
    match field {
        SortField::Score => None,
        SortField::UploadedAt => Some(UPLOADED_AT_TS),
        SortField::Price => Some("price_cents"),
        SortField::Rating => Some("rating"),
        SortField::PurchaseCount => Some("purchase_count"),
        SortField::ViewCount => Some("view_count"),
        SortField::Id => Some("id"),
    }
}

/// Build the `sort` array. Relevance sends none and relies on the ranking
/// rules.
pub fn sort_clause(mode: SortMode) -> Vec<String> {
    if mode == SortMode::Relevance {
        return Vec::new();
    }

    mode.sort_keys()
        .into_iter()
        .filter_map(|(field, direction)| {
            sort_attribute(field).map(|attr| format!("{}:{}", attr, direction.as_str()))
        })
        .collect()
}

/// Build the body of `POST /indexes/{uid}/search`.
pub fn search_body(query: &SearchQuery) -> Value {
    let text = query.normalized_text();

    let mut body = json!({
        "q": text.unwrap_or(""),
        "filter": build_filter(&query.filters),
        "page": query.page,
        "hitsPerPage": query.page_size,
        "facets": ["sports", "levels", "file_type"],
        "showRankingScore": true
    });

    let sort = sort_clause(query.sort);
    if !sort.is_empty() {
        body["sort"] = json!(sort);
    }

    if text.is_some() {
        body["attributesToHighlight"] = json!(["title", "description"]);
        body["highlightPreTag"] = json!(HIGHLIGHT_PRE_TAG);
        body["highlightPostTag"] = json!(HIGHLIGHT_POST_TAG);
    }

    body
}

fn marked(formatted: &Value, field: &str) -> Option<String> {
    formatted[field]
        .as_str()
        .filter(|s| s.contains(HIGHLIGHT_PRE_TAG))
        .map(str::to_string)
}

fn facet_map(distribution: &Value, name: &str) -> BTreeMap<String, u64> {
    distribution[name]
        .as_object()
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|(key, count)| Some((key.clone(), count.as_u64()?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Turn a search response into a `SearchResult` for `query`'s page.
pub fn parse_search_response(
    body: &Value,
    query: &SearchQuery,
) -> Result<SearchResult, SearchError> {
    let raw_hits = body["hits"]
        .as_array()
        .ok_or_else(|| SearchError::parse("Response has no hits array"))?;

    let mut hits = Vec::with_capacity(raw_hits.len());
    for raw in raw_hits {
        let document: ListingDocument = serde_json::from_value(raw.clone())
            .map_err(|e| SearchError::parse(format!("Invalid document: {}", e)))?;

        let mut hit = SearchHit::from(document);
        hit.relevance_score = raw["_rankingScore"].as_f64();

        let formatted = &raw["_formatted"];
        let highlight = Highlight {
            title: marked(formatted, "title"),
            description: marked(formatted, "description"),
        };
        if !highlight.is_empty() {
            hit.highlight = Some(highlight);
        }
        hits.push(hit);
    }

    let total_hits = body["totalHits"]
        .as_u64()
        .or_else(|| body["estimatedTotalHits"].as_u64())
        .unwrap_or(hits.len() as u64);
    let took_ms = body["processingTimeMs"].as_u64().unwrap_or(0);

    let distribution = &body["facetDistribution"];
    let mut result = SearchResult::new(hits, total_hits, query.page, query.page_size, took_ms);
    if distribution.is_object() {
        result = result.with_facets(FacetCounts {
            sports: facet_map(distribution, "sports"),
            levels: facet_map(distribution, "levels"),
            file_types: facet_map(distribution, "file_type"),
        });
    }

    Ok(result)
}
