//! Request bodies and response parsing for the OpenSearch backend.
//!
//! Everything here is a pure function over `serde_json::Value` so the wire
//! format can be tested without a cluster.

use std::collections::BTreeMap;

use listing_search_shared::{
    FacetCounts, Highlight, ListingDocument, RecommendationReason, RecommendationResult,
    SearchFilters, SearchHit, SearchQuery, SearchResult, SortField, SortMode,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::errors::SearchError;

/// Fields searched by the text query, with boosts.
pub const SEARCH_FIELDS: [&str; 3] = ["title^3", "tags^2", "description"];

/// Buckets returned per facet.
const FACET_SIZE: u32 = 50;

const HIGHLIGHT_PRE_TAG: &str = "<mark>";
const HIGHLIGHT_POST_TAG: &str = "</mark>";

fn sort_field_name(field: SortField) -> &'static str {
    match field {
        SortField::Score => "_score",
        SortField::UploadedAt => "uploaded_at",
        SortField::Price => "price_cents",
        SortField::Rating => "rating",
        SortField::PurchaseCount => "purchase_count",
        SortField::ViewCount => "view_count",
        SortField::Id => "id",
    }
}

/// Build the `sort` array for a sort mode.
pub fn build_sort(mode: SortMode) -> Value {
    let clauses = mode
        .sort_keys()
        .into_iter()
        .map(|(field, direction)| {
            let mut clause = Map::new();
            clause.insert(
                sort_field_name(field).to_string(),
                json!({ "order": direction.as_str() }),
            );
            Value::Object(clause)
        })
        .collect();
    Value::Array(clauses)
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Filter clauses for the visibility rule plus the caller's filters.
pub fn build_filter_clauses(filters: &SearchFilters) -> Vec<Value> {
    let mut clauses = visibility_clauses();

    if !filters.sports.is_empty() {
        clauses.push(json!({ "terms": { "sports": lowercase_all(&filters.sports) } }));
    }
    if !filters.levels.is_empty() {
        clauses.push(json!({ "terms": { "levels": lowercase_all(&filters.levels) } }));
    }
    if !filters.file_types.is_empty() {
        clauses.push(json!({ "terms": { "file_type": lowercase_all(&filters.file_types) } }));
    }
    if !filters.tags.is_empty() {
        clauses.push(json!({ "terms": { "tags.keyword": lowercase_all(&filters.tags) } }));
    }

    let mut price = Map::new();
    if let Some(min) = filters.min_price_cents {
        price.insert("gte".to_string(), json!(min));
    }
    if let Some(max) = filters.max_price_cents {
        price.insert("lte".to_string(), json!(max));
    }
    if !price.is_empty() {
        clauses.push(json!({ "range": { "price_cents": price } }));
    }

    if let Some(min_rating) = filters.min_rating {
        clauses.push(json!({ "range": { "rating": { "gte": min_rating } } }));
    }

    let mut uploaded = Map::new();
    if let Some(after) = filters.uploaded_after {
        uploaded.insert("gte".to_string(), json!(after.to_rfc3339()));
    }
    if let Some(before) = filters.uploaded_before {
        uploaded.insert("lte".to_string(), json!(before.to_rfc3339()));
    }
    if !uploaded.is_empty() {
        clauses.push(json!({ "range": { "uploaded_at": uploaded } }));
    }

    clauses
}

fn visibility_clauses() -> Vec<Value> {
    vec![
        json!({ "term": { "is_listed": true } }),
        json!({ "term": { "status": "active" } }),
    ]
}

/// Build the full search request body.
pub fn build_search_body(query: &SearchQuery) -> Value {
    let text = query.normalized_text();

    let must = match text {
        Some(ref text) => json!([{
            "multi_match": {
                "query": text,
                "fields": SEARCH_FIELDS,
                "fuzziness": "AUTO",
                "operator": "and"
            }
        }]),
        None => json!([{ "match_all": {} }]),
    };

    let mut body = json!({
        "query": {
            "bool": {
                "must": must,
                "filter": build_filter_clauses(&query.filters)
            }
        },
        "from": query.offset(),
        "size": query.page_size,
        "sort": build_sort(query.sort),
        "track_total_hits": true,
        "track_scores": true,
        "aggs": {
            "sports": { "terms": { "field": "sports", "size": FACET_SIZE } },
            "levels": { "terms": { "field": "levels", "size": FACET_SIZE } },
            "file_types": { "terms": { "field": "file_type", "size": FACET_SIZE } }
        }
    });

    if text.is_some() {
        body["highlight"] = json!({
            "pre_tags": [HIGHLIGHT_PRE_TAG],
            "post_tags": [HIGHLIGHT_POST_TAG],
            "fields": {
                "title": { "number_of_fragments": 0 },
                "description": { "fragment_size": 160, "number_of_fragments": 1 }
            }
        });
    }

    body
}

/// Build a `more_like_this` query for related listings.
pub fn build_more_like_this_body(alias: &str, id: Uuid, limit: usize) -> Value {
    json!({
        "query": {
            "bool": {
                "must": [{
                    "more_like_this": {
                        "fields": ["title", "description", "tags", "sports", "levels"],
                        "like": [{ "_index": alias, "_id": id.to_string() }],
                        "min_term_freq": 1,
                        "min_doc_freq": 1,
                        "max_query_terms": 25
                    }
                }],
                "filter": visibility_clauses(),
                "must_not": [{ "ids": { "values": [id.to_string()] } }]
            }
        },
        "size": limit
    })
}

fn parse_source(hit: &Value) -> Result<ListingDocument, SearchError> {
    serde_json::from_value(hit["_source"].clone())
        .map_err(|e| SearchError::parse(format!("Invalid document source: {}", e)))
}

fn first_fragment(hit: &Value, field: &str) -> Option<String> {
    hit["highlight"][field][0].as_str().map(str::to_string)
}

fn parse_buckets(aggregations: &Value, name: &str) -> BTreeMap<String, u64> {
    aggregations[name]["buckets"]
        .as_array()
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    Some((
                        bucket["key"].as_str()?.to_string(),
                        bucket["doc_count"].as_u64()?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Turn a `_search` response into a `SearchResult` for `query`'s page.
pub fn parse_search_response(
    body: &Value,
    query: &SearchQuery,
) -> Result<SearchResult, SearchError> {
    let raw_hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| SearchError::parse("Response has no hits array"))?;

    let total_hits = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64())
        .unwrap_or(raw_hits.len() as u64);

    let mut hits = Vec::with_capacity(raw_hits.len());
    for raw in raw_hits {
        let mut hit = SearchHit::from(parse_source(raw)?);
        hit.relevance_score = raw["_score"].as_f64();

        let highlight = Highlight {
            title: first_fragment(raw, "title"),
            description: first_fragment(raw, "description"),
        };
        if !highlight.is_empty() {
            hit.highlight = Some(highlight);
        }
        hits.push(hit);
    }

    let took_ms = body["took"].as_u64().unwrap_or(0);
    let mut result = SearchResult::new(hits, total_hits, query.page, query.page_size, took_ms);

    let aggregations = &body["aggregations"];
    if aggregations.is_object() {
        result = result.with_facets(FacetCounts {
            sports: parse_buckets(aggregations, "sports"),
            levels: parse_buckets(aggregations, "levels"),
            file_types: parse_buckets(aggregations, "file_types"),
        });
    }

    Ok(result)
}

/// Turn a `more_like_this` response into recommendations.
pub fn parse_recommendations(body: &Value) -> Result<Vec<RecommendationResult>, SearchError> {
    let raw_hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| SearchError::parse("Response has no hits array"))?;

    raw_hits
        .iter()
        .map(|raw| {
            let doc = parse_source(raw)?;
            let score = raw["_score"].as_f64().unwrap_or(0.0);
            Ok(RecommendationResult::from_document(
                &doc,
                score,
                RecommendationReason::SimilarContent,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_source(id: Uuid) -> Value {
        let doc = ListingDocument::new(id, Uuid::nil(), "Zone defense drills", 1299)
            .with_sports(vec!["Basketball".to_string()]);
        serde_json::to_value(doc).unwrap()
    }

    #[test]
    fn test_sort_clauses_follow_shared_keys() {
        let sort = build_sort(SortMode::PriceAsc);
        assert_eq!(
            sort,
            json!([
                { "price_cents": { "order": "asc" } },
                { "uploaded_at": { "order": "desc" } },
                { "id": { "order": "asc" } }
            ])
        );

        let sort = build_sort(SortMode::Trending);
        assert_eq!(sort[0], json!({ "purchase_count": { "order": "desc" } }));
        assert_eq!(sort[1], json!({ "view_count": { "order": "desc" } }));

        let sort = build_sort(SortMode::Relevance);
        assert_eq!(sort[0], json!({ "_score": { "order": "desc" } }));
    }

    #[test]
    fn test_visibility_filter_always_present() {
        let clauses = build_filter_clauses(&SearchFilters::default());
        assert_eq!(clauses.len(), 2);
        assert!(clauses.contains(&json!({ "term": { "is_listed": true } })));
        assert!(clauses.contains(&json!({ "term": { "status": "active" } })));
    }

    #[test]
    fn test_filter_clauses() {
        let filters = SearchFilters {
            sports: vec!["Soccer".to_string()],
            min_price_cents: Some(100),
            max_price_cents: Some(500),
            min_rating: Some(4.0),
            uploaded_after: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let clauses = build_filter_clauses(&filters);

        assert!(clauses.contains(&json!({ "terms": { "sports": ["soccer"] } })));
        assert!(clauses.contains(&json!({
            "range": { "price_cents": { "gte": 100, "lte": 500 } }
        })));
        assert!(clauses.contains(&json!({ "range": { "rating": { "gte": 4.0 } } })));
        assert!(clauses.contains(&json!({
            "range": { "uploaded_at": { "gte": "2024-01-01T00:00:00+00:00" } }
        })));
    }

    #[test]
    fn test_search_body_with_text() {
        let query = SearchQuery::text("zone defense").with_page(3).with_page_size(10);
        let body = build_search_body(&query);

        let multi_match = &body["query"]["bool"]["must"][0]["multi_match"];
        assert_eq!(multi_match["query"], "zone defense");
        assert_eq!(multi_match["fields"], json!(["title^3", "tags^2", "description"]));
        assert_eq!(multi_match["fuzziness"], "AUTO");
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
        assert_eq!(body["track_total_hits"], true);
        assert!(body["highlight"]["fields"]["title"].is_object());
        assert!(body["aggs"]["sports"].is_object());
    }

    #[test]
    fn test_browse_body_has_no_highlight() {
        let body = build_search_body(&SearchQuery::browse());
        assert!(body["query"]["bool"]["must"][0]["match_all"].is_object());
        assert!(body.get("highlight").is_none());
    }

    #[test]
    fn test_parse_search_response() {
        let id = Uuid::new_v4();
        let body = json!({
            "took": 7,
            "hits": {
                "total": { "value": 41, "relation": "eq" },
                "hits": [{
                    "_id": id.to_string(),
                    "_score": 2.5,
                    "_source": sample_source(id),
                    "highlight": { "title": ["<mark>Zone</mark> defense drills"] }
                }]
            },
            "aggregations": {
                "sports": { "buckets": [{ "key": "basketball", "doc_count": 41 }] },
                "levels": { "buckets": [] },
                "file_types": { "buckets": [] }
            }
        });

        let query = SearchQuery::text("zone").with_page_size(20);
        let result = parse_search_response(&body, &query).unwrap();

        assert_eq!(result.total_hits, 41);
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.took_ms, 7);
        assert_eq!(result.hits[0].id, id);
        assert_eq!(result.hits[0].relevance_score, Some(2.5));
        assert_eq!(
            result.hits[0].highlight.as_ref().unwrap().title.as_deref(),
            Some("<mark>Zone</mark> defense drills")
        );
        assert_eq!(result.facets.unwrap().sports.get("basketball"), Some(&41));
    }

    #[test]
    fn test_parse_response_without_hits_is_parse_error() {
        let err = parse_search_response(&json!({ "error": "boom" }), &SearchQuery::browse())
            .unwrap_err();
        assert!(matches!(err, SearchError::ParseError(_)));
    }

    #[test]
    fn test_more_like_this_excludes_source() {
        let id = Uuid::new_v4();
        let body = build_more_like_this_body("listings", id, 5);
        assert_eq!(body["size"], 5);
        assert_eq!(
            body["query"]["bool"]["must_not"][0]["ids"]["values"][0],
            id.to_string()
        );
        assert_eq!(
            body["query"]["bool"]["must"][0]["more_like_this"]["like"][0]["_index"],
            "listings"
        );
    }

    #[test]
    fn test_parse_recommendations() {
        let id = Uuid::new_v4();
        let body = json!({
            "hits": { "hits": [{ "_score": 1.25, "_source": sample_source(id) }] }
        });
        let results = parse_recommendations(&body).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].similarity_score, 1.25);
        assert_eq!(results[0].reason, RecommendationReason::SimilarContent);
    }
}
