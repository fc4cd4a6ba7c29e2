//! SQL generation for the relational fallback.
//!
//! Queries are assembled with `sqlx::QueryBuilder` so every user-supplied
//! value is a bind parameter. The builders are pure and unit-tested on the
//! generated SQL.

use listing_search_shared::{
    ContentWeights, ListingDocument, SearchQuery, SortDirection, SortField,
};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::postgres::listing_row::{LISTING_COLUMNS, LISTING_FROM, SEARCHABLE_PREDICATE};

const TITLE: &str = "r.title";
const DESCRIPTION: &str = "COALESCE(r.description, '')";
const TAGS_TEXT: &str = "array_to_string(COALESCE(r.tags, '{}'), ' ')";

/// Escape `LIKE` wildcards so user text matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%term%` with wildcards in `term` escaped.
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn lowered_array(column: &str) -> String {
    format!(
        "ARRAY(SELECT lower(x) FROM unnest(COALESCE({}, '{{}}')) AS x)",
        column
    )
}

fn sort_expression(field: SortField) -> Option<&'static str> {
    match field {
        SortField::Score => None,
        SortField::UploadedAt => Some("r.created_at"),
        SortField::Price => Some("COALESCE(r.price_cents, 0)"),
        SortField::Rating => Some("COALESCE(r.rating, 0)"),
        SortField::PurchaseCount => Some("COALESCE(r.purchase_count, 0)"),
        SortField::ViewCount => Some("COALESCE(r.view_count, 0)"),
        SortField::Id => Some("r.id"),
    }
}

/// Push the `WHERE` clause: visibility, text tokens and structured filters.
fn push_where(builder: &mut QueryBuilder<'static, Postgres>, query: &SearchQuery) {
    builder.push(" WHERE ").push(SEARCHABLE_PREDICATE);

    if let Some(text) = query.normalized_text() {
        // Every token must appear in at least one text field.
        for token in text.split_whitespace() {
            let pattern = contains_pattern(token);
            builder
                .push(" AND (")
                .push(TITLE)
                .push(" ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR ")
                .push(DESCRIPTION)
                .push(" ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR ")
                .push(TAGS_TEXT)
                .push(" ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    let filters = &query.filters;
    if !filters.sports.is_empty() {
        builder
            .push(" AND ")
            .push(lowered_array("r.sports"))
            .push(" && ")
            .push_bind(lowercase_all(&filters.sports));
    }
    if !filters.levels.is_empty() {
        builder
            .push(" AND ")
            .push(lowered_array("r.levels"))
            .push(" && ")
            .push_bind(lowercase_all(&filters.levels));
    }
    if !filters.tags.is_empty() {
        builder
            .push(" AND ")
            .push(lowered_array("r.tags"))
            .push(" && ")
            .push_bind(lowercase_all(&filters.tags));
    }
    if !filters.file_types.is_empty() {
        builder
            .push(" AND lower(r.file_type) = ANY(")
            .push_bind(lowercase_all(&filters.file_types))
            .push(")");
    }
    if let Some(min) = filters.min_price_cents {
        builder
            .push(" AND COALESCE(r.price_cents, 0) >= ")
            .push_bind(i64::try_from(min).unwrap_or(i64::MAX));
    }
    if let Some(max) = filters.max_price_cents {
        builder
            .push(" AND COALESCE(r.price_cents, 0) <= ")
            .push_bind(i64::try_from(max).unwrap_or(i64::MAX));
    }
    if let Some(min_rating) = filters.min_rating {
        builder
            .push(" AND COALESCE(r.rating, 0) >= ")
            .push_bind(min_rating);
    }
    if let Some(after) = filters.uploaded_after {
        builder.push(" AND r.created_at >= ").push_bind(after);
    }
    if let Some(before) = filters.uploaded_before {
        builder.push(" AND r.created_at <= ").push_bind(before);
    }
}

/// Push the `ORDER BY` clause for the query's sort mode.
///
/// Relevance is approximated by which fields contain the whole phrase,
/// weighted title 3, tags 2, description 1.
fn push_order_by(builder: &mut QueryBuilder<'static, Postgres>, query: &SearchQuery) {
    builder.push(" ORDER BY ");
    let mut first = true;

    for (field, direction) in query.sort.sort_keys() {
        let expression = match (field, query.normalized_text()) {
            (SortField::Score, Some(text)) => {
                let pattern = contains_pattern(text);
                if !first {
                    builder.push(", ");
                }
                builder
                    .push("(CASE WHEN ")
                    .push(TITLE)
                    .push(" ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" THEN 3 ELSE 0 END + CASE WHEN ")
                    .push(TAGS_TEXT)
                    .push(" ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" THEN 2 ELSE 0 END + CASE WHEN ")
                    .push(DESCRIPTION)
                    .push(" ILIKE ")
                    .push_bind(pattern)
                    .push(" THEN 1 ELSE 0 END) DESC");
                first = false;
                continue;
            }
            (field, _) => match sort_expression(field) {
                Some(expression) => expression,
                None => continue,
            },
        };

        if !first {
            builder.push(", ");
        }
        let direction = match direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        builder.push(expression).push(" ").push(direction);
        first = false;
    }
}

/// Build the page query for a search.
pub fn build_search_query(query: &SearchQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(LISTING_COLUMNS).push(LISTING_FROM);
    push_where(&mut builder, query);
    push_order_by(&mut builder, query);
    builder
        .push(" LIMIT ")
        .push_bind(i64::from(query.page_size))
        .push(" OFFSET ")
        .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
    builder
}

/// Build the total-count query for a search.
pub fn build_count_query(query: &SearchQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*)");
    builder.push(LISTING_FROM);
    push_where(&mut builder, query);
    builder
}

/// Number of distinct lowercased tags of `column` found in the bound list.
fn push_shared_tag_count(
    builder: &mut QueryBuilder<'static, Postgres>,
    column: &str,
    source_tags: &[String],
) {
    builder
        .push("cardinality(ARRAY(SELECT DISTINCT lower(x) FROM unnest(COALESCE(")
        .push(column)
        .push(", '{}')) AS x WHERE lower(x) = ANY(")
        .push_bind(lowercase_all(source_tags))
        .push(")))");
}

/// Build the query for listings related to `source` by seller, sport,
/// level or category, ranked by content similarity under `weights` before
/// the `LIMIT` is applied.
pub fn build_content_candidates_query(
    source: &ListingDocument,
    weights: &ContentWeights,
    limit: usize,
) -> QueryBuilder<'static, Postgres> {
    let category = source.category.as_ref().map(|c| c.to_lowercase());

    let mut builder = QueryBuilder::new("SELECT ");
    builder
        .push(LISTING_COLUMNS)
        .push(LISTING_FROM)
        .push(" WHERE ")
        .push(SEARCHABLE_PREDICATE)
        .push(" AND r.id <> ")
        .push_bind(source.id)
        .push(" AND (r.seller_id = ")
        .push_bind(source.seller_id)
        .push(" OR ")
        .push(lowered_array("r.sports"))
        .push(" && ")
        .push_bind(lowercase_all(&source.sports))
        .push(" OR ")
        .push(lowered_array("r.levels"))
        .push(" && ")
        .push_bind(lowercase_all(&source.levels));
    if let Some(ref category) = category {
        builder
            .push(" OR lower(r.category) = ")
            .push_bind(category.clone());
    }

    builder
        .push(") ORDER BY (CASE WHEN r.seller_id = ")
        .push_bind(source.seller_id)
        .push(" THEN ")
        .push_bind(weights.same_seller)
        .push(" ELSE 0 END + ");
    push_shared_tag_count(&mut builder, "r.sports", &source.sports);
    builder.push(" * ").push_bind(weights.shared_sport).push(" + ");
    push_shared_tag_count(&mut builder, "r.levels", &source.levels);
    builder.push(" * ").push_bind(weights.shared_level);
    if let Some(category) = category {
        builder
            .push(" + CASE WHEN lower(r.category) = ")
            .push_bind(category)
            .push(" THEN ")
            .push_bind(weights.same_category)
            .push(" ELSE 0 END");
    }
    builder
        .push(" + ln(1 + COALESCE(r.purchase_count, 0)::DOUBLE PRECISION) * ")
        .push_bind(weights.popularity)
        .push(") DESC, r.id ASC LIMIT ")
        .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    builder
}

/// Build the query for listings by id, regardless of visibility.
pub fn build_listings_by_id_query(ids: &[Uuid]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder
        .push(LISTING_COLUMNS)
        .push(LISTING_FROM)
        .push(" WHERE r.id = ANY(")
        .push_bind(ids.to_vec())
        .push(")");
    builder
}
