//! In-memory search backend.
//!
//! Keeps the whole corpus in a process-local map. Every mutation produces a
//! new generation of the map behind an `Arc`, so a search always runs against
//! one consistent snapshot.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use listing_search_shared::{
    FacetCounts, Highlight, ListingDocument, SearchHit, SearchQuery, SearchResult, SortMode,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::types::ReindexSummary;

const TITLE_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;

type Corpus = HashMap<Uuid, ListingDocument>;

/// Process-local implementation of [`SearchBackend`].
///
/// Text matching is token based: every query token must occur in the title,
/// a tag or the description. Matches are scored by field (title 3, tag 2,
/// description 1) for relevance ordering.
#[derive(Default)]
pub struct InMemorySearchBackend {
    corpus: RwLock<Arc<Corpus>>,
}

impl InMemorySearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-loaded with `documents`.
    pub fn with_documents(documents: impl IntoIterator<Item = ListingDocument>) -> Self {
        let corpus: Corpus = documents.into_iter().map(|d| (d.id, d)).collect();
        Self {
            corpus: RwLock::new(Arc::new(corpus)),
        }
    }

    /// Number of documents currently stored, searchable or not.
    pub async fn len(&self) -> usize {
        self.corpus.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn snapshot(&self) -> Arc<Corpus> {
        self.corpus.read().await.clone()
    }
}

/// Split text into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Relevance of `doc` for `tokens`, or `None` if some token matches nothing.
fn text_score(doc: &ListingDocument, tokens: &[String]) -> Option<f64> {
    let title = doc.title.to_ascii_lowercase();
    let description = doc.description.to_ascii_lowercase();
    let tags: Vec<String> = doc.tags.iter().map(|t| t.to_ascii_lowercase()).collect();

    let mut score = 0.0;
    for token in tokens {
        let mut token_score = 0.0;
        if title.contains(token.as_str()) {
            token_score += TITLE_WEIGHT;
        }
        if tags.iter().any(|t| t.contains(token.as_str())) {
            token_score += TAG_WEIGHT;
        }
        if description.contains(token.as_str()) {
            token_score += DESCRIPTION_WEIGHT;
        }
        if token_score == 0.0 {
            return None;
        }
        score += token_score;
    }
    Some(score)
}

/// Wrap every occurrence of a token in `<mark>` tags. Returns `None` when
/// nothing matched.
fn highlight(text: &str, tokens: &[String]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let mut ranges: Vec<(usize, usize)> = tokens
        .iter()
        .flat_map(|token| {
            lower
                .match_indices(token.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect::<Vec<_>>()
        })
        .collect();
    if ranges.is_empty() {
        return None;
    }

    ranges.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(text.len() + merged.len() * 13);
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&text[cursor..start]);
        out.push_str("<mark>");
        out.push_str(&text[start..end]);
        out.push_str("</mark>");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

#[async_trait]
impl SearchBackend for InMemorySearchBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let corpus = self.snapshot().await;
        let tokens = query.normalized_text().map(tokenize).unwrap_or_default();

        let mut matched: Vec<(&ListingDocument, f64)> = corpus
            .values()
            .filter(|doc| doc.is_searchable() && query.filters.matches(doc))
            .filter_map(|doc| {
                if tokens.is_empty() {
                    Some((doc, 0.0))
                } else {
                    text_score(doc, &tokens).map(|score| (doc, score))
                }
            })
            .collect();

        matched.sort_by(|(a, score_a), (b, score_b)| match query.sort {
            SortMode::Relevance => score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| SortMode::Relevance.compare(a, b)),
            mode => mode.compare(a, b),
        });

        let total_hits = matched.len() as u64;
        let mut hits_for_facets = Vec::with_capacity(matched.len());
        let mut hits = Vec::with_capacity(query.page_size as usize);
        let offset = query.offset() as usize;

        for (index, (doc, score)) in matched.into_iter().enumerate() {
            let mut hit = SearchHit::from(doc.clone());
            let in_page = index >= offset && index < offset + query.page_size as usize;
            if in_page {
                if !tokens.is_empty() {
                    hit.relevance_score = Some(score);
                    let snippet = Highlight {
                        title: highlight(&doc.title, &tokens),
                        description: highlight(&doc.description, &tokens),
                    };
                    if !snippet.is_empty() {
                        hit.highlight = Some(snippet);
                    }
                }
                hits.push(hit.clone());
            }
            hits_for_facets.push(hit);
        }

        let facets = FacetCounts::from_hits(&hits_for_facets);
        let took_ms = started.elapsed().as_millis() as u64;

        debug!(
            backend = "memory",
            total_hits = total_hits,
            returned = hits.len(),
            "Search executed"
        );

        Ok(
            SearchResult::new(hits, total_hits, query.page, query.page_size, took_ms)
                .with_facets(facets),
        )
    }

    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        let mut guard = self.corpus.write().await;
        Arc::make_mut(&mut *guard).insert(document.id, document.clone());
        debug!(doc_id = %document.id, "Document indexed");
        Ok(())
    }

    async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError> {
        let mut guard = self.corpus.write().await;
        if guard.contains_key(&id) {
            Arc::make_mut(&mut *guard).remove(&id);
            debug!(doc_id = %id, "Document removed");
        }
        Ok(())
    }

    async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        let next: Corpus = documents.iter().map(|d| (d.id, d.clone())).collect();
        let indexed = next.len();
        *self.corpus.write().await = Arc::new(next);
        Ok(ReindexSummary::new(indexed))
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
