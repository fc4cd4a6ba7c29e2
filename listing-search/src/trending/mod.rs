//! Trending score engine.
//!
//! Ranks every searchable listing by engagement decayed with age and
//! replaces the trending cache with the new ranking in one step.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use listing_search_repository::{CatalogError, CatalogStore, TrendingCacheStore};
use listing_search_shared::{ListingDocument, TrendingResult, TrendingScore};
use tracing::{info, instrument, warn};

/// Tunable constants of the trending formula.
///
/// ```text
/// raw   = purchases * purchase_weight + views * view_weight
/// age   = max(1, whole days since upload)
/// score = raw / (1 + age / decay_days)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingWeights {
    pub purchase_weight: f64,
    pub view_weight: f64,
    pub decay_days: f64,
}

impl Default for TrendingWeights {
    fn default() -> Self {
        Self {
            purchase_weight: 3.0,
            view_weight: 0.5,
            decay_days: 7.0,
        }
    }
}

/// Compute the trending score of a single listing at `now`.
///
/// Listings uploaded less than a day ago, or with a timestamp in the future,
/// count as one day old.
pub fn compute_score(
    doc: &ListingDocument,
    now: DateTime<Utc>,
    weights: &TrendingWeights,
) -> TrendingScore {
    let raw_score = doc.purchase_count as f64 * weights.purchase_weight
        + doc.view_count as f64 * weights.view_weight;
    let age_days = (now - doc.uploaded_at).num_days().max(1);
    let decay = 1.0 + age_days as f64 / weights.decay_days;

    TrendingScore {
        resource_id: doc.id,
        raw_score,
        purchase_count: doc.purchase_count,
        view_count: doc.view_count,
        age_days,
        score: raw_score / decay,
    }
}

/// Rank the searchable listings of `docs`.
///
/// Ranks start at 1 for the highest score; equal scores are ordered by
/// listing id ascending.
pub fn rank_listings(
    docs: &[ListingDocument],
    now: DateTime<Utc>,
    weights: &TrendingWeights,
) -> Vec<TrendingResult> {
    let mut scored: Vec<(&ListingDocument, f64)> = docs
        .iter()
        .filter(|doc| doc.is_searchable())
        .map(|doc| (doc, compute_score(doc, now, weights).score))
        .collect();

    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(position, (doc, score))| TrendingResult {
            id: doc.id,
            title: doc.title.clone(),
            sport: doc.primary_sport().map(str::to_string),
            price_cents: doc.price_cents,
            score,
            rank: position as u32 + 1,
            seller_name: doc.seller_name.clone(),
        })
        .collect()
}

/// Computes the trending ranking from the catalog and serves it from the
/// trending cache.
pub struct TrendingEngine {
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<dyn TrendingCacheStore>,
    weights: TrendingWeights,
}

impl TrendingEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, cache: Arc<dyn TrendingCacheStore>) -> Self {
        Self {
            catalog,
            cache,
            weights: TrendingWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: TrendingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> &TrendingWeights {
        &self.weights
    }

    /// Recompute the ranking and replace the cache with it.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of ranked listings now in the cache
    /// * `Err(CatalogError)` - If the catalog could not be read or the cache
    ///   could not be written; the previous ranking stays in place
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, CatalogError> {
        let started = Instant::now();
        let listings = self.catalog.list_searchable_listings().await?;
        let ranked = rank_listings(&listings, Utc::now(), &self.weights);

        self.cache.replace_all(&ranked).await?;

        info!(
            candidates = listings.len(),
            ranked = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Trending cache refreshed"
        );
        Ok(ranked.len())
    }

    /// Read the top `limit` entries of the cache.
    ///
    /// Read failures are logged and yield an empty list.
    pub async fn top(&self, limit: usize) -> Vec<TrendingResult> {
        if limit == 0 {
            return Vec::new();
        }

        match self.cache.top(limit).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, limit = limit, "Failed to read trending cache");
                Vec::new()
            }
        }
    }
}
