//! Recommendation engine.
//!
//! Related listings come from two stages: listings bought by the buyers of
//! the source listing, then listings sharing seller or taxonomy with it when
//! the first stage falls short of the requested limit.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use listing_search_repository::{CatalogError, CatalogStore};
use listing_search_shared::{
    ContentWeights, ListingDocument, RecommendationReason, RecommendationResult,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Tunable constants of both recommendation stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationWeights {
    /// Weight of each distinct co-purchasing buyer.
    pub co_purchase: f64,
    /// Weight of the summed purchase recency.
    pub recency: f64,
    /// Lowest recency contribution of a single purchase.
    pub recency_floor: f64,
    /// Days over which a purchase's recency decays to the floor.
    pub recency_window_days: f64,
    /// Weights of the content similarity stage.
    pub content: ContentWeights,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            co_purchase: 1.0,
            recency: 0.25,
            recency_floor: 0.1,
            recency_window_days: 30.0,
            content: ContentWeights::default(),
        }
    }
}

/// Configuration for the recommendation engine.
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Upper bound on the number of results of a single call.
    pub max_limit: usize,
    /// Number of content candidates fetched per missing result.
    pub candidate_multiplier: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_limit: 50,
            candidate_multiplier: 4,
        }
    }
}

#[derive(Default)]
struct CoPurchaseTally {
    buyers: HashSet<Uuid>,
    recent_weight: f64,
}

/// Computes related listings for a source listing.
pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    weights: RecommendationWeights,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            weights: RecommendationWeights::default(),
            config: RecommendationConfig::default(),
        }
    }

    pub fn with_weights(mut self, weights: RecommendationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_config(mut self, config: RecommendationConfig) -> Self {
        self.config = config;
        self
    }

    /// Related listings for `source_id`, best first.
    ///
    /// Never contains the source listing or the same listing twice, and
    /// never more than `limit` (itself capped by `max_limit`) entries.
    /// Catalog errors are logged; the results computed so far are returned.
    #[instrument(skip(self))]
    pub async fn recommend(&self, source_id: Uuid, limit: usize) -> Vec<RecommendationResult> {
        self.recommend_at(source_id, limit, Utc::now()).await
    }

    async fn recommend_at(
        &self,
        source_id: Uuid,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<RecommendationResult> {
        let limit = limit.min(self.config.max_limit);
        if limit == 0 {
            return Vec::new();
        }

        let mut results = match self.co_purchase_stage(source_id, now).await {
            Ok(results) => results,
            Err(e) => {
                warn!(source_id = %source_id, error = %e, "Co-purchase stage failed");
                Vec::new()
            }
        };
        results.truncate(limit);

        if results.len() < limit {
            let taken: HashSet<Uuid> = results.iter().map(|r| r.id).collect();
            match self
                .content_stage(source_id, &taken, limit - results.len())
                .await
            {
                Ok(fill) => results.extend(fill),
                Err(e) => {
                    warn!(source_id = %source_id, error = %e, "Content similarity stage failed");
                }
            }
        }

        debug!(source_id = %source_id, count = results.len(), "Recommendations computed");
        results
    }

    /// Score listings bought by buyers of the source listing.
    async fn co_purchase_stage(
        &self,
        source_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationResult>, CatalogError> {
        let buyers = self.catalog.buyers_of(source_id).await?;
        if buyers.is_empty() {
            return Ok(Vec::new());
        }
        let buyer_set: HashSet<Uuid> = buyers.iter().copied().collect();

        let purchases = self.catalog.purchases_by_buyers(&buyers).await?;
        let mut tallies: HashMap<Uuid, CoPurchaseTally> = HashMap::new();
        for purchase in purchases.iter().filter(|p| {
            p.resource_id != source_id
                && p.status.is_qualifying()
                && buyer_set.contains(&p.buyer_id)
        }) {
            let days = ((now - purchase.purchased_at).num_milliseconds() as f64 / MILLIS_PER_DAY)
                .max(0.0);
            let tally = tallies.entry(purchase.resource_id).or_default();
            tally.buyers.insert(purchase.buyer_id);
            tally.recent_weight += self.recency_weight(days);
        }

        if tallies.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<Uuid> = tallies.keys().copied().collect();
        let listings = self.catalog.get_listings(&candidate_ids).await?;

        let mut results: Vec<RecommendationResult> = listings
            .iter()
            .filter(|doc| doc.is_searchable())
            .filter_map(|doc| {
                let tally = tallies.get(&doc.id)?;
                let score = tally.buyers.len() as f64 * self.weights.co_purchase
                    + tally.recent_weight * self.weights.recency;
                Some(RecommendationResult::from_document(
                    doc,
                    score,
                    RecommendationReason::CoPurchase,
                ))
            })
            .collect();

        sort_results(&mut results);
        results.dedup_by_key(|r| r.id);
        Ok(results)
    }

    /// Score listings sharing seller, sport, level or category with the
    /// source. Skipped when the source listing no longer exists.
    async fn content_stage(
        &self,
        source_id: Uuid,
        taken: &HashSet<Uuid>,
        wanted: usize,
    ) -> Result<Vec<RecommendationResult>, CatalogError> {
        let Some(source) = self.catalog.get_listing(source_id).await? else {
            debug!(source_id = %source_id, "Source listing not found, skipping content stage");
            return Ok(Vec::new());
        };

        let pool_size = (wanted + taken.len() + 1) * self.config.candidate_multiplier;
        let candidates = self
            .catalog
            .content_candidates(&source, &self.weights.content, pool_size)
            .await?;

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut results: Vec<RecommendationResult> = candidates
            .iter()
            .filter(|doc| {
                doc.id != source_id
                    && !taken.contains(&doc.id)
                    && doc.is_searchable()
                    && seen.insert(doc.id)
            })
            .filter_map(|doc| self.content_score(&source, doc))
            .collect();

        sort_results(&mut results);
        results.truncate(wanted);
        Ok(results)
    }

    /// Similarity of `candidate` to `source`, or `None` if they share nothing.
    fn content_score(
        &self,
        source: &ListingDocument,
        candidate: &ListingDocument,
    ) -> Option<RecommendationResult> {
        let matched = self.weights.content.score(source, candidate)?;
        let reason = if matched.same_seller {
            RecommendationReason::SameSeller
        } else {
            RecommendationReason::SimilarContent
        };
        Some(RecommendationResult::from_document(
            candidate,
            matched.score,
            reason,
        ))
    }

    fn recency_weight(&self, days_since_purchase: f64) -> f64 {
        (1.0 - days_since_purchase / self.weights.recency_window_days)
            .max(self.weights.recency_floor)
    }
}

fn sort_results(results: &mut [RecommendationResult]) {
    results.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use listing_search_shared::{ListingStatus, PurchaseRecord, PurchaseStatus};

    #[derive(Default)]
    struct MockCatalog {
        listings: Vec<ListingDocument>,
        purchases: Vec<PurchaseRecord>,
        fail_purchases: bool,
    }

    #[async_trait]
    impl CatalogStore for MockCatalog {
        async fn list_searchable_listings(&self) -> Result<Vec<ListingDocument>, CatalogError> {
            Ok(self.listings.clone())
        }

        async fn get_listing(&self, id: Uuid) -> Result<Option<ListingDocument>, CatalogError> {
            Ok(self.listings.iter().find(|l| l.id == id).cloned())
        }

        async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingDocument>, CatalogError> {
            Ok(self
                .listings
                .iter()
                .filter(|l| ids.contains(&l.id))
                .cloned()
                .collect())
        }

        async fn buyers_of(&self, resource_id: Uuid) -> Result<Vec<Uuid>, CatalogError> {
            if self.fail_purchases {
                return Err(CatalogError::Unavailable("purchases offline".to_string()));
            }
            let mut buyers: Vec<Uuid> = self
                .purchases
                .iter()
                .filter(|p| p.resource_id == resource_id && p.status.is_qualifying())
                .map(|p| p.buyer_id)
                .collect();
            buyers.sort();
            buyers.dedup();
            Ok(buyers)
        }

        async fn purchases_by_buyers(
            &self,
            buyer_ids: &[Uuid],
        ) -> Result<Vec<PurchaseRecord>, CatalogError> {
            Ok(self
                .purchases
                .iter()
                .filter(|p| buyer_ids.contains(&p.buyer_id))
                .cloned()
                .collect())
        }

        async fn content_candidates(
            &self,
            source: &ListingDocument,
            weights: &ContentWeights,
            limit: usize,
        ) -> Result<Vec<ListingDocument>, CatalogError> {
            let mut ranked: Vec<(f64, ListingDocument)> = self
                .listings
                .iter()
                .filter(|l| l.id != source.id && l.is_searchable())
                .filter_map(|l| Some((weights.score(source, l)?.score, l.clone())))
                .collect();
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
            Ok(ranked.into_iter().take(limit).map(|(_, l)| l).collect())
        }
    }

    fn listing(seller: Uuid, sport: &str) -> ListingDocument {
        ListingDocument::new(Uuid::new_v4(), seller, "Drill", 900)
            .with_sports(vec![sport.to_string()])
            .with_levels(vec!["youth".to_string()])
    }

    fn purchase(buyer: Uuid, resource: Uuid, at: DateTime<Utc>) -> PurchaseRecord {
        PurchaseRecord {
            buyer_id: buyer,
            resource_id: resource,
            status: PurchaseStatus::Completed,
            purchased_at: at,
        }
    }

    #[tokio::test]
    async fn test_co_purchase_score() {
        let now = Utc::now();
        let source = listing(Uuid::new_v4(), "soccer");
        let other = listing(Uuid::new_v4(), "hockey");
        let (b1, b2) = (Uuid::new_v4(), Uuid::new_v4());

        let catalog = MockCatalog {
            listings: vec![source.clone(), other.clone()],
            purchases: vec![
                purchase(b1, source.id, now - Duration::days(40)),
                purchase(b2, source.id, now - Duration::days(40)),
                purchase(b1, other.id, now - Duration::days(15)),
                purchase(b2, other.id, now - Duration::days(60)),
            ],
            ..Default::default()
        };
        let engine = RecommendationEngine::new(Arc::new(catalog));

        let results = engine.recommend_at(source.id, 1, now).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, other.id);
        assert_eq!(results[0].reason, RecommendationReason::CoPurchase);
        // two buyers, recency 0.5 + 0.1
        let expected = 2.0 * 1.0 + (0.5 + 0.1) * 0.25;
        assert!((results[0].similarity_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_co_purchase_ignores_unqualifying_and_hidden() {
        let now = Utc::now();
        let source = listing(Uuid::new_v4(), "soccer");
        let refunded = listing(Uuid::new_v4(), "golf");
        let delisted =
            listing(Uuid::new_v4(), "golf").with_visibility(false, ListingStatus::Active);
        let buyer = Uuid::new_v4();

        let mut refund = purchase(buyer, refunded.id, now);
        refund.status = PurchaseStatus::Refunded;
        let catalog = MockCatalog {
            listings: vec![source.clone(), refunded, delisted.clone()],
            purchases: vec![
                purchase(buyer, source.id, now),
                refund,
                purchase(buyer, delisted.id, now),
            ],
            ..Default::default()
        };
        let engine = RecommendationEngine::new(Arc::new(catalog));

        let results = engine.recommend_at(source.id, 5, now).await;
        assert!(results
            .iter()
            .all(|r| r.reason != RecommendationReason::CoPurchase));
        assert!(results.iter().all(|r| r.id != delisted.id));
    }

    #[tokio::test]
    async fn test_content_fill_scores_and_reasons() {
        let seller = Uuid::new_v4();
        let source = listing(seller, "Soccer").with_category("playbook");
        let same_seller = listing(seller, "tennis").with_levels(Vec::new());
        let same_sport = listing(Uuid::new_v4(), "soccer").with_levels(Vec::new());
        let unrelated = listing(Uuid::new_v4(), "golf").with_levels(vec!["pro".to_string()]);

        let catalog = MockCatalog {
            listings: vec![
                source.clone(),
                unrelated.clone(),
                same_sport.clone(),
                same_seller.clone(),
            ],
            ..Default::default()
        };
        let engine = RecommendationEngine::new(Arc::new(catalog));

        let results = engine.recommend_at(source.id, 10, Utc::now()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, same_seller.id);
        assert_eq!(results[0].reason, RecommendationReason::SameSeller);
        assert!((results[0].similarity_score - 2.0).abs() < 1e-9);
        assert_eq!(results[1].id, same_sport.id);
        assert_eq!(results[1].reason, RecommendationReason::SimilarContent);
        assert!((results[1].similarity_score - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_results_exclude_source_dedupe_and_cap() {
        let now = Utc::now();
        let seller = Uuid::new_v4();
        let source = listing(seller, "soccer");
        let others: Vec<ListingDocument> = (0..6).map(|_| listing(seller, "soccer")).collect();
        let buyer = Uuid::new_v4();

        let mut purchases = vec![purchase(buyer, source.id, now)];
        purchases.extend(others.iter().take(3).map(|o| purchase(buyer, o.id, now)));
        purchases.push(purchase(buyer, others[0].id, now - Duration::days(2)));

        let mut listings = vec![source.clone()];
        listings.extend(others.iter().cloned());
        let engine = RecommendationEngine::new(Arc::new(MockCatalog {
            listings,
            purchases,
            ..Default::default()
        }));

        for limit in [1, 3, 4, 7, 20] {
            let results = engine.recommend_at(source.id, limit, now).await;
            let ids: HashSet<Uuid> = results.iter().map(|r| r.id).collect();

            assert!(results.len() <= limit);
            assert_eq!(ids.len(), results.len(), "duplicate at limit {}", limit);
            assert!(!ids.contains(&source.id));
        }

        let all = engine.recommend_at(source.id, 20, now).await;
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].id, others[0].id);
        assert!(all[..3]
            .iter()
            .all(|r| r.reason == RecommendationReason::CoPurchase));
        assert!(engine.recommend_at(source.id, 0, now).await.is_empty());
    }

    #[tokio::test]
    async fn test_limit_is_capped() {
        let seller = Uuid::new_v4();
        let source = listing(seller, "soccer");
        let mut listings = vec![source.clone()];
        listings.extend((0..10).map(|_| listing(seller, "soccer")));

        let engine = RecommendationEngine::new(Arc::new(MockCatalog {
            listings,
            ..Default::default()
        }))
        .with_config(RecommendationConfig {
            max_limit: 4,
            ..Default::default()
        });

        assert_eq!(engine.recommend(source.id, 100).await.len(), 4);
    }

    #[tokio::test]
    async fn test_stage_failure_returns_partial_results() {
        let seller = Uuid::new_v4();
        let source = listing(seller, "soccer");
        let sibling = listing(seller, "hockey");

        let engine = RecommendationEngine::new(Arc::new(MockCatalog {
            listings: vec![source.clone(), sibling.clone()],
            fail_purchases: true,
            ..Default::default()
        }));

        let results = engine.recommend(source.id, 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, sibling.id);
    }

    #[tokio::test]
    async fn test_missing_source_skips_content_stage() {
        let now = Utc::now();
        let source_id = Uuid::new_v4();
        let bought = listing(Uuid::new_v4(), "soccer");
        let buyer = Uuid::new_v4();

        let engine = RecommendationEngine::new(Arc::new(MockCatalog {
            listings: vec![bought.clone(), listing(Uuid::new_v4(), "soccer")],
            purchases: vec![purchase(buyer, source_id, now), purchase(buyer, bought.id, now)],
            ..Default::default()
        }));

        let results = engine.recommend_at(source_id, 5, now).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, bought.id);
    }

    #[tokio::test]
    async fn test_unsold_best_match_beats_popular_weak_matches() {
        let seller = Uuid::new_v4();
        let source = listing(seller, "soccer");
        let best = listing(seller, "soccer");

        let mut listings = vec![source.clone()];
        // More popular one-tag matches than the candidate pool holds.
        listings.extend((0..30).map(|_| {
            ListingDocument::new(Uuid::new_v4(), Uuid::new_v4(), "Youth notes", 500)
                .with_levels(vec!["Youth".to_string()])
                .with_counters(100, 0)
        }));
        listings.push(best.clone());

        let engine = RecommendationEngine::new(Arc::new(MockCatalog {
            listings,
            ..Default::default()
        }));

        let results = engine.recommend(source.id, 5).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, best.id);
        assert_eq!(results[0].reason, RecommendationReason::SameSeller);
        assert!((results[0].similarity_score - 4.5).abs() < 1e-9);
        assert!(results[1..]
            .iter()
            .all(|r| r.reason == RecommendationReason::SimilarContent));
    }
}
