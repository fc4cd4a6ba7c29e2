//! In-memory trending rank cache.

use std::sync::Arc;

use async_trait::async_trait;
use listing_search_shared::TrendingResult;
use tokio::sync::RwLock;

use crate::errors::CatalogError;
use crate::interfaces::TrendingCacheStore;

/// Process-local [`TrendingCacheStore`]. Each refresh swaps in a new
/// generation behind a single pointer.
#[derive(Default)]
pub struct InMemoryTrendingCache {
    generation: RwLock<Arc<Vec<TrendingResult>>>,
}

impl InMemoryTrendingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrendingCacheStore for InMemoryTrendingCache {
    async fn replace_all(&self, entries: &[TrendingResult]) -> Result<(), CatalogError> {
        let mut next = entries.to_vec();
        next.sort_by_key(|e| e.rank);
        *self.generation.write().await = Arc::new(next);
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<TrendingResult>, CatalogError> {
        let snapshot = self.generation.read().await.clone();
        Ok(snapshot.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(rank: u32, score: f64) -> TrendingResult {
        TrendingResult {
            id: Uuid::new_v4(),
            title: format!("Listing {}", rank),
            sport: None,
            price_cents: 100,
            score,
            rank,
            seller_name: None,
        }
    }

    #[tokio::test]
    async fn test_replace_all_swaps_generation() {
        let cache = InMemoryTrendingCache::new();
        cache
            .replace_all(&[entry(1, 9.0), entry(2, 5.0), entry(3, 1.0)])
            .await
            .unwrap();
        assert_eq!(cache.top(10).await.unwrap().len(), 3);

        let next = vec![entry(1, 4.0)];
        cache.replace_all(&next).await.unwrap();

        let top = cache.top(10).await.unwrap();
        assert_eq!(top, next);
    }

    #[tokio::test]
    async fn test_top_respects_limit_and_rank_order() {
        let cache = InMemoryTrendingCache::new();
        cache
            .replace_all(&[entry(2, 5.0), entry(1, 9.0), entry(3, 1.0)])
            .await
            .unwrap();

        let top = cache.top(2).await.unwrap();
        assert_eq!(top.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2]);
        assert!(cache.top(0).await.unwrap().is_empty());
    }
}
