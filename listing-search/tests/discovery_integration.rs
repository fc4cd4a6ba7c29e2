//! Integration tests for the discovery service over in-memory backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use listing_search::{ChannelClickTracker, DiscoveryService};
use listing_search_repository::{
    CatalogError, CatalogStore, InMemorySearchBackend, InMemoryTrendingCache, ReindexSummary,
    SearchBackend, SearchError, SearchGateway,
};
use listing_search_shared::{
    ContentWeights, ListingDocument, ListingStatus, PurchaseRecord, PurchaseStatus,
    RecommendationReason, SearchQuery, SearchResult,
};
use uuid::Uuid;

#[derive(Default)]
struct MockCatalog {
    listings: Vec<ListingDocument>,
    purchases: Vec<PurchaseRecord>,
}

#[async_trait]
impl CatalogStore for MockCatalog {
    async fn list_searchable_listings(&self) -> Result<Vec<ListingDocument>, CatalogError> {
        // rows are returned unfiltered so the service's own visibility check is exercised
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
        let mut ranked: Vec<(f64, &ListingDocument)> = self
            .listings
            .iter()
            .filter(|l| l.id != source.id && l.is_searchable())
            .filter_map(|l| Some((weights.score(source, l)?.score, l)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(ranked.into_iter().take(limit).map(|(_, l)| l.clone()).collect())
    }
}

/// Backend whose every search fails with a fixed error.
struct FailingBackend {
    error: SearchError,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SearchBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn search(&self, _query: &SearchQuery) -> Result<SearchResult, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn index_resource(&self, _document: &ListingDocument) -> Result<(), SearchError> {
        Err(self.error.clone())
    }

    async fn remove_resource(&self, _id: Uuid) -> Result<(), SearchError> {
        Err(self.error.clone())
    }

    async fn reindex_all(
        &self,
        _documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        Err(self.error.clone())
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}

fn listing(title: &str, sport: &str) -> ListingDocument {
    ListingDocument::new(Uuid::new_v4(), Uuid::new_v4(), title, 1500)
        .with_sports(vec![sport.to_string()])
        .with_levels(vec!["youth".to_string()])
}

fn service_with(
    backend: impl SearchBackend + 'static,
    catalog: MockCatalog,
) -> DiscoveryService {
    DiscoveryService::new(
        Arc::new(SearchGateway::new(Box::new(backend))),
        Arc::new(catalog),
        Arc::new(InMemoryTrendingCache::new()),
    )
}

fn failing(error: SearchError) -> (FailingBackend, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        FailingBackend {
            error,
            calls: calls.clone(),
        },
        calls,
    )
}

#[tokio::test]
async fn test_unavailable_primary_routes_to_fallback() {
    let doc = listing("Zone defense drills", "basketball");

    for error in [
        SearchError::connection("connection refused"),
        SearchError::timeout("deadline exceeded"),
    ] {
        let (backend, calls) = failing(error);
        let service = service_with(backend, MockCatalog::default())
            .with_fallback(Arc::new(SearchGateway::new(Box::new(
                InMemorySearchBackend::with_documents(vec![doc.clone()]),
            ))));

        let result = service.search(&SearchQuery::text("zone")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.total_hits, 1);
        assert_eq!(result.hits[0].id, doc.id);
    }
}

#[tokio::test]
async fn test_unavailable_primary_without_fallback_is_an_error() {
    let (backend, _) = failing(SearchError::connection("connection refused"));
    let service = service_with(backend, MockCatalog::default());

    let err = service.search(&SearchQuery::text("zone")).await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_validation_and_query_errors_do_not_fall_back() {
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let fallback = FailingBackend {
        error: SearchError::query("fallback should not be used"),
        calls: fallback_calls.clone(),
    };

    let (backend, primary_calls) = failing(SearchError::query("malformed filter"));
    let service = service_with(backend, MockCatalog::default())
        .with_fallback(Arc::new(SearchGateway::new(Box::new(fallback))));

    let err = service
        .search(&SearchQuery::browse().with_page(0))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::ValidationError(_)));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 0);

    let err = service.search(&SearchQuery::text("zone")).await.unwrap_err();
    assert!(matches!(err, SearchError::QueryError(ref msg) if msg == "malformed filter"));
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_hits_is_not_a_failure() {
    let service = service_with(InMemorySearchBackend::new(), MockCatalog::default());

    let result = service
        .search(&SearchQuery::text("nothing matches this"))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.total_pages, 0);
}

#[tokio::test]
async fn test_delisted_listings_are_never_searchable() {
    let visible = listing("Pressing drills", "soccer");
    let delisted =
        listing("Pressing patterns", "soccer").with_visibility(false, ListingStatus::Active);
    let suspended =
        listing("Pressing traps", "soccer").with_visibility(true, ListingStatus::Suspended);

    let service = service_with(
        InMemorySearchBackend::new(),
        MockCatalog {
            listings: vec![visible.clone(), delisted.clone(), suspended.clone()],
            ..Default::default()
        },
    );

    let summary = service.reindex_from_catalog().await.unwrap();
    assert_eq!(summary.indexed, 1);

    // indexing a hidden listing directly must not make it visible either
    service.index_resource(&delisted).await.unwrap();
    service.index_resource(&suspended).await.unwrap();

    let result = service.search(&SearchQuery::text("pressing")).await.unwrap();
    assert_eq!(result.total_hits, 1);
    assert_eq!(result.hits[0].id, visible.id);
}

#[tokio::test]
async fn test_index_maintenance() {
    let doc = listing("Serve and volley", "tennis");
    let service = service_with(InMemorySearchBackend::new(), MockCatalog::default());

    service.index_resource(&doc).await.unwrap();
    assert_eq!(
        service.search(&SearchQuery::text("volley")).await.unwrap().total_hits,
        1
    );

    service.remove_resource(Uuid::new_v4()).await.unwrap();
    service.remove_resource(doc.id).await.unwrap();
    assert!(service
        .search(&SearchQuery::text("volley"))
        .await
        .unwrap()
        .is_empty());

    service.index_resource(&doc).await.unwrap();
    let summary = service.reindex_all(&[]).await.unwrap();
    assert_eq!(summary.indexed, 0);

    let result = service.search(&SearchQuery::browse()).await.unwrap();
    assert_eq!(result.total_hits, 0);
}

#[tokio::test]
async fn test_indexing_failures_are_retryable() {
    let (backend, _) = failing(SearchError::index("503 Service Unavailable"));
    let service = service_with(backend, MockCatalog::default());

    let err = service
        .index_resource(&listing("Drill", "hockey"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let err = service.reindex_from_catalog().await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_trending_refresh_and_read() {
    let now = Utc::now();
    let hot = listing("Hot", "soccer")
        .with_counters(10, 100)
        .with_uploaded_at(now - Duration::days(2));
    let warm = listing("Warm", "soccer")
        .with_counters(5, 20)
        .with_uploaded_at(now - Duration::days(7));
    let hidden = listing("Hidden", "soccer")
        .with_counters(100, 1000)
        .with_visibility(true, ListingStatus::Archived);

    let service = service_with(
        InMemorySearchBackend::new(),
        MockCatalog {
            listings: vec![warm.clone(), hidden, hot.clone()],
            ..Default::default()
        },
    );

    assert!(service.get_trending(10).await.is_empty());

    assert_eq!(service.refresh_trending().await.unwrap(), 2);

    let trending = service.get_trending(10).await;
    assert_eq!(trending.len(), 2);
    assert_eq!(trending[0].id, hot.id);
    assert_eq!(trending[0].rank, 1);
    assert_eq!(trending[1].id, warm.id);
    assert_eq!(trending[1].rank, 2);
    assert!((trending[1].score - 12.5).abs() < 1e-9);

    assert_eq!(service.get_trending(1).await.len(), 1);
    assert!(service.get_trending(0).await.is_empty());
}

#[tokio::test]
async fn test_recommendations() {
    let now = Utc::now();
    let seller = Uuid::new_v4();
    let source = ListingDocument::new(Uuid::new_v4(), seller, "Source", 1000)
        .with_sports(vec!["soccer".to_string()]);
    let co_bought = listing("Co-bought", "golf");
    let siblings: Vec<ListingDocument> = (0..4)
        .map(|i| {
            ListingDocument::new(Uuid::new_v4(), seller, format!("Sibling {}", i), 500)
                .with_sports(vec!["soccer".to_string()])
        })
        .collect();
    let buyer = Uuid::new_v4();

    let mut listings = vec![source.clone(), co_bought.clone()];
    listings.extend(siblings.iter().cloned());

    let purchase = |resource_id| PurchaseRecord {
        buyer_id: buyer,
        resource_id,
        status: PurchaseStatus::Succeeded,
        purchased_at: now,
    };

    let service = service_with(
        InMemorySearchBackend::new(),
        MockCatalog {
            listings,
            purchases: vec![purchase(source.id), purchase(co_bought.id)],
        },
    );

    let results = service.get_recommendations(source.id, 3).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, co_bought.id);
    assert_eq!(results[0].reason, RecommendationReason::CoPurchase);
    assert!(results[1..]
        .iter()
        .all(|r| r.reason == RecommendationReason::SameSeller));
    assert!(results.iter().all(|r| r.id != source.id));

    let all = service.get_recommendations(source.id, 50).await;
    assert_eq!(all.len(), 5);
    let mut ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);

    assert!(service.get_recommendations(Uuid::new_v4(), 5).await.is_empty());
}

#[tokio::test]
async fn test_track_click_is_forwarded() {
    let (tracker, mut receiver) = ChannelClickTracker::new(8);
    let service = service_with(InMemorySearchBackend::new(), MockCatalog::default())
        .with_click_tracker(Arc::new(tracker));
    let resource = Uuid::new_v4();

    service.track_click("zone defense", resource, "session-42");

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.query, "zone defense");
    assert_eq!(event.resource_id, resource);
    assert_eq!(event.session_id, "session-42");
}

#[tokio::test]
async fn test_health_reflects_primary_backend() {
    let healthy = service_with(InMemorySearchBackend::new(), MockCatalog::default());
    assert!(healthy.is_healthy().await);

    let (backend, _) = failing(SearchError::connection("down"));
    let unhealthy = service_with(backend, MockCatalog::default());
    assert!(!unhealthy.is_healthy().await);
}
