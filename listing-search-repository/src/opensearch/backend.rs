//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust crate.

use std::time::Instant;

use async_trait::async_trait;
use listing_search_shared::{ListingDocument, RecommendationResult, SearchQuery, SearchResult};
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsAliasParts, IndicesGetAliasParts,
        IndicesRefreshParts,
    },
    BulkParts, DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::opensearch::query;
use crate::types::ReindexSummary;

/// Documents sent per bulk request during a rebuild.
const BULK_CHUNK_SIZE: usize = 500;

/// OpenSearch backend implementation.
///
/// Reads and writes go through `index_config.alias`. A full rebuild creates
/// the next versioned index, loads it, and then moves the alias in a single
/// `_aliases` call so readers switch corpora atomically.
///
/// # Example
///
/// ```ignore
/// use listing_search_repository::opensearch::{IndexConfig, OpenSearchBackend};
///
/// let config = IndexConfig::new("listings", 0);
/// let backend = OpenSearchBackend::new("http://localhost:9200", config).await?;
/// backend.ensure_index_exists().await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchBackend {
    /// Create a new OpenSearch backend connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing alias and version
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchBackend)` - A new backend instance
    /// * `Err(SearchError)` - If the URL is invalid or the transport cannot be built
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::config(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch backend"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Read the body of a failed response for the error message.
    async fn failure_body(response: Response) -> String {
        response.text().await.unwrap_or_default()
    }

    /// Physical indices the alias currently points to.
    async fn aliased_indices(&self) -> Result<Vec<String>, SearchError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            return Err(SearchError::query(format!(
                "Alias lookup failed with status {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        Ok(body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_index(&self, index_name: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index_name))
            .body(get_index_settings())
            .send()
            .await
            .map_err(|e| SearchError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            error!(index = %index_name, status = %status, body = %body, "Index creation failed");
            return Err(SearchError::index_creation(format!(
                "Creating {} failed with status {}: {}",
                index_name, status, body
            )));
        }

        info!(index = %index_name, "Created search index");
        Ok(())
    }

    /// Delete physical indices, logging instead of failing.
    async fn delete_indices_quietly(&self, index_names: &[&str]) {
        if index_names.is_empty() {
            return;
        }

        match self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(index_names))
            .send()
            .await
        {
            Ok(response) if response.status_code().is_success() => {
                debug!(indices = ?index_names, "Deleted indices");
            }
            Ok(response) => {
                warn!(
                    indices = ?index_names,
                    status = %response.status_code(),
                    "Index cleanup failed"
                );
            }
            Err(e) => {
                warn!(indices = ?index_names, error = %e, "Index cleanup failed");
            }
        }
    }

    async fn bulk_load(
        &self,
        index_name: &str,
        documents: &[ListingDocument],
    ) -> Result<(), SearchError> {
        for chunk in documents.chunks(BULK_CHUNK_SIZE) {
            let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(chunk.len() * 2);
            for document in chunk {
                let source = serde_json::to_value(document)
                    .map_err(|e| SearchError::serialization(e.to_string()))?;
                body.push(json!({ "index": { "_id": document.id.to_string() } }).into());
                body.push(source.into());
            }

            let response = self
                .client
                .bulk(BulkParts::Index(index_name))
                .body(body)
                .send()
                .await
                .map_err(|e| SearchError::reindex(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let body = Self::failure_body(response).await;
                return Err(SearchError::reindex(format!(
                    "Bulk load failed with status {}: {}",
                    status, body
                )));
            }

            let result: Value = response
                .json()
                .await
                .map_err(|e| SearchError::parse(e.to_string()))?;
            if result["errors"].as_bool().unwrap_or(false) {
                return Err(SearchError::reindex(format!(
                    "Bulk load into {} reported item errors",
                    index_name
                )));
            }
        }

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index_name]))
            .send()
            .await
            .map_err(|e| SearchError::reindex(e.to_string()))?;
        if !response.status_code().is_success() {
            return Err(SearchError::reindex(format!(
                "Refreshing {} failed with status {}",
                index_name,
                response.status_code()
            )));
        }

        Ok(())
    }

    /// Point the alias at `target` and away from `previous` in one request.
    async fn swap_alias(&self, target: &str, previous: &[String]) -> Result<(), SearchError> {
        let alias = self.index_config.alias.as_str();
        let mut actions: Vec<Value> = previous
            .iter()
            .map(|index| json!({ "remove": { "index": index, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": target, "alias": alias } }));

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| SearchError::reindex(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            return Err(SearchError::reindex(format!(
                "Alias swap failed with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn run_search(&self, body: Value) -> Result<Value, SearchError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .search(SearchParts::Index(&[alias]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            error!(status = %status, body = %body, "Search request failed");
            let message = format!("Search failed with status {}: {}", status, body);
            return Err(if status.is_server_error() {
                SearchError::connection(message)
            } else {
                SearchError::query(message)
            });
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    fn name(&self) -> &'static str {
        "opensearch"
    }

    /// Create the initial versioned index and alias if the alias is missing.
    async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .indices()
            .exists_alias(IndicesExistsAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(alias = %alias, "Search alias already exists");
            return Ok(());
        }

        let index_name = self
            .index_config
            .versioned_index_name(self.index_config.version);
        self.create_index(&index_name).await?;
        self.swap_alias(&index_name, &[])
            .await
            .map_err(|e| SearchError::index_creation(e.to_string()))?;

        info!(alias = %alias, index = %index_name, "Search alias created");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let body = self.run_search(query::build_search_body(query)).await?;
        let mut result = query::parse_search_response(&body, query)?;
        if result.took_ms == 0 {
            result.took_ms = started.elapsed().as_millis() as u64;
        }

        debug!(
            total_hits = result.total_hits,
            page = result.page,
            took_ms = result.took_ms,
            "OpenSearch query completed"
        );
        Ok(result)
    }

    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        let doc_id = document.id.to_string();
        let source =
            serde_json::to_value(document).map_err(|e| SearchError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.alias, &doc_id))
            .body(source)
            .send()
            .await
            .map_err(|e| SearchError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            error!(status = %status, body = %body, "Index request failed");
            return Err(SearchError::index(format!(
                "Index failed with status {}: {}",
                status, body
            )));
        }

        debug!(doc_id = %doc_id, "Document indexed");
        Ok(())
    }

    async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError> {
        let doc_id = id.to_string();

        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index_config.alias, &doc_id))
            .send()
            .await
            .map_err(|e| SearchError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let body = Self::failure_body(response).await;
            error!(status = %status, body = %body, "Delete request failed");
            return Err(SearchError::delete(format!(
                "Delete failed with status {}: {}",
                status, body
            )));
        }

        debug!(doc_id = %doc_id, "Document deleted");
        Ok(())
    }

    async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        let previous = self.aliased_indices().await?;
        let version = self.index_config.next_version(&previous);
        let target = self.index_config.versioned_index_name(version);

        if previous.contains(&target) {
            return Err(SearchError::reindex(format!(
                "Target index {} is already live",
                target
            )));
        }

        self.create_index(&target).await?;

        if let Err(e) = self.bulk_load(&target, documents).await {
            error!(index = %target, error = %e, "Rebuild failed, keeping previous index");
            self.delete_indices_quietly(&[target.as_str()]).await;
            return Err(e);
        }

        if let Err(e) = self.swap_alias(&target, &previous).await {
            self.delete_indices_quietly(&[target.as_str()]).await;
            return Err(e);
        }

        let stale: Vec<&str> = previous.iter().map(String::as_str).collect();
        self.delete_indices_quietly(&stale).await;

        info!(
            index = %target,
            documents = documents.len(),
            "Search alias moved to rebuilt index"
        );
        Ok(ReindexSummary::new(documents.len()).with_active_index(target))
    }

    async fn get_recommendations(
        &self,
        id: Uuid,
        limit: usize,
    ) -> Result<Vec<RecommendationResult>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body = query::build_more_like_this_body(&self.index_config.alias, id, limit);
        let response = self.run_search(body).await?;
        let mut results = query::parse_recommendations(&response)?;
        results.retain(|r| r.id != id);
        results.truncate(limit);
        Ok(results)
    }

    async fn is_healthy(&self) -> bool {
        match self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
        {
            Ok(response) if response.status_code().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => body["status"].as_str() != Some("red"),
                    Err(_) => false,
                }
            }
            Ok(response) => {
                warn!(status = %response.status_code(), "OpenSearch health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "OpenSearch health check failed");
                false
            }
        }
    }
}
