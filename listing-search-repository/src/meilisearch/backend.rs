//! Meilisearch backend implementation.
//!
//! Talks to the Meilisearch HTTP API with `reqwest`. Write operations are
//! asynchronous tasks on the server; every write waits for its task with a
//! bounded poll so failures surface to the caller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use listing_search_shared::{ListingDocument, SearchQuery, SearchResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MeilisearchSettings;
use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::meilisearch::query::{self, IndexedListing};
use crate::types::ReindexSummary;

/// Documents sent per request during a rebuild.
const DOCUMENT_CHUNK_SIZE: usize = 1000;

/// Upper bound on waiting for a single task.
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Meilisearch backend implementation.
///
/// A full rebuild loads a shadow index and swaps it with the live one
/// through `/swap-indexes`, so readers never see a partial corpus.
pub struct MeilisearchBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    index_uid: String,
    task_timeout: Duration,
}

impl MeilisearchBackend {
    /// Create a new backend for the given settings.
    pub fn new(settings: &MeilisearchSettings) -> Result<Self, SearchError> {
        let base_url = settings.url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| SearchError::config(e.to_string()))?;

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| SearchError::config(e.to_string()))?;

        info!(
            url = %base_url,
            index = %settings.index_uid,
            "Created Meilisearch backend"
        );

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            index_uid: settings.index_uid.clone(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        })
    }

    /// Override how long writes wait for their task.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Map a non-success response to an error. Server errors count as the
    /// backend being unavailable.
    async fn check(
        response: Response,
        on_error: fn(String) -> SearchError,
    ) -> Result<Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("Request failed with status {}: {}", status, body);
        if status.is_server_error() {
            Err(SearchError::connection(message))
        } else {
            Err(on_error(message))
        }
    }

    async fn enqueue(
        &self,
        request: RequestBuilder,
        on_error: fn(String) -> SearchError,
    ) -> Result<u64, SearchError> {
        let response = self.authorized(request).send().await?;
        let response = Self::check(response, on_error).await?;
        let info: TaskInfo = response.json().await?;
        Ok(info.task_uid)
    }

    /// Poll a task until it finishes or the timeout passes.
    async fn wait_for_task(
        &self,
        task_uid: u64,
        on_error: fn(String) -> SearchError,
    ) -> Result<(), SearchError> {
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let response = self
                .authorized(self.client.get(self.url(&format!("/tasks/{}", task_uid))))
                .send()
                .await?;
            let task: Task = Self::check(response, on_error).await?.json().await?;

            match task.status.as_str() {
                "succeeded" => return Ok(()),
                "failed" | "canceled" => {
                    let (message, code) = task
                        .error
                        .map(|e| (e.message, e.code.unwrap_or_default()))
                        .unwrap_or_else(|| (task.status.clone(), String::new()));
                    error!(task_uid, code = %code, message = %message, "Meilisearch task failed");
                    return Err(on_error(format!("Task {} {}: {}", task_uid, task.status, message)));
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(SearchError::timeout(format!(
                    "Task {} did not finish within {:?}",
                    task_uid, self.task_timeout
                )));
            }
            tokio::time::sleep(TASK_POLL_INTERVAL).await;
        }
    }

    async fn index_exists(&self, uid: &str) -> Result<bool, SearchError> {
        let response = self
            .authorized(self.client.get(self.url(&format!("/indexes/{}", uid))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response, SearchError::QueryError).await?;
        Ok(true)
    }

    async fn create_index(&self, uid: &str) -> Result<(), SearchError> {
        let request = self
            .client
            .post(self.url("/indexes"))
            .json(&json!({ "uid": uid, "primaryKey": "id" }));
        let task = self.enqueue(request, SearchError::IndexCreationError).await?;
        self.wait_for_task(task, SearchError::IndexCreationError).await?;

        let request = self
            .client
            .patch(self.url(&format!("/indexes/{}/settings", uid)))
            .json(&query::index_settings());
        let task = self.enqueue(request, SearchError::IndexCreationError).await?;
        self.wait_for_task(task, SearchError::IndexCreationError).await?;

        info!(index = %uid, "Created Meilisearch index");
        Ok(())
    }

    async fn delete_index(&self, uid: &str) -> Result<(), SearchError> {
        let response = self
            .authorized(self.client.delete(self.url(&format!("/indexes/{}", uid))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let response = Self::check(response, SearchError::DeleteError).await?;
        let info: TaskInfo = response.json().await?;
        self.wait_for_task(info.task_uid, SearchError::DeleteError).await
    }

    async fn add_documents(
        &self,
        uid: &str,
        documents: &[IndexedListing],
        on_error: fn(String) -> SearchError,
    ) -> Result<(), SearchError> {
        let request = self
            .client
            .post(self.url(&format!("/indexes/{}/documents?primaryKey=id", uid)))
            .json(documents);
        let task = self.enqueue(request, on_error).await?;
        self.wait_for_task(task, on_error).await
    }

    async fn load_shadow(
        &self,
        shadow: &str,
        documents: &[ListingDocument],
    ) -> Result<(), SearchError> {
        self.create_index(shadow).await?;
        for chunk in documents.chunks(DOCUMENT_CHUNK_SIZE) {
            let batch: Vec<IndexedListing> = chunk.iter().map(IndexedListing::from).collect();
            self.add_documents(shadow, &batch, SearchError::ReindexError).await?;
        }
        Ok(())
    }

    async fn swap_with(&self, shadow: &str) -> Result<(), SearchError> {
        let request = self
            .client
            .post(self.url("/swap-indexes"))
            .json(&json!([{ "indexes": [self.index_uid, shadow] }]));
        let task = self.enqueue(request, SearchError::ReindexError).await?;
        self.wait_for_task(task, SearchError::ReindexError).await
    }
}

#[async_trait]
impl SearchBackend for MeilisearchBackend {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        if self.index_exists(&self.index_uid).await? {
            let request = self
                .client
                .patch(self.url(&format!("/indexes/{}/settings", self.index_uid)))
                .json(&query::index_settings());
            let task = self.enqueue(request, SearchError::IndexCreationError).await?;
            self.wait_for_task(task, SearchError::IndexCreationError).await?;
            debug!(index = %self.index_uid, "Meilisearch index settings applied");
            return Ok(());
        }

        self.create_index(&self.index_uid).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let request = self
            .client
            .post(self.url(&format!("/indexes/{}/search", self.index_uid)))
            .json(&query::search_body(query));

        let response = self.authorized(request).send().await?;
        let response = Self::check(response, SearchError::QueryError).await?;
        let body: Value = response.json().await?;

        let mut result = query::parse_search_response(&body, query)?;
        if result.took_ms == 0 {
            result.took_ms = started.elapsed().as_millis() as u64;
        }

        debug!(
            total_hits = result.total_hits,
            page = result.page,
            took_ms = result.took_ms,
            "Meilisearch query completed"
        );
        Ok(result)
    }

    async fn index_resource(&self, document: &ListingDocument) -> Result<(), SearchError> {
        let batch = [IndexedListing::from(document)];
        self.add_documents(&self.index_uid, &batch, SearchError::IndexError)
            .await?;
        debug!(doc_id = %document.id, "Document indexed");
        Ok(())
    }

    async fn remove_resource(&self, id: Uuid) -> Result<(), SearchError> {
        let request = self
            .client
            .delete(self.url(&format!("/indexes/{}/documents/{}", self.index_uid, id)));
        let response = self.authorized(request).send().await?;

        // Missing index means there is nothing to delete.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let response = Self::check(response, SearchError::DeleteError).await?;
        let info: TaskInfo = response.json().await?;
        self.wait_for_task(info.task_uid, SearchError::DeleteError).await?;

        debug!(doc_id = %id, "Document deleted");
        Ok(())
    }

    async fn reindex_all(
        &self,
        documents: &[ListingDocument],
    ) -> Result<ReindexSummary, SearchError> {
        if !self.index_exists(&self.index_uid).await? {
            self.create_index(&self.index_uid).await?;
        }

        let shadow = format!("{}_rebuild_{}", self.index_uid, Utc::now().timestamp_millis());

        if let Err(e) = self.load_shadow(&shadow, documents).await {
            error!(shadow = %shadow, error = %e, "Rebuild failed, keeping live index");
            if let Err(cleanup) = self.delete_index(&shadow).await {
                warn!(shadow = %shadow, error = %cleanup, "Shadow index cleanup failed");
            }
            return Err(e);
        }

        if let Err(e) = self.swap_with(&shadow).await {
            if let Err(cleanup) = self.delete_index(&shadow).await {
                warn!(shadow = %shadow, error = %cleanup, "Shadow index cleanup failed");
            }
            return Err(e);
        }

        // After the swap the shadow uid holds the previous corpus.
        if let Err(e) = self.delete_index(&shadow).await {
            warn!(index = %shadow, error = %e, "Previous corpus cleanup failed");
        }

        info!(
            index = %self.index_uid,
            documents = documents.len(),
            "Meilisearch index swapped with rebuilt corpus"
        );
        Ok(ReindexSummary::new(documents.len()).with_active_index(self.index_uid.clone()))
    }

    async fn is_healthy(&self) -> bool {
        let request = self.client.get(self.url("/health"));
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => body["status"].as_str() == Some("available"),
                    Err(_) => false,
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "Meilisearch health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Meilisearch health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let settings = MeilisearchSettings {
            url: "http://localhost:7700/".to_string(),
            ..Default::default()
        };
        let backend = MeilisearchBackend::new(&settings).unwrap();
        assert_eq!(backend.url("/health"), "http://localhost:7700/health");
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let settings = MeilisearchSettings {
            url: "not a url".to_string(),
            ..Default::default()
        };
        let err = MeilisearchBackend::new(&settings).err().unwrap();
        assert!(matches!(err, SearchError::ConfigError(_)));
    }

    #[test]
    fn test_task_response_parsing() {
        let info: TaskInfo =
            serde_json::from_value(json!({ "taskUid": 12, "status": "enqueued" })).unwrap();
        assert_eq!(info.task_uid, 12);

        let task: Task = serde_json::from_value(json!({
            "status": "failed",
            "error": { "message": "index not found", "code": "index_not_found" }
        }))
        .unwrap();
        assert_eq!(task.status, "failed");
        assert_eq!(task.error.unwrap().code.as_deref(), Some("index_not_found"));
    }
}
