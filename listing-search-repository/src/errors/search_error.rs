//! Search error types.
//!
//! This module defines the unified error type for all search backend operations,
//! including both low-level backend errors and high-level application errors.

use thiserror::Error;

use crate::errors::CatalogError;

/// Unified errors from search backend operations.
///
/// Used by the `SearchBackend` trait and `SearchGateway` for every search and
/// indexing operation. Callers rely on two classifications:
///
/// - [`SearchError::is_unavailable`]: the backend could not be reached, so a
///   search should be routed to a fallback backend instead of being reported
///   as "no results".
/// - [`SearchError::is_retryable`]: an indexing operation failed for a reason
///   that may go away on retry; the listing must not be treated as published.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Validation error (e.g., page 0, inverted price range).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid configuration (e.g., unknown backend vendor).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failed to reach the search backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backend rejected or failed a search request.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Full-corpus rebuild failed; the previous corpus remains active.
    #[error("Reindex error: {0}")]
    ReindexError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse response from search backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a reindex error.
    pub fn reindex(msg: impl Into<String>) -> Self {
        Self::ReindexError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// The backend could not be reached or did not answer in time.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }

    /// The operation may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_)
                | Self::Timeout(_)
                | Self::IndexError(_)
                | Self::DeleteError(_)
                | Self::ReindexError(_)
                | Self::IndexCreationError(_)
        )
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::ConnectionError(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

impl From<sqlx::Error> for SearchError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => Self::Timeout(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                Self::ConnectionError(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::ParseError(err.to_string())
            }
            _ => Self::QueryError(err.to_string()),
        }
    }
}

impl From<CatalogError> for SearchError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DatabaseError(e) => Self::from(e),
            CatalogError::InvalidRow(msg) => Self::ParseError(msg),
            CatalogError::Unavailable(msg) => Self::ConnectionError(msg),
        }
    }
}
