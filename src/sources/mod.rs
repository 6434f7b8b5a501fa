//! Bibliographic source adapters.
//!
//! This module defines the [`Source`] trait that every catalog adapter
//! implements. A source takes an ISBN-13 and returns whatever page count,
//! genres and description it can find as an [`Enrichment`].
//!
//! Two sources ship with the crate:
//!
//! - [`OpenLibrarySource`] - edition lookup by ISBN, with a fallback to the
//!   linked work record for subjects and description
//! - [`GoogleBooksSource`] - volume search by ISBN, first hit only
//!
//! Both share one [`HttpClient`](crate::utils::HttpClient), which owns the
//! retry policy. A source returns `Err` only when a request kept failing
//! transiently; "not found" and undecodable answers come back as an empty
//! [`Enrichment`].

mod google_books;
mod openlibrary;

pub mod mock;

pub use google_books::{GoogleBooksSource, GOOGLE_BOOKS_API_BASE};
pub use mock::MockSource;
pub use openlibrary::{OpenLibrarySource, OPEN_LIBRARY_API_BASE};

use crate::models::Enrichment;
use async_trait::async_trait;

/// The Source trait defines the interface for all catalog adapters.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "openlibrary")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Look up metadata for a normalized ISBN-13
    async fn lookup(&self, isbn13: &str) -> Result<Enrichment, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection, TLS or proxy failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Server-side failure (HTTP 5xx)
    #[error("Server error: HTTP {0}")]
    Server(u16),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return SourceError::Timeout(err.to_string());
        }
        if err.is_builder() {
            return SourceError::InvalidRequest(err.to_string());
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return SourceError::RateLimit;
            }
            if status.is_server_error() {
                return SourceError::Server(status.as_u16());
            }
        }
        if err.is_decode() {
            return SourceError::Parse(err.to_string());
        }
        if err.is_redirect() {
            return SourceError::Other(err.to_string());
        }

        // Connect, request and body-read failures
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Loosely typed text field: either a plain string or `{"value": "..."}`
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub(crate) enum TextValue {
    Plain(String),
    Typed { value: String },
    Other(serde_json::Value),
}

impl TextValue {
    pub(crate) fn into_text(self) -> Option<String> {
        match self {
            TextValue::Plain(s) | TextValue::Typed { value: s } => Some(s),
            TextValue::Other(_) => None,
        }
    }
}
