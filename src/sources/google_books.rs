//! Google Books source implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::models::Enrichment;
use crate::sources::{Source, SourceError};
use crate::utils::{normalize_genres, HttpClient};

pub const GOOGLE_BOOKS_API_BASE: &str = "https://www.googleapis.com/books/v1";

/// Google Books source
///
/// Uses the volumes search endpoint with an `isbn:` query and reads only the
/// first hit. The API key is optional; without one the public quota applies.
#[derive(Debug, Clone)]
pub struct GoogleBooksSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksSource {
    /// Point the source at a different host (mirrors, tests)
    pub fn with_base_url(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn search_url(&self, isbn13: &str) -> String {
        let mut url = format!(
            "{}/volumes?q=isbn:{}",
            self.base_url,
            urlencoding::encode(isbn13)
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

#[async_trait]
impl Source for GoogleBooksSource {
    fn id(&self) -> &str {
        "google_books"
    }

    fn name(&self) -> &str {
        "Google Books"
    }

    async fn lookup(&self, isbn13: &str) -> Result<Enrichment, SourceError> {
        let body = self.client.get_json(&self.search_url(isbn13)).await?;

        let Some(info) = first_volume_info(&body) else {
            return Ok(Enrichment::default());
        };

        let page_count = info.get("pageCount").and_then(Value::as_i64);

        // Non-string categories are skipped, not fatal
        let categories = info
            .get("categories")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let genres = normalize_genres(categories.iter().map(Value::as_str));

        let description = info
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Enrichment::new(page_count, genres, description))
    }
}

/// `volumeInfo` of the first search hit, read field by field so that odd
/// shapes elsewhere in the response do not hide it
fn first_volume_info(body: &Value) -> Option<&Value> {
    let item = body.get("items")?.as_array()?.first()?;
    item.get("volumeInfo").filter(|info| info.is_object())
}
