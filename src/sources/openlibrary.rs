//! Open Library source implementation.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::models::Enrichment;
use crate::sources::{Source, SourceError, TextValue};
use crate::utils::{normalize_genres, HttpClient};

pub const OPEN_LIBRARY_API_BASE: &str = "https://openlibrary.org";

/// Open Library catalog source
///
/// Fetches the edition record for an ISBN. When the edition lacks subjects or
/// a description, the first linked work record is consulted for whichever of
/// the two is still missing.
#[derive(Debug, Clone)]
pub struct OpenLibrarySource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl OpenLibrarySource {
    /// Point the source at a different host (mirrors, tests)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_work(&self, key: &str) -> Result<OLWork, SourceError> {
        let url = format!("{}{}.json", self.base_url, key);
        let body = self.client.get_json(&url).await?;
        Ok(parse_or_default(body, key))
    }
}

#[async_trait]
impl Source for OpenLibrarySource {
    fn id(&self) -> &str {
        "openlibrary"
    }

    fn name(&self) -> &str {
        "Open Library"
    }

    async fn lookup(&self, isbn13: &str) -> Result<Enrichment, SourceError> {
        let url = format!(
            "{}/isbn/{}.json",
            self.base_url,
            urlencoding::encode(isbn13)
        );
        let body = self.client.get_json(&url).await?;
        let edition: OLEdition = parse_or_default(body, isbn13);

        let page_count = edition.page_count();

        let work_key = edition.work_key();

        let mut subjects: Vec<String> = subject_list(edition.subjects)
            .into_iter()
            .filter_map(OLSubject::into_label)
            .filter(|s| !s.is_empty())
            .collect();

        let mut description = edition
            .description
            .and_then(TextValue::into_text)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if description.is_none() || subjects.is_empty() {
            if let Some(key) = work_key {
                match self.fetch_work(&key).await {
                    Ok(work) => {
                        if description.is_none() {
                            description = work
                                .description
                                .and_then(TextValue::into_text)
                                .map(|d| d.trim().to_string())
                                .filter(|d| !d.is_empty());
                        }
                        if subjects.is_empty() {
                            subjects = subject_list(work.subjects)
                                .into_iter()
                                .filter_map(|s| match s {
                                    OLSubject::Label(label) => Some(label),
                                    _ => None,
                                })
                                .collect();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(isbn = isbn13, work = %key, error = %e, "Open Library work lookup failed");
                    }
                }
            }
        }

        let genres = normalize_genres(subjects.iter().map(Some));
        Ok(Enrichment::new(page_count, genres, description))
    }
}

/// Deserialize a response body, falling back to an empty record on shape mismatch
fn parse_or_default<T>(body: Value, context: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    serde_json::from_value(body).unwrap_or_else(|e| {
        tracing::debug!(context, error = %e, "Unexpected Open Library record shape");
        T::default()
    })
}

/// Entries of a `subjects` array; anything that is not an array yields none
fn subject_list(value: Option<Value>) -> Vec<OLSubject> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// First run of digits in a free-text pagination string ("xii, 320 p.")
fn first_integer(text: &str) -> Option<i64> {
    static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"(\d+)").ok()).as_ref()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

// ===== Open Library API Types =====

#[derive(Debug, Default, Deserialize)]
struct OLEdition {
    #[serde(default)]
    number_of_pages: Option<Value>,
    #[serde(default)]
    pagination: Option<Value>,
    #[serde(default)]
    subjects: Option<Value>,
    #[serde(default)]
    description: Option<TextValue>,
    #[serde(default)]
    works: Option<Value>,
}

impl OLEdition {
    /// Key of the first linked work, when it is an object with a string key
    fn work_key(&self) -> Option<String> {
        let first = self.works.as_ref()?.as_array()?.first()?;
        first.get("key")?.as_str().map(str::to_string)
    }

    fn page_count(&self) -> Option<i64> {
        let direct = self
            .number_of_pages
            .as_ref()
            .and_then(Value::as_i64)
            .filter(|p| *p > 0);

        direct.or_else(|| {
            self.pagination
                .as_ref()
                .and_then(Value::as_str)
                .and_then(first_integer)
                .filter(|p| *p > 0)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct OLWork {
    #[serde(default)]
    subjects: Option<Value>,
    #[serde(default)]
    description: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OLSubject {
    Label(String),
    Named { name: Option<String> },
    Other(Value),
}

impl OLSubject {
    fn into_label(self) -> Option<String> {
        match self {
            OLSubject::Label(label) => Some(label),
            OLSubject::Named { name } => name,
            OLSubject::Other(_) => None,
        }
    }
}
