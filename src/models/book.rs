//! Book record and enrichment result models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Descriptions shorter than this (in characters) are treated as missing.
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Returns true when a description is long enough to be worth storing
pub fn is_meaningful_description(description: &str) -> bool {
    description.chars().count() >= MIN_DESCRIPTION_CHARS
}

/// A row of the `books` table, as far as enrichment is concerned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Insertion-ordered surrogate key
    pub id: i64,

    /// Stored ISBN (normally ISBN-13, but legacy rows may hold other forms)
    pub isbn13: String,

    pub page_count: Option<i32>,

    /// Genres from the controlled vocabulary (`None` = column unset)
    pub genres: Option<Vec<String>>,

    pub description: Option<String>,

    /// Set only when an attempt changed at least one field
    pub enriched_at: Option<DateTime<Utc>>,

    /// Set on every attempt
    pub last_attempt_at: Option<DateTime<Utc>>,

    pub attempt_count: i32,
}

impl BookRecord {
    /// Create a record with no metadata and no attempt history
    pub fn new(id: i64, isbn13: impl Into<String>) -> Self {
        Self {
            id,
            isbn13: isbn13.into(),
            page_count: None,
            genres: None,
            description: None,
            enriched_at: None,
            last_attempt_at: None,
            attempt_count: 0,
        }
    }

    /// Whether at least one target field is missing or unusable
    pub fn needs_enrichment(&self) -> bool {
        let pages_missing = self.page_count.map_or(true, |p| p <= 0);
        let genres_missing = self.genres.as_ref().map_or(true, |g| g.is_empty());
        let description_missing = self
            .description
            .as_deref()
            .map_or(true, |d| !is_meaningful_description(d));

        pages_missing || genres_missing || description_missing
    }

    /// Whether the cooldown since the last attempt has elapsed at `now`
    pub fn cooled_down(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(last) => last < now - cooldown,
        }
    }
}

/// Metadata discovered for one ISBN by a single source or by merging sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Positive page count, if known
    pub page_count: Option<i32>,

    /// Sorted canonical genres
    pub genres: Vec<String>,

    pub description: Option<String>,
}

impl Enrichment {
    /// Build an enrichment, dropping non-positive page counts and blank descriptions
    pub fn new(page_count: Option<i64>, genres: Vec<String>, description: Option<String>) -> Self {
        Self {
            page_count: page_count
                .filter(|p| *p > 0)
                .and_then(|p| i32::try_from(p).ok()),
            genres,
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }

    /// Whether the description is present and long enough
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(is_meaningful_description)
    }

    /// True when every target field has a usable value
    pub fn is_complete(&self) -> bool {
        self.page_count.is_some() && !self.genres.is_empty() && self.has_description()
    }

    /// True when nothing usable was discovered
    pub fn is_empty(&self) -> bool {
        self.page_count.is_none() && self.genres.is_empty() && !self.has_description()
    }

    /// Combine a primary result with a fallback one.
    ///
    /// - page count: the first positive value, primary first
    /// - genres: primary's if non-empty, else fallback's
    /// - description: primary's if long enough, else fallback's
    pub fn merge(primary: Enrichment, fallback: Enrichment) -> Enrichment {
        let has_primary_description = primary.has_description();

        Enrichment {
            page_count: primary.page_count.or(fallback.page_count),
            genres: if primary.genres.is_empty() {
                fallback.genres
            } else {
                primary.genres
            },
            description: if has_primary_description {
                primary.description
            } else {
                fallback.description
            },
        }
    }
}

/// Result of asking one source about one ISBN
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The source returned at least one usable field
    Found(Enrichment),
    /// The source answered but knew nothing useful
    Empty,
    /// The lookup failed (retries exhausted or similar)
    Failed(String),
}

impl LookupOutcome {
    /// Classify a source result
    pub fn from_result<E: std::fmt::Display>(result: Result<Enrichment, E>) -> Self {
        match result {
            Ok(enrichment) if enrichment.is_empty() => LookupOutcome::Empty,
            Ok(enrichment) => LookupOutcome::Found(enrichment),
            Err(e) => LookupOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, LookupOutcome::Found(e) if e.is_complete())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LookupOutcome::Failed(_))
    }

    /// The discovered data, or an empty enrichment
    pub fn into_enrichment(self) -> Enrichment {
        match self {
            LookupOutcome::Found(enrichment) => enrichment,
            LookupOutcome::Empty | LookupOutcome::Failed(_) => Enrichment::default(),
        }
    }
}

/// A queued write for one candidate row.
///
/// `None`/empty fields leave the stored value untouched; the attempt
/// bookkeeping (`last_attempt_at`, `attempt_count`) always advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Key of the row as stored
    pub isbn13: String,
    pub page_count: Option<i32>,
    pub genres: Vec<String>,
    pub description: Option<String>,
}

impl PendingUpdate {
    /// An update that only records the attempt
    pub fn attempt_only(isbn13: impl Into<String>) -> Self {
        Self {
            isbn13: isbn13.into(),
            page_count: None,
            genres: Vec::new(),
            description: None,
        }
    }

    /// An update carrying whatever usable values the enrichment holds
    pub fn from_enrichment(isbn13: impl Into<String>, enrichment: Enrichment) -> Self {
        Self {
            isbn13: isbn13.into(),
            page_count: enrichment.page_count.filter(|p| *p > 0),
            genres: enrichment.genres,
            description: enrichment
                .description
                .filter(|d| is_meaningful_description(d)),
        }
    }

    /// Whether this update writes any field
    pub fn has_values(&self) -> bool {
        self.page_count.is_some() || !self.genres.is_empty() || self.description.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_prefers_fallback_genres_when_primary_empty() {
        let primary = Enrichment::new(Some(320), vec![], Some("A short story about...".into()));
        let fallback = Enrichment::new(None, genres(&["Fiction"]), None);

        let merged = Enrichment::merge(primary, fallback);
        assert_eq!(merged.genres, genres(&["Fiction"]));
        assert_eq!(merged.page_count, Some(320));
    }

    #[test]
    fn test_merge_rejects_short_primary_description() {
        let long = "x".repeat(50);
        let primary = Enrichment::new(None, vec![], Some("short".into()));
        let fallback = Enrichment::new(None, vec![], Some(long.clone()));

        let merged = Enrichment::merge(primary, fallback);
        assert_eq!(merged.description, Some(long));
    }

    #[test]
    fn test_merge_keeps_primary_values() {
        let primary = Enrichment::new(
            Some(100),
            genres(&["Fantasy"]),
            Some("A long enough description".into()),
        );
        let fallback = Enrichment::new(
            Some(200),
            genres(&["Horror"]),
            Some("Another long description".into()),
        );

        let merged = Enrichment::merge(primary.clone(), fallback);
        assert_eq!(merged, primary);
    }

    #[test]
    fn test_new_drops_non_positive_page_counts() {
        assert_eq!(Enrichment::new(Some(0), vec![], None).page_count, None);
        assert_eq!(Enrichment::new(Some(-5), vec![], None).page_count, None);
        assert_eq!(Enrichment::new(Some(i64::MAX), vec![], None).page_count, None);
        assert_eq!(Enrichment::new(Some(12), vec![], None).page_count, Some(12));
    }

    #[test]
    fn test_lookup_outcome_classification() {
        let ok: Result<Enrichment, String> = Ok(Enrichment::new(Some(10), vec![], None));
        assert!(matches!(LookupOutcome::from_result(ok), LookupOutcome::Found(_)));

        let empty: Result<Enrichment, String> = Ok(Enrichment::default());
        assert_eq!(LookupOutcome::from_result(empty), LookupOutcome::Empty);

        let failed: Result<Enrichment, String> = Err("boom".into());
        let outcome = LookupOutcome::from_result(failed);
        assert!(outcome.is_failed());
        assert_eq!(outcome.into_enrichment(), Enrichment::default());
    }

    #[test]
    fn test_pending_update_drops_short_description() {
        let update = PendingUpdate::from_enrichment(
            "9780000000002",
            Enrichment::new(None, vec![], Some("tiny".into())),
        );
        assert_eq!(update.description, None);
        assert!(!update.has_values());
    }

    #[test]
    fn test_needs_enrichment() {
        let mut book = BookRecord::new(1, "9780000000002");
        assert!(book.needs_enrichment());

        book.page_count = Some(100);
        book.genres = Some(genres(&["Fiction"]));
        book.description = Some("Long enough text here".into());
        assert!(!book.needs_enrichment());

        book.genres = Some(vec![]);
        assert!(book.needs_enrichment());
    }

    #[test]
    fn test_cooled_down() {
        let now = Utc::now();
        let mut book = BookRecord::new(1, "9780000000002");
        assert!(book.cooled_down(now, Duration::minutes(60)));

        book.last_attempt_at = Some(now - Duration::minutes(5));
        assert!(!book.cooled_down(now, Duration::minutes(60)));

        book.last_attempt_at = Some(now - Duration::minutes(61));
        assert!(book.cooled_down(now, Duration::minutes(60)));
    }
}
