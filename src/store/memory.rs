//! In-memory implementation of [`BookStore`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Mutex;

use super::{ActivityStats, BookStore, StoreError};
use crate::models::{BookRecord, PendingUpdate};

/// A `books` table held in memory, with the same selection and update rules
/// as the PostgreSQL store.
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    rows: Mutex<Vec<BookRecord>>,
    rejected: Mutex<HashSet<String>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with rows
    pub fn with_rows(rows: Vec<BookRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Insert a row with the next id and no metadata
    pub fn insert(&self, isbn13: &str) -> i64 {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        rows.push(BookRecord::new(id, isbn13));
        id
    }

    /// Insert a fully specified row
    pub fn insert_record(&self, record: BookRecord) {
        self.rows.lock().unwrap().push(record);
    }

    /// Look up a row by stored ISBN
    pub fn get(&self, isbn13: &str) -> Option<BookRecord> {
        let rows = self.rows.lock().unwrap();
        rows.iter().find(|r| r.isbn13 == isbn13).cloned()
    }

    /// Snapshot of all rows
    pub fn rows(&self) -> Vec<BookRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Make any batch containing an update for `isbn13` fail, as a
    /// constraint violation would.
    pub fn reject_updates_for(&self, isbn13: &str) {
        self.rejected.lock().unwrap().insert(isbn13.to_string());
    }
}

fn apply_one(row: &mut BookRecord, update: &PendingUpdate, now: chrono::DateTime<Utc>) {
    let mut changed = false;

    if let Some(pages) = update.page_count {
        changed |= row.page_count != Some(pages);
        row.page_count = Some(pages);
    }
    if !update.genres.is_empty() {
        changed |= row.genres.as_ref() != Some(&update.genres);
        row.genres = Some(update.genres.clone());
    }
    if let Some(description) = &update.description {
        changed |= row.description.as_ref() != Some(description);
        row.description = Some(description.clone());
    }

    if changed {
        row.enriched_at = Some(now);
    }
    row.last_attempt_at = Some(now);
    row.attempt_count += 1;
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn fetch_candidates(
        &self,
        limit: usize,
        cooldown: chrono::Duration,
    ) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        let rows = self.rows.lock().unwrap();

        let mut candidates: Vec<&BookRecord> = rows
            .iter()
            .filter(|r| !r.isbn13.is_empty())
            .filter(|r| r.needs_enrichment() && r.cooled_down(now, cooldown))
            .collect();

        // NULLS FIRST, then oldest attempt, then insertion order
        candidates.sort_by_key(|r| (r.last_attempt_at.is_some(), r.last_attempt_at, r.id));

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|r| r.isbn13.clone())
            .collect())
    }

    async fn apply_updates(&self, updates: &[PendingUpdate]) -> Result<u64, StoreError> {
        {
            let rejected = self.rejected.lock().unwrap();
            if let Some(update) = updates.iter().find(|u| rejected.contains(&u.isbn13)) {
                return Err(StoreError::Rejected {
                    isbn13: update.isbn13.clone(),
                    reason: "constraint violation".to_string(),
                });
            }
        }

        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let mut touched = 0;

        for update in updates {
            for row in rows.iter_mut().filter(|r| r.isbn13 == update.isbn13) {
                apply_one(row, update, now);
                touched += 1;
            }
        }

        Ok(touched)
    }

    async fn recent_activity(&self, window: chrono::Duration) -> Result<ActivityStats, StoreError> {
        let since = Utc::now() - window;
        let rows = self.rows.lock().unwrap();

        let changed = rows
            .iter()
            .filter(|r| r.enriched_at.is_some_and(|t| t > since))
            .count();
        let attempted = rows
            .iter()
            .filter(|r| r.last_attempt_at.is_some_and(|t| t > since))
            .count();

        Ok(ActivityStats {
            changed: changed as i64,
            attempted: attempted as i64,
        })
    }
}
