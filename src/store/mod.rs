//! Persistence for book records.
//!
//! The pipeline talks to storage only through the [`BookStore`] trait:
//! candidate selection, batched coalescing updates, and a small activity
//! report. [`PgBookStore`] is the production implementation;
//! [`MemoryBookStore`] mirrors its semantics for tests and dry runs.

mod memory;
mod postgres;

pub use memory::MemoryBookStore;
pub use postgres::PgBookStore;

use async_trait::async_trait;

use crate::models::PendingUpdate;

/// Counts of rows touched within a recent time window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityStats {
    /// Rows whose `enriched_at` falls inside the window
    pub changed: i64,
    /// Rows whose `last_attempt_at` falls inside the window
    pub attempted: i64,
}

/// Storage operations needed by the enrichment pipeline
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Make sure bookkeeping columns and indexes exist (idempotent)
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Select up to `limit` ISBNs of rows that miss at least one field and
    /// were not attempted within `cooldown`.
    ///
    /// Never-attempted rows come first, then the oldest attempts; ties are
    /// broken by insertion order.
    async fn fetch_candidates(
        &self,
        limit: usize,
        cooldown: chrono::Duration,
    ) -> Result<Vec<String>, StoreError>;

    /// Apply all updates in one transaction.
    ///
    /// Each update coalesces its values into the row, refreshes
    /// `enriched_at` when a value changed, and always bumps
    /// `last_attempt_at` and `attempt_count`. Any failure rolls back the
    /// whole batch. Returns the number of rows touched.
    async fn apply_updates(&self, updates: &[PendingUpdate]) -> Result<u64, StoreError>;

    /// Report how many rows were enriched/attempted within `window`
    async fn recent_activity(&self, window: chrono::Duration) -> Result<ActivityStats, StoreError>;
}

/// Errors raised by a [`BookStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database driver error (connectivity, constraint violation, ...)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An update was rejected; the batch was rolled back
    #[error("Update rejected for {isbn13}: {reason}")]
    Rejected { isbn13: String, reason: String },
}
