//! The batch enrichment pipeline.
//!
//! One run repeatedly selects a batch of candidate rows, looks each ISBN up in
//! the primary source (and in the fallback source when the primary left a
//! field incomplete), merges the answers, and writes the whole batch back in
//! one transaction. Work is strictly sequential: one request in flight, with a
//! courtesy pause after each candidate.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, EnrichmentConfig};
use crate::models::{Enrichment, LookupOutcome, PendingUpdate};
use crate::sources::{GoogleBooksSource, OpenLibrarySource, Source, SourceError};
use crate::store::{BookStore, StoreError};
use crate::ui::BatchProgress;
use crate::utils::{normalize_isbn13, HttpClient};

/// Window used for the post-commit activity report
const ACTIVITY_WINDOW_MINUTES: i64 = 5;

/// Knobs that shape a run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    /// Stop after this many candidates (`None` = until no candidates remain)
    pub max_books: Option<usize>,
    /// Pause after each candidate's lookups
    pub request_delay: Duration,
    /// Minimum time between attempts on the same row
    pub cooldown: chrono::Duration,
    pub show_progress: bool,
}

impl From<&EnrichmentConfig> for PipelineOptions {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_books: config.max_books(),
            request_delay: config.request_delay(),
            cooldown: config.cooldown(),
            show_progress: false,
        }
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Batches committed
    pub batches: usize,
    /// Candidates processed (including invalid ISBNs)
    pub processed: usize,
    /// Candidates for which at least one field value was written
    pub updated: usize,
    /// Candidates whose stored ISBN could not be normalized
    pub invalid_isbns: usize,
    /// Source lookups that failed after retries
    pub lookup_failures: usize,
}

/// What the sources said about one ISBN
#[derive(Debug, Clone, PartialEq)]
pub struct LookupReport {
    pub isbn13: String,
    pub primary: LookupOutcome,
    /// `None` when the primary answer was already complete
    pub fallback: Option<LookupOutcome>,
    pub merged: Enrichment,
}

impl LookupReport {
    fn failures(&self) -> usize {
        usize::from(self.primary.is_failed())
            + usize::from(self.fallback.as_ref().is_some_and(LookupOutcome::is_failed))
    }
}

/// Errors that end a run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to set up sources: {0}")]
    Setup(#[from] SourceError),
}

/// Sequential enrichment over a [`BookStore`]
pub struct EnrichmentPipeline<S: BookStore> {
    store: S,
    primary: Arc<dyn Source>,
    fallback: Arc<dyn Source>,
    options: PipelineOptions,
}

impl<S: BookStore> EnrichmentPipeline<S> {
    pub fn new(
        store: S,
        primary: Arc<dyn Source>,
        fallback: Arc<dyn Source>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            primary,
            fallback,
            options,
        }
    }

    /// Wire Open Library (primary) and Google Books (fallback) from configuration
    pub fn from_config(store: S, config: &Config) -> Result<Self, PipelineError> {
        let client = Arc::new(HttpClient::from_config(&config.http)?);

        let primary = Arc::new(OpenLibrarySource::with_base_url(
            Arc::clone(&client),
            config.http.open_library_url.clone(),
        ));
        let fallback = Arc::new(GoogleBooksSource::with_base_url(
            client,
            config.http.google_books_url.clone(),
            config.api_keys.google_books.clone(),
        ));

        Ok(Self::new(
            store,
            primary,
            fallback,
            PipelineOptions::from(&config.enrichment),
        ))
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.options.show_progress = show_progress;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run batches until no candidates remain or the cap is reached.
    ///
    /// A store failure aborts the run; the batch being written is rolled
    /// back, earlier batches stay committed.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.store.ensure_schema().await?;

        let mut summary = RunSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!(
            batch_size = self.options.batch_size,
            max_books = ?self.options.max_books,
            cooldown_minutes = self.options.cooldown.num_minutes(),
            "Starting enrichment run"
        );

        loop {
            let need = match self.options.max_books {
                Some(cap) => self
                    .options
                    .batch_size
                    .min(cap.saturating_sub(summary.processed)),
                None => self.options.batch_size,
            };
            if need == 0 {
                break;
            }

            let candidates = self
                .store
                .fetch_candidates(need, self.options.cooldown)
                .await?;

            // A run never revisits a row, even with a zero cooldown
            let candidates: Vec<String> = candidates
                .into_iter()
                .filter(|isbn| seen.insert(isbn.clone()))
                .collect();

            if candidates.is_empty() {
                tracing::info!("No more eligible candidates right now");
                break;
            }

            let batch = summary.batches + 1;
            let updates = self.process_batch(batch, &candidates, &mut summary).await;

            let with_values = updates.iter().filter(|u| u.has_values()).count();
            let touched = self.store.apply_updates(&updates).await?;
            summary.batches = batch;
            summary.updated += with_values;
            summary.processed += candidates.len();

            tracing::info!(
                batch,
                candidates = candidates.len(),
                with_values,
                rows_touched = touched,
                "Committed batch"
            );

            let window = chrono::Duration::minutes(ACTIVITY_WINDOW_MINUTES);
            match self.store.recent_activity(window).await {
                Ok(stats) => tracing::info!(
                    changed = stats.changed,
                    attempted = stats.attempted,
                    "Rows touched in the last {} minutes",
                    ACTIVITY_WINDOW_MINUTES
                ),
                Err(e) => tracing::warn!(error = %e, "Could not read recent activity"),
            }
        }

        tracing::info!(
            batches = summary.batches,
            processed = summary.processed,
            updated = summary.updated,
            invalid_isbns = summary.invalid_isbns,
            lookup_failures = summary.lookup_failures,
            "Enrichment run finished"
        );

        Ok(summary)
    }

    /// Look up and merge metadata for one raw ISBN without touching the store.
    ///
    /// Returns `None` when the ISBN cannot be normalized.
    pub async fn lookup(&self, raw_isbn: &str) -> Option<LookupReport> {
        let isbn13 = normalize_isbn13(raw_isbn)?;
        Some(self.enrich_one(&isbn13).await)
    }

    async fn process_batch(
        &self,
        batch: usize,
        candidates: &[String],
        summary: &mut RunSummary,
    ) -> Vec<PendingUpdate> {
        let progress = BatchProgress::for_batch(batch, candidates.len(), self.options.show_progress);
        let mut updates = Vec::with_capacity(candidates.len());

        for stored in candidates {
            progress.set_current(stored);

            let Some(isbn13) = normalize_isbn13(stored) else {
                tracing::debug!(isbn = %stored, "Skipping invalid ISBN");
                summary.invalid_isbns += 1;
                updates.push(PendingUpdate::attempt_only(stored.as_str()));
                progress.inc();
                continue;
            };

            let report = self.enrich_one(&isbn13).await;
            summary.lookup_failures += report.failures();

            tracing::debug!(
                isbn = %isbn13,
                page_count = ?report.merged.page_count,
                genres = report.merged.genres.len(),
                has_description = report.merged.has_description(),
                "Merged lookup"
            );

            // Keyed by the stored value so legacy ISBN-10 rows are updated too
            updates.push(PendingUpdate::from_enrichment(stored.as_str(), report.merged));

            if !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }
            progress.inc();
        }

        progress.finish();
        updates
    }

    async fn enrich_one(&self, isbn13: &str) -> LookupReport {
        let primary = self.query(self.primary.as_ref(), isbn13).await;

        let fallback = if primary.is_complete() {
            None
        } else {
            Some(self.query(self.fallback.as_ref(), isbn13).await)
        };

        let merged = Enrichment::merge(
            primary.clone().into_enrichment(),
            fallback
                .clone()
                .map(LookupOutcome::into_enrichment)
                .unwrap_or_default(),
        );

        LookupReport {
            isbn13: isbn13.to_string(),
            primary,
            fallback,
            merged,
        }
    }

    async fn query(&self, source: &dyn Source, isbn13: &str) -> LookupOutcome {
        let outcome = LookupOutcome::from_result(source.lookup(isbn13).await);
        if let LookupOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                isbn = %isbn13,
                source = source.id(),
                reason = %reason,
                "Lookup failed, treating as no data"
            );
        }
        outcome
    }
}
