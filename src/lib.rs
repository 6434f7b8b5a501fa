//! # Book Enricher
//!
//! Backfills missing book metadata (page count, genres, description) in a
//! PostgreSQL `books` table from public catalogs.
//!
//! ## Architecture
//!
//! - [`models`]: Book rows, lookup results and pending updates
//! - [`sources`]: Catalog adapters behind the [`Source`] trait (Open Library, Google Books)
//! - [`store`]: Candidate selection and batched writes behind the [`BookStore`] trait
//! - [`pipeline`]: The sequential batch loop tying sources and store together
//! - [`utils`]: HTTP client with retry, ISBN normalization, genre mapping
//! - [`config`]: Layered configuration
//! - [`ui`]: Terminal progress

pub mod config;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{Enrichment, PendingUpdate};
pub use pipeline::{EnrichmentPipeline, RunSummary};
pub use sources::Source;
pub use store::BookStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
