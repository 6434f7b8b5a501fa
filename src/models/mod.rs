//! Core data models for book records and enrichment results.

mod book;

pub use book::{
    is_meaningful_description, BookRecord, Enrichment, LookupOutcome, PendingUpdate,
    MIN_DESCRIPTION_CHARS,
};
