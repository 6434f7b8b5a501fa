//! Utility modules supporting the enrichment job.
//!
//! - [`normalize_isbn13`]: Validate an ISBN and convert ISBN-10 to ISBN-13
//! - [`normalize_genres`]: Map free-text subjects onto the controlled genre list
//! - [`HttpClient`]: HTTP client that fetches JSON with retry and response classification
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//!
//! # ISBN normalization
//!
//! ```rust
//! use book_enricher::utils::normalize_isbn13;
//!
//! assert_eq!(normalize_isbn13("0-306-40615-2").as_deref(), Some("9780306406157"));
//! assert_eq!(normalize_isbn13("not an isbn"), None);
//! ```
//!
//! # Genre normalization
//!
//! ```rust
//! use book_enricher::utils::normalize_genres;
//!
//! let genres = normalize_genres([Some("Fantasy fiction"), None]);
//! assert_eq!(genres, vec!["Fantasy", "Fiction"]);
//! ```
//!
//! # Fetching JSON
//!
//! ```rust,no_run
//! use book_enricher::utils::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let edition = client.get_json("https://openlibrary.org/isbn/9780306406157.json").await?;
//! println!("{}", edition["title"]);
//! # Ok(())
//! # }
//! ```

mod genres;
mod http;
mod isbn;
mod retry;

pub use genres::{normalize_genres, GENRE_MAP};
pub use http::{empty_object, HttpClient};
pub use isbn::{isbn13_check_digit, normalize_isbn13};
pub use retry::{with_retry, RetryConfig, TransientError};
