//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::Enrichment;
use crate::sources::{Source, SourceError};

#[derive(Debug, Clone)]
enum MockResponse {
    Data(Enrichment),
    Fail(String),
}

/// A mock source for testing that returns predefined responses per ISBN.
///
/// Unknown ISBNs yield an empty enrichment. Every lookup is recorded.
#[derive(Debug, Default)]
pub struct MockSource {
    id: String,
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the enrichment returned for an ISBN.
    pub fn set_response(&self, isbn13: &str, enrichment: Enrichment) {
        let mut guard = self.responses.lock().unwrap();
        guard.insert(isbn13.to_string(), MockResponse::Data(enrichment));
    }

    /// Make lookups for an ISBN fail as if retries were exhausted.
    pub fn set_failure(&self, isbn13: &str, message: &str) {
        let mut guard = self.responses.lock().unwrap();
        guard.insert(isbn13.to_string(), MockResponse::Fail(message.to_string()));
    }

    /// ISBNs looked up so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn lookup(&self, isbn13: &str) -> Result<Enrichment, SourceError> {
        self.calls.lock().unwrap().push(isbn13.to_string());

        let guard = self.responses.lock().unwrap();
        match guard.get(isbn13) {
            Some(MockResponse::Data(enrichment)) => Ok(enrichment.clone()),
            Some(MockResponse::Fail(message)) => Err(SourceError::Network(message.clone())),
            None => Ok(Enrichment::default()),
        }
    }
}
