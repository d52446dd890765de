pub mod index;

use async_trait::async_trait;
use rampup_core::{EvidenceSnippet, Result};

/// Filters applied to a retrieval call. Results are deterministic for
/// identical (query, filters) against an unchanged index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilters {
    pub category: Option<String>,
}

impl IndexFilters {
    pub fn category(name: &str) -> Self {
        Self {
            category: Some(name.to_string()),
        }
    }
}

/// The retrieval backend boundary. The orchestration core only ever calls
/// `retrieve`; a backend fault surfaces as `RetrievalUnavailable` and the
/// turn proceeds uncited.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &IndexFilters,
    ) -> Result<Vec<EvidenceSnippet>>;
}

pub use index::SqliteIndex;
