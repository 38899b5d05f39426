//! Knowledge-base lookup rendered as plain text for the model.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::RagError;
use crate::store::VectorStore;
use crate::types::{Document, MetadataFilter};

pub const DEFAULT_LIMIT: usize = 5;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Tool input declares `limit` as a JSON number, so `5.0` must work.
fn number_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let limit = f64::deserialize(deserializer)?;
    Ok(limit.max(1.0) as usize)
}

/// Arguments of a knowledge lookup. Deserialises directly from the tool
/// call input (`{"query", "category", "fileType", "limit"}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalQuery {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    /// At least 1.
    #[serde(default = "default_limit", deserialize_with = "number_limit")]
    pub limit: usize,
}

impl RetrievalQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            file_type: None,
            limit: DEFAULT_LIMIT,
        }
    }

    fn filter(&self) -> MetadataFilter {
        MetadataFilter {
            user_id: None,
            category: self.category.clone().filter(|c| !c.is_empty()),
            file_type: self.file_type.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store", &self.store.kind())
            .finish()
    }
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Raw similarity search.
    pub async fn search(&self, query: &RetrievalQuery) -> Result<Vec<Document>, RagError> {
        self.store
            .similarity_search(&query.query, query.limit.max(1), &query.filter())
            .await
    }

    /// Search and render the passages for the model.
    ///
    /// Never fails: store or embedding errors come back as text so the
    /// model can react to them.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> String {
        match self.search(query).await {
            Ok(docs) if docs.is_empty() => format!(
                "No relevant documents found for query: \"{}\". You may need to provide a general explanation or ask the student to upload relevant materials.",
                query.query
            ),
            Ok(docs) => {
                debug!(count = docs.len(), "retrieved passages");
                docs.into_iter()
                    .map(|d| d.content)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Err(e) => {
                warn!(error = %e, query = %query.query, "retrieval failed");
                format!("Error retrieving documents: {e}. Please try rephrasing your query.")
            }
        }
    }
}
