use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::embeddings::Embedder;
use crate::error::RagError;
use crate::store::VectorStore;
use crate::types::{Document, DocumentChunk, MetadataFilter};

struct Row {
    embedding: Vec<f32>,
    content: String,
    metadata: Value,
}

/// In-process store ranking by cosine similarity. Contents are lost on
/// restart.
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    rows: Mutex<Vec<Row>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.rows.lock().map(|r| r.len()).unwrap_or(0);
        write!(f, "MemoryStore({count} rows)")
    }
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, rows: Mutex::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        let mut new_rows = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            new_rows.push(Row {
                embedding,
                metadata: serde_json::to_value(&chunk.metadata)?,
                content: chunk.content,
            });
        }
        let written = new_rows.len();
        self.rows
            .lock()
            .map_err(|e| RagError::Store(e.to_string()))?
            .extend(new_rows);
        Ok(written)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>, RagError> {
        let query_vec = self.embedder.embed_query(query).await?;
        let rows = self.rows.lock().map_err(|e| RagError::Store(e.to_string()))?;

        let mut scored: Vec<(f32, &Row)> = rows
            .iter()
            .filter(|row| filter.matches(&row.metadata))
            .map(|row| (cosine(&query_vec, &row.embedding), row))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, row)| Document {
                content: row.content.clone(),
                metadata: row.metadata.clone(),
            })
            .collect())
    }

    async fn list_metadata(&self, filter: &MetadataFilter) -> Result<Vec<Value>, RagError> {
        let rows = self.rows.lock().map_err(|e| RagError::Store(e.to_string()))?;
        Ok(rows
            .iter()
            .filter(|row| filter.matches(&row.metadata))
            .map(|row| row.metadata.clone())
            .collect())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;

    use crate::embeddings::Embedder;
    use crate::error::RagError;

    /// Bag-of-letters embedding: deterministic and good enough to rank
    /// passages sharing vocabulary with the query.
    pub struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().chars() {
                        if c.is_ascii_lowercase() {
                            v[(c as u8 - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }
}
