//! Text embedding providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RagError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
/// Inputs per request; the endpoint rejects larger batches.
const MAX_BATCH: usize = 512;

/// Turns text into vectors for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passages, preserving order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed_documents(&[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("provider returned no vectors".into()))
    }
}

/// OpenAI `/v1/embeddings` client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    http: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// A missing `api_key` is reported on first use, not here, so the
    /// server can still start and serve chat without ingestion.
    pub fn new(http: Client, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            endpoint: OPENAI_EMBEDDINGS_URL.to_owned(),
        }
    }

    /// Point at an OpenAI-compatible endpoint (proxies, local gateways).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed_batch(&self, api_key: &str, batch: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest { model: &self.model, input: batch })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Upstream {
                service: "embeddings",
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RagError::NotConfigured("OPENAI_API_KEY"))?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(model = %self.model, inputs = batch.len(), "requesting embeddings");
            vectors.extend(self.embed_batch(api_key, batch).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let embedder = OpenAiEmbedder::new(Client::new(), Some("  ".into()), DEFAULT_EMBEDDING_MODEL);
        assert!(!embedder.is_configured());
        let err = embedder.embed_query("PNR").await.unwrap_err();
        assert!(matches!(err, RagError::NotConfigured("OPENAI_API_KEY")));
    }
}
