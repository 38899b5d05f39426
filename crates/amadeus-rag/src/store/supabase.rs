//! Supabase (PostgREST + pgvector) backend.
//!
//! Expects the conventional `documents` table:
//!
//! ```sql
//! create table documents (
//!   id bigserial primary key,
//!   content text,
//!   metadata jsonb,
//!   embedding vector(1536)
//! );
//! ```
//!
//! and a `match_documents(query_embedding, match_count, filter)` function
//! performing cosine search with `metadata @> filter`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::error::RagError;
use crate::store::VectorStore;
use crate::types::{Document, DocumentChunk, MetadataFilter};

const TABLE: &str = "documents";
const MATCH_FUNCTION: &str = "match_documents";
/// Rows per insert request.
const INSERT_BATCH: usize = 500;

pub struct SupabaseStore {
    http: Client,
    base_url: String,
    api_key: String,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    content: &'a str,
    metadata: Value,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
    filter: Map<String, Value>,
}

#[derive(Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Deserialize)]
struct MetadataRow {
    #[serde(default)]
    metadata: Value,
}

impl SupabaseStore {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            embedder,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{TABLE}", self.base_url)
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{MATCH_FUNCTION}", self.base_url)
    }

    /// `GET /rest/v1/documents?select=metadata&metadata=cs.{...}`
    fn list_url(&self, filter: &MetadataFilter) -> Result<Url, RagError> {
        let mut url = Url::parse(&self.table_url()).map_err(|e| RagError::Parse {
            file_type: "url".into(),
            message: e.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "metadata");
            if !filter.is_empty() {
                let containment = Value::Object(filter.to_json()).to_string();
                query.append_pair("metadata", &format!("cs.{containment}"));
            }
        }
        Ok(url)
    }
}

async fn check(service: &'static str, response: reqwest::Response) -> Result<reqwest::Response, RagError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RagError::Upstream {
        service,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl VectorStore for SupabaseStore {
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        let mut written = 0;
        for (batch, vectors) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
            let rows = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, embedding)| {
                    Ok(InsertRow {
                        content: &chunk.content,
                        metadata: serde_json::to_value(&chunk.metadata)?,
                        embedding,
                    })
                })
                .collect::<Result<Vec<_>, RagError>>()?;

            let request = self
                .authorized(self.http.post(self.table_url()))
                .header("Prefer", "return=minimal")
                .json(&rows);
            check("supabase", request.send().await?).await?;
            written += rows.len();
            debug!(rows = rows.len(), "inserted chunk batch");
        }

        info!(written, "stored chunks in supabase");
        Ok(written)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>, RagError> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let body = MatchRequest {
            query_embedding: &query_embedding,
            match_count: k,
            filter: filter.to_json(),
        };

        let response = self
            .authorized(self.http.post(self.rpc_url()))
            .json(&body)
            .send()
            .await?;
        let rows: Vec<MatchRow> = check("supabase", response).await?.json().await?;

        Ok(rows
            .into_iter()
            .map(|row| Document {
                content: row.content,
                metadata: row.metadata,
            })
            .collect())
    }

    async fn list_metadata(&self, filter: &MetadataFilter) -> Result<Vec<Value>, RagError> {
        let url = self.list_url(filter)?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let rows: Vec<MetadataRow> = check("supabase", response).await?.json().await?;
        Ok(rows.into_iter().map(|row| row.metadata).collect())
    }

    fn kind(&self) -> &'static str {
        "supabase"
    }
}
