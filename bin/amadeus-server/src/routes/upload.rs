//! Knowledge-base upload and listing (`/api/upload`).

use std::sync::Arc;

use amadeus_rag::ingest::DEFAULT_USER_ID;
use amadeus_rag::{Category, DocumentListing, FileUpload, UploadReport};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::upload::{ListQuery, UploadForm};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(upload_files, list_files), components(schemas(UploadForm)))]
pub struct UploadApi;

/// Register upload routes. The body limit covers a whole batch; the
/// per-file limit is enforced by the ingestor and reported per file.
pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let limit = state.config.max_request_mb.saturating_mul(1024 * 1024);
    Router::new()
        .route("/upload", post(upload_files).get(list_files))
        .layer(DefaultBodyLimit::max(limit))
}

/// Upload documents into the knowledge base (`POST /api/upload`).
///
/// Every file is processed independently; the response lists one outcome
/// per file and is 200 even when some (or all) of them failed.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "documents",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Per-file outcomes and summary", body = serde_json::Value),
        (status = 400, description = "No files uploaded, or invalid category"),
    )
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, ServerError> {
    let max_file_size = state.ingestor.max_file_size();
    let mut files = Vec::new();
    let mut user_id: Option<String> = None;
    let mut category: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or("upload").to_owned();
                let mut bytes = Vec::new();
                let mut size: u64 = 0;
                // Keep counting past the per-file limit so the outcome can
                // name it, but stop buffering.
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read file chunk: {e}")))?
                {
                    size += chunk.len() as u64;
                    if size <= max_file_size {
                        bytes.extend_from_slice(&chunk);
                    } else if !bytes.is_empty() {
                        bytes = Vec::new();
                    }
                }
                debug!(%filename, size, "received file");
                files.push(FileUpload { filename, size, bytes });
            }
            "userId" => user_id = Some(read_text(field).await?),
            "category" => category = Some(read_text(field).await?),
            other => debug!(field = other, "ignoring multipart field"),
        }
    }

    let category = match category.as_deref().map(str::trim) {
        None | Some("") => Category::default(),
        Some(raw) => raw.parse::<Category>().map_err(|_| {
            ServerError::BadRequest(
                "Invalid category. Allowed: tutorial, reference, example, documentation".into(),
            )
        })?,
    };
    if files.is_empty() {
        return Err(ServerError::BadRequest("No files uploaded".into()));
    }

    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_owned());
    info!(%user_id, %category, files = files.len(), "upload batch");

    Ok(Json(state.ingestor.ingest_batch(files, &user_id, category).await))
}

/// List a user's uploaded documents (`GET /api/upload`).
#[utoipa::path(
    get,
    path = "/api/upload",
    tag = "documents",
    params(ListQuery),
    responses(
        (status = 200, description = "Distinct files with metadata", body = serde_json::Value),
        (status = 500, description = "Failed to retrieve documents"),
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentListing>, ServerError> {
    let user_id = query
        .user_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USER_ID);

    let listing = state
        .ingestor
        .list_documents(user_id, query.category.as_deref(), query.file_type.as_deref())
        .await
        .map_err(|e| ServerError::Upstream {
            error: "Failed to retrieve documents".into(),
            details: e.to_string(),
        })?;
    Ok(Json(listing))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::test_support::{FailingStore, app_with_store, state_with};

    const BOUNDARY: &str = "amadeus-test-boundary";

    enum Part<'a> {
        File(&'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart(parts: Vec<Part<'_>>) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn no_files_is_a_bad_request() {
        let (app, _dir) = state_with(Config::default());
        let response = app
            .oneshot(multipart(vec![Part::Text("userId", "u1")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "No files uploaded"}));
    }

    #[tokio::test]
    async fn invalid_category_is_a_bad_request() {
        let (app, _dir) = state_with(Config::default());
        let response = app
            .oneshot(multipart(vec![
                Part::File("notes.txt", b"PNR basics".to_vec()),
                Part::Text("category", "gossip"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_file_fails_alone() {
        let (app, _dir) = state_with(Config::default());
        let big = vec![b'a'; 10 * 1024 * 1024 + 1];
        let response = app
            .oneshot(multipart(vec![
                Part::File("huge.txt", big),
                Part::File("notes.txt", b"AN15MARLHRJFK checks availability.".to_vec()),
                Part::File("slides.exe", b"MZ".to_vec()),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Processed 3 files: 1 successful, 2 failed");
        assert_eq!(body["results"][0]["success"], false);
        assert_eq!(body["results"][0]["error"], "File size exceeds 10MB limit");
        assert_eq!(body["results"][1]["success"], true);
        assert_eq!(body["results"][1]["totalChunks"], 1);
        assert!(body["results"][2]["error"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported file type. Allowed: pdf, docx, doc, txt, md, csv, pptx"));
        assert_eq!(body["summary"], json!({"totalFiles": 3, "successful": 1, "failed": 2}));
    }

    #[tokio::test]
    async fn uploaded_files_are_listed_once() {
        let (app, _dir) = state_with(Config::default());
        let response = app
            .clone()
            .oneshot(multipart(vec![
                Part::File("codes.md", b"# City codes\n\nLON is London.".to_vec()),
                Part::Text("userId", "agent-7"),
                Part::Text("category", "reference"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/upload?userId=agent-7&category=reference")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["files"][0]["filename"], "codes.md");
        assert_eq!(body["files"][0]["category"], "reference");
    }

    #[tokio::test]
    async fn listing_failure_reports_details() {
        let (app, _dir) = app_with_store(Config::default(), Arc::new(FailingStore));
        let response = app
            .oneshot(Request::get("/api/upload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to retrieve documents");
        assert!(body["details"].as_str().unwrap().contains("supabase"));
    }
}
