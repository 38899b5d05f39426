//! Upload ingestion: validate → scratch file → parse → split → sanitise →
//! store.
//!
//! Every file in a batch is processed independently. A failure is recorded
//! in that file's [`FileOutcome`] and the batch carries on; nothing already
//! stored is rolled back.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RagError;
use crate::loader::load_file;
use crate::sanitize::sanitize_content;
use crate::splitter::RecursiveCharacterSplitter;
use crate::store::VectorStore;
use crate::types::{Category, ChunkMetadata, DocumentChunk, FileType, MetadataFilter};

/// 10 MiB per file.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const DEFAULT_USER_ID: &str = "anonymous";

/// One file of an upload request.
///
/// `size` is the full size as received; `bytes` may be empty when the
/// transport stopped buffering an oversized file.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }
}

/// Per-file result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    /// `documentsCount` counts stored chunks, the same as `totalChunks`.
    fn stored(filename: &str, chunks: usize) -> Self {
        Self {
            filename: filename.to_owned(),
            success: true,
            documents_count: Some(chunks),
            total_chunks: Some(chunks),
            error: None,
        }
    }

    fn failed(filename: &str, error: impl Into<String>) -> Self {
        Self {
            filename: filename.to_owned(),
            success: false,
            documents_count: None,
            total_chunks: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub message: String,
    pub results: Vec<FileOutcome>,
    pub summary: UploadSummary,
}

impl UploadReport {
    fn from_results(results: Vec<FileOutcome>) -> Self {
        let total_files = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let failed = total_files - successful;
        Self {
            message: format!(
                "Processed {total_files} files: {successful} successful, {failed} failed"
            ),
            results,
            summary: UploadSummary {
                total_files,
                successful,
                failed,
            },
        }
    }
}

/// One uploaded file as seen by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub filename: String,
    pub file_type: Option<String>,
    pub category: Option<String>,
    pub upload_date: Option<String>,
    pub file_size: Option<u64>,
}

impl DocumentSummary {
    fn from_metadata(metadata: &Value) -> Option<Self> {
        let text = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_owned);
        Some(Self {
            filename: text("filename")?,
            file_type: text("fileType"),
            category: text("category"),
            upload_date: text("uploadDate"),
            file_size: metadata.get("fileSize").and_then(Value::as_u64),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentListing {
    pub files: Vec<DocumentSummary>,
    pub count: usize,
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    scratch_dir: PathBuf,
    splitter: RecursiveCharacterSplitter,
    max_file_size: u64,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("store", &self.store.kind())
            .field("scratch_dir", &self.scratch_dir)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStore>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scratch_dir: scratch_dir.into(),
            splitter: RecursiveCharacterSplitter::default(),
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Process every file of an upload and summarise the outcomes.
    pub async fn ingest_batch(
        &self,
        files: Vec<FileUpload>,
        user_id: &str,
        category: Category,
    ) -> UploadReport {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let outcome = self.ingest_file(&file, user_id, category).await;
            if let Some(error) = &outcome.error {
                warn!(filename = %file.filename, error = %error, "file rejected");
            }
            results.push(outcome);
        }

        let report = UploadReport::from_results(results);
        info!(
            user_id,
            %category,
            successful = report.summary.successful,
            failed = report.summary.failed,
            "upload batch processed"
        );
        report
    }

    async fn ingest_file(&self, file: &FileUpload, user_id: &str, category: Category) -> FileOutcome {
        if file.size > self.max_file_size {
            return FileOutcome::failed(&file.filename, "File size exceeds 10MB limit");
        }
        let Some(file_type) = FileType::from_filename(&file.filename) else {
            return FileOutcome::failed(
                &file.filename,
                format!("Unsupported file type. Allowed: {}", FileType::allowed_list()),
            );
        };

        let scratch = self.scratch_path(&file.filename);
        let result = self
            .process(file, file_type, &scratch, user_id, category)
            .await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "failed to remove scratch file");
            }
        }

        match result {
            Ok(chunks) => FileOutcome::stored(&file.filename, chunks),
            Err(e) => FileOutcome::failed(&file.filename, e.to_string()),
        }
    }

    async fn process(
        &self,
        file: &FileUpload,
        file_type: FileType,
        scratch: &Path,
        user_id: &str,
        category: Category,
    ) -> Result<usize, RagError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        tokio::fs::write(scratch, &file.bytes).await?;

        let path = scratch.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || load_file(&path, file_type)).await??;

        let upload_date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut chunks = Vec::new();
        for document in &documents {
            for piece in self.splitter.split_text(&document.content) {
                let content = sanitize_content(&piece);
                if content.is_empty() {
                    continue;
                }
                let mut extra = document.metadata.clone();
                extra
                    .entry("source")
                    .or_insert_with(|| Value::String(file.filename.clone()));
                chunks.push(DocumentChunk {
                    content,
                    metadata: ChunkMetadata {
                        filename: file.filename.clone(),
                        file_type,
                        user_id: user_id.to_owned(),
                        category,
                        upload_date: upload_date.clone(),
                        file_size: file.size,
                        extra,
                    },
                });
            }
        }

        let chunk_count = chunks.len();
        if chunk_count > 0 {
            self.store.add_documents(chunks).await?;
        }
        info!(
            filename = %file.filename,
            %file_type,
            documents = documents.len(),
            chunks = chunk_count,
            "ingested file"
        );
        Ok(chunk_count)
    }

    fn scratch_path(&self, filename: &str) -> PathBuf {
        self.scratch_dir.join(format!(
            "{}_{}_{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            sanitize_filename(filename)
        ))
    }

    /// Uploaded files for `user_id`, one entry per filename (first seen
    /// wins).
    pub async fn list_documents(
        &self,
        user_id: &str,
        category: Option<&str>,
        file_type: Option<&str>,
    ) -> Result<DocumentListing, RagError> {
        let filter = MetadataFilter {
            user_id: Some(user_id.to_owned()),
            category: category.filter(|c| !c.is_empty()).map(str::to_owned),
            file_type: file_type.filter(|t| !t.is_empty()).map(str::to_owned),
        };
        let rows = self.store.list_metadata(&filter).await?;

        let mut seen = HashSet::new();
        let files: Vec<DocumentSummary> = rows
            .iter()
            .filter_map(DocumentSummary::from_metadata)
            .filter(|summary| seen.insert(summary.filename.clone()))
            .collect();

        Ok(DocumentListing {
            count: files.len(),
            files,
        })
    }
}

/// Keep only characters safe in a single path component.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::types::Document;

    #[derive(Default)]
    struct RecordingStore {
        added: Mutex<Vec<DocumentChunk>>,
        rows: Vec<Value>,
        reject_filename: Option<&'static str>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
            if let Some(name) = self.reject_filename {
                if chunks.iter().any(|c| c.metadata.filename == name) {
                    return Err(RagError::NotConfigured("OPENAI_API_KEY"));
                }
            }
            let n = chunks.len();
            self.added.lock().unwrap().extend(chunks);
            Ok(n)
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _k: usize,
            _filter: &MetadataFilter,
        ) -> Result<Vec<Document>, RagError> {
            Ok(Vec::new())
        }

        async fn list_metadata(&self, filter: &MetadataFilter) -> Result<Vec<Value>, RagError> {
            Ok(self.rows.iter().filter(|r| filter.matches(r)).cloned().collect())
        }

        fn kind(&self) -> &'static str {
            "recording"
        }
    }

    fn scratch_is_empty(dir: &Path) -> bool {
        !dir.exists() || std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn oversized_file_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(store.clone(), dir.path());

        let big = FileUpload {
            filename: "manual.pdf".into(),
            size: MAX_FILE_SIZE + 1,
            bytes: Vec::new(),
        };
        let small = FileUpload::new("notes.txt", b"AN15MARPARMAD shows availability".to_vec());
        let report = ingestor
            .ingest_batch(vec![big, small], DEFAULT_USER_ID, Category::Tutorial)
            .await;

        assert_eq!(report.message, "Processed 2 files: 1 successful, 1 failed");
        assert!(!report.results[0].success);
        assert!(report.results[0].error.as_deref().unwrap().contains("10MB"));
        assert!(report.results[1].success);
        assert_eq!(report.results[1].total_chunks, Some(1));
        assert_eq!(store.added.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_extension_never_reaches_parser() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(store.clone(), dir.path().join("scratch"));

        let report = ingestor
            .ingest_batch(
                vec![FileUpload::new("setup.exe", b"MZ".to_vec())],
                DEFAULT_USER_ID,
                Category::Tutorial,
            )
            .await;

        let error = report.results[0].error.as_deref().unwrap();
        assert!(error.contains("Unsupported file type"));
        assert!(error.contains("pdf, docx, doc, txt, md, csv, pptx"));
        // The scratch directory is only created once a file passes validation.
        assert!(!dir.path().join("scratch").exists());
        assert!(store.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_carry_metadata_and_scratch_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(store.clone(), dir.path());

        let body = "\u{FEFF}Day one: sign in with JI.\r\n\r\nDay two: AN for availability.";
        let report = ingestor
            .ingest_batch(
                vec![FileUpload::new("Course Notes.md", body.as_bytes().to_vec())],
                "student-7",
                Category::Reference,
            )
            .await;
        assert!(report.results[0].success, "{:?}", report.results[0]);

        let added = store.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        let chunk = &added[0];
        assert_eq!(chunk.content, "Day one: sign in with JI.Day two: AN for availability.");
        assert_eq!(chunk.metadata.filename, "Course Notes.md");
        assert_eq!(chunk.metadata.file_type, FileType::Md);
        assert_eq!(chunk.metadata.user_id, "student-7");
        assert_eq!(chunk.metadata.category, Category::Reference);
        assert_eq!(chunk.metadata.file_size, body.len() as u64);
        assert_eq!(chunk.metadata.extra["source"], "Course Notes.md");
        assert!(chrono::DateTime::parse_from_rfc3339(&chunk.metadata.upload_date).is_ok());

        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn store_failure_is_isolated_and_scratch_still_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore {
            reject_filename: Some("a.txt"),
            ..Default::default()
        });
        let ingestor = Ingestor::new(store.clone(), dir.path());

        let report = ingestor
            .ingest_batch(
                vec![
                    FileUpload::new("a.txt", b"first".to_vec()),
                    FileUpload::new("b.txt", b"second".to_vec()),
                ],
                DEFAULT_USER_ID,
                Category::Tutorial,
            )
            .await;

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.successful, 1);
        assert_eq!(
            report.results[0].error.as_deref(),
            Some("OPENAI_API_KEY is not configured")
        );
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn documents_count_matches_stored_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(store.clone(), dir.path());

        let body = vec!["availability"; 600].join(" ");
        let report = ingestor
            .ingest_batch(
                vec![FileUpload::new("long.txt", body.into_bytes())],
                DEFAULT_USER_ID,
                Category::Tutorial,
            )
            .await;

        let outcome = &report.results[0];
        let stored = store.added.lock().unwrap().len();
        assert!(stored > 1);
        assert_eq!(outcome.total_chunks, Some(stored));
        assert_eq!(outcome.documents_count, outcome.total_chunks);
    }

    #[tokio::test]
    async fn corrupt_document_reports_parser_error() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(Arc::new(RecordingStore::default()), dir.path());
        let report = ingestor
            .ingest_batch(
                vec![FileUpload::new("broken.pptx", b"not a zip".to_vec())],
                DEFAULT_USER_ID,
                Category::Tutorial,
            )
            .await;
        assert!(!report.results[0].success);
        assert!(scratch_is_empty(dir.path()));
    }

    #[test]
    fn outcome_serialises_like_the_upload_response() {
        let ok = serde_json::to_value(FileOutcome::stored("a.pdf", 7)).unwrap();
        assert_eq!(
            ok,
            json!({ "filename": "a.pdf", "success": true, "documentsCount": 7, "totalChunks": 7 })
        );
        let err = serde_json::to_value(FileOutcome::failed("a.exe", "nope")).unwrap();
        assert_eq!(err, json!({ "filename": "a.exe", "success": false, "error": "nope" }));
    }

    #[test]
    fn sanitize_filename_blocks_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[tokio::test]
    async fn listing_dedups_by_filename() {
        let store = RecordingStore {
            rows: vec![
                json!({ "filename": "a.pdf", "fileType": "pdf", "userId": "anonymous", "category": "tutorial", "fileSize": 10 }),
                json!({ "filename": "a.pdf", "fileType": "pdf", "userId": "anonymous", "category": "tutorial", "fileSize": 10 }),
                json!({ "filename": "b.csv", "fileType": "csv", "userId": "anonymous", "category": "reference" }),
                json!({ "filename": "c.txt", "userId": "someone-else" }),
            ],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(Arc::new(store), dir.path());

        let listing = ingestor.list_documents("anonymous", None, None).await.unwrap();
        assert_eq!(listing.count, 2);
        assert_eq!(listing.files[0].filename, "a.pdf");
        assert_eq!(listing.files[0].file_size, Some(10));

        let refs = ingestor
            .list_documents("anonymous", Some("reference"), None)
            .await
            .unwrap();
        assert_eq!(refs.count, 1);
        assert_eq!(refs.files[0].filename, "b.csv");
    }
}
