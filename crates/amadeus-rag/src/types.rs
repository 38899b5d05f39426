use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Category tag attached to every uploaded document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    #[default]
    Tutorial,
    Reference,
    Example,
    Documentation,
}

/// File formats accepted by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Doc,
    Txt,
    Md,
    Csv,
    Pptx,
}

impl FileType {
    /// Every supported format, in the order used for error messages.
    pub const ALL: [FileType; 7] = [
        FileType::Pdf,
        FileType::Docx,
        FileType::Doc,
        FileType::Txt,
        FileType::Md,
        FileType::Csv,
        FileType::Pptx,
    ];

    /// Lower-cased text after the final `.` of `filename`, if any.
    pub fn extension_of(filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_lowercase())
        }
    }

    /// Resolve the format from a filename's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        Self::extension_of(filename)?.parse().ok()
    }

    /// `"pdf, docx, doc, txt, md, csv, pptx"`
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Metadata stored alongside every chunk in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub filename: String,
    pub file_type: FileType,
    pub user_id: String,
    pub category: Category,
    /// RFC 3339 timestamp of the upload.
    pub upload_date: String,
    pub file_size: u64,
    /// Loader-specific fields (e.g. CSV `line`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chunk ready to be embedded and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Metadata containment filter, serialised as a flat JSON object
/// (`{"userId": "...", "category": "..."}`) that must be a subset of a
/// chunk's metadata to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub file_type: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.category.is_none() && self.file_type.is_none()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(user_id) = &self.user_id {
            map.insert("userId".into(), Value::String(user_id.clone()));
        }
        if let Some(category) = &self.category {
            map.insert("category".into(), Value::String(category.clone()));
        }
        if let Some(file_type) = &self.file_type {
            map.insert("fileType".into(), Value::String(file_type.clone()));
        }
        map
    }

    /// `true` when every filter entry is present and equal in `metadata`.
    pub fn matches(&self, metadata: &Value) -> bool {
        self.to_json()
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_type_from_filename_is_case_insensitive() {
        assert_eq!(FileType::from_filename("Course.PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_filename("notes.tar.md"), Some(FileType::Md));
        assert_eq!(FileType::from_filename("setup.exe"), None);
        assert_eq!(FileType::from_filename("README"), None);
        assert_eq!(FileType::from_filename("trailing."), None);
    }

    #[test]
    fn allowed_list_matches_upload_error_wording() {
        assert_eq!(FileType::allowed_list(), "pdf, docx, doc, txt, md, csv, pptx");
    }

    #[test]
    fn category_parses_lowercase_names() {
        assert_eq!("reference".parse::<Category>().ok(), Some(Category::Reference));
        assert!("lecture".parse::<Category>().is_err());
        assert_eq!(Category::default().to_string(), "tutorial");
    }

    #[test]
    fn metadata_serialises_camel_case_with_extra_fields() {
        let mut extra = Map::new();
        extra.insert("line".into(), Value::from(3));
        let meta = ChunkMetadata {
            filename: "codes.csv".into(),
            file_type: FileType::Csv,
            user_id: "anonymous".into(),
            category: Category::Reference,
            upload_date: "2026-01-01T00:00:00Z".into(),
            file_size: 42,
            extra,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["fileType"], "csv");
        assert_eq!(json["userId"], "anonymous");
        assert_eq!(json["fileSize"], 42);
        assert_eq!(json["line"], 3);
    }

    #[test]
    fn filter_matches_subset_only() {
        let filter = MetadataFilter {
            category: Some("tutorial".into()),
            ..Default::default()
        };
        let hit = serde_json::json!({ "category": "tutorial", "fileType": "pdf" });
        let miss = serde_json::json!({ "category": "reference" });
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
        assert!(MetadataFilter::default().matches(&miss));
    }
}
