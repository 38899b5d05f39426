use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Multipart form accepted by `POST /api/upload`. Documentation only; the
/// handler reads the fields as a stream.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct UploadForm {
    /// One or more binary file parts; repeat the field for each file.
    #[schema(value_type = Vec<String>)]
    pub files: Vec<Vec<u8>>,
    /// Owner of the documents (default `anonymous`).
    pub user_id: Option<String>,
    /// `tutorial` (default), `reference`, `example` or `documentation`.
    pub category: Option<String>,
}

/// Query string of `GET /api/upload`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub file_type: Option<String>,
}
