// Wire and domain models for the dataset service

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A single dataset row: column name to cell value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Server-assigned dataset id. Opaque: kept in whatever JSON shape the
/// server used so it can be echoed back verbatim in delete requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetId {
    Number(i64),
    Text(String),
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetId::Number(n) => write!(f, "{}", n),
            DatasetId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for DatasetId {
    fn from(n: i64) -> Self {
        DatasetId::Number(n)
    }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self {
        DatasetId::Text(s.to_string())
    }
}

/// One uploaded dataset as listed by `GET /csv-uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    #[serde(rename = "_id")]
    pub id: DatasetId,
    /// Stable key used in remote-call paths.
    #[serde(rename = "filename")]
    pub storage_name: String,
    /// Name of the file as the user uploaded it.
    #[serde(rename = "originalname", default)]
    pub display_name: String,
    #[serde(rename = "uploadedBy", default)]
    pub uploader: String,
    /// Server lifecycle tag, displayed as-is.
    #[serde(default)]
    pub status: String,
}

impl DatasetRecord {
    /// Name shown to the user, falling back to the storage key.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.storage_name
        } else {
            &self.display_name
        }
    }
}

/// Body of both batch-delete bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub ids: Vec<DatasetId>,
}

/// A file selected for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, keeping its file name as the upload name.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, content))
    }

    /// `.csv` filter, case-insensitive. A picker convenience, not a security check.
    pub fn has_csv_extension(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

/// The payload handed to the chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDataset {
    pub display_name: String,
    pub rows: Vec<Row>,
}

impl ResolvedDataset {
    pub fn new(record: &DatasetRecord, rows: Vec<Row>) -> Self {
        Self {
            display_name: record.label().to_string(),
            rows,
        }
    }
}

// Login wire types

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// The login endpoint answers either `{ data: { access_token, user } }` or
/// `{ access_token, user }`. Nested is tried first.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Nested { data: TokenGrant },
    Flat(TokenGrant),
}

impl LoginResponse {
    pub fn into_grant(self) -> TokenGrant {
        match self {
            LoginResponse::Nested { data } => data,
            LoginResponse::Flat(grant) => grant,
        }
    }
}

/// Error body returned by the service, e.g. `{ "message": "Unauthorized" }`.
/// Validation failures carry a list of messages instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceErrorBody {
    pub message: ServiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceMessage {
    One(String),
    Many(Vec<String>),
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMessage::One(m) => write!(f, "{}", m),
            ServiceMessage::Many(ms) => write!(f, "{}", ms.join("; ")),
        }
    }
}
