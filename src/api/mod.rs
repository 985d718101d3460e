// Remote API seams consumed by the session and the dataset manager

pub mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{DatasetId, DatasetRecord, LoginRequest, LoginResponse, Row, UploadFile};
use crate::types::AppResult;

/// Dataset endpoints. Every call takes the bearer token explicitly; the
/// caller is responsible for never calling without one.
#[async_trait]
pub trait DatasetApi: Send + Sync {
    async fn list(&self, token: &str) -> AppResult<Vec<DatasetRecord>>;

    /// The created record is returned by the service but callers only need
    /// to know the upload succeeded.
    async fn upload(&self, token: &str, file: UploadFile) -> AppResult<()>;

    async fn fetch_rows(&self, token: &str, storage_name: &str) -> AppResult<Vec<Row>>;

    async fn delete_many(&self, token: &str, ids: &[DatasetId]) -> AppResult<()>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse>;
}

/// The service exposes batch delete twice. Both are the same logical
/// operation; this picks the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DeleteBinding {
    /// `POST /csv-uploads/delete-many` with `{ ids }`.
    #[default]
    #[serde(rename = "post", alias = "post-delete-many")]
    PostDeleteMany,
    /// `DELETE /csv-uploads` with `{ ids }` as the body.
    #[serde(rename = "delete", alias = "delete-with-body")]
    DeleteWithBody,
}

impl std::fmt::Display for DeleteBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteBinding::PostDeleteMany => write!(f, "POST /csv-uploads/delete-many"),
            DeleteBinding::DeleteWithBody => write!(f, "DELETE /csv-uploads"),
        }
    }
}
