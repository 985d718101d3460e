// reqwest binding of the dataset and auth endpoints

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{AuthApi, DatasetApi, DeleteBinding};
use crate::config::ApiConfig;
use crate::models::{
    DatasetId, DatasetRecord, DeleteRequest, LoginRequest, LoginResponse, Row, ServiceErrorBody,
    UploadFile,
};
use crate::types::{AppError, AppResult};

const UPLOADS_PATH: &str = "csv-uploads";
const LOGIN_PATH: &str = "auth/login";

pub struct HttpApi {
    client: Client,
    base_url: String,
    delete_binding: DeleteBinding,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            delete_binding: DeleteBinding::default(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delete_binding: config.delete_binding,
        })
    }

    pub fn with_delete_binding(mut self, binding: DeleteBinding) -> Self {
        self.delete_binding = binding;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> AppResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn uploads_url(&self) -> String {
        format!("{}/{}", self.base_url, UPLOADS_PATH)
    }

    /// `/csv-uploads/{storage_name}` with the name percent-encoded as one segment.
    fn rows_url(&self, storage_name: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.uploads_url())
            .map_err(|e| AppError::Internal(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("API base URL cannot carry a path".to_string()))?
            .push(storage_name);
        Ok(url)
    }
}

/// Turn a non-success dataset response into an error. 401 means the
/// credential is no longer accepted.
async fn ensure_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        warn!(%status, "Dataset service rejected the bearer token");
        return Err(AppError::SessionExpired);
    }

    Err(AppError::Transport(format!(
        "{} ({})",
        service_message(&body).unwrap_or(body),
        status
    )))
}

fn service_message(body: &str) -> Option<String> {
    serde_json::from_str::<ServiceErrorBody>(body)
        .ok()
        .map(|b| b.message.to_string())
}

#[async_trait]
impl DatasetApi for HttpApi {
    async fn list(&self, token: &str) -> AppResult<Vec<DatasetRecord>> {
        debug!(url = %self.uploads_url(), "Listing datasets");
        let response = self
            .client
            .get(self.uploads_url())
            .bearer_auth(token)
            .send()
            .await?;

        let records: Option<Vec<DatasetRecord>> = ensure_success(response).await?.json().await?;
        Ok(records.unwrap_or_default())
    }

    async fn upload(&self, token: &str, file: UploadFile) -> AppResult<()> {
        debug!(file = %file.file_name, bytes = file.content.len(), "Uploading dataset");
        let part = Part::bytes(file.content.to_vec())
            .file_name(file.file_name)
            .mime_str(mime::TEXT_CSV.as_ref())?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.uploads_url())
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_rows(&self, token: &str, storage_name: &str) -> AppResult<Vec<Row>> {
        let url = self.rows_url(storage_name)?;
        debug!(%url, "Fetching dataset rows");
        let response = self.client.get(url).bearer_auth(token).send().await?;

        let rows: Option<Vec<Row>> = ensure_success(response).await?.json().await?;
        Ok(rows.unwrap_or_default())
    }

    async fn delete_many(&self, token: &str, ids: &[DatasetId]) -> AppResult<()> {
        let body = DeleteRequest { ids: ids.to_vec() };
        debug!(binding = %self.delete_binding, count = ids.len(), "Deleting datasets");

        let request = match self.delete_binding {
            DeleteBinding::PostDeleteMany => self
                .client
                .post(format!("{}/delete-many", self.uploads_url())),
            DeleteBinding::DeleteWithBody => self.client.delete(self.uploads_url()),
        };

        let response = request.bearer_auth(token).json(&body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse> {
        let url = format!("{}/{}", self.base_url, LOGIN_PATH);
        debug!(%url, "Logging in");
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::Auth(
                service_message(&body).unwrap_or_else(|| format!("Login failed ({})", status)),
            ));
        }

        serde_json::from_str(&body).map_err(|_| {
            AppError::MalformedLogin("no access token in login response".to_string())
        })
    }
}
