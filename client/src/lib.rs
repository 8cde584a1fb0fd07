use std::time::Duration;

use kernel::{
    DeleteResponse, DownloadUrlRequest, DownloadUrlResponse, ErrorBody, HealthResponse,
    ListResponse, UploadUrlRequest, UploadUrlResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod endpoint;
pub mod table;
pub mod upload;

use endpoint::Endpoint;

/// Timeout applied to plain JSON calls. Transfers run without one so large
/// uploads are not cut off mid-body.
const API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URI: {0}")]
    InvalidBase(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with its uniform error shape.
    #[error("{error} ({status})")]
    Api {
        status: StatusCode,
        error: String,
        details: Option<String>,
    },
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client for the pail REST API.
pub struct StoreClient {
    api: Client,
    transfer: Client,
    endpoint: Endpoint,
}

impl StoreClient {
    pub fn new(uri: &str) -> Result<Self, ClientError> {
        let endpoint = Endpoint::new(uri)?;
        let api = Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Self {
            api,
            transfer: Client::new(),
            endpoint,
        })
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        decode(self.api.get(self.endpoint.health()).send().await?).await
    }

    pub async fn list_files(&self, limit: Option<usize>) -> Result<ListResponse, ClientError> {
        decode(self.api.get(self.endpoint.files(limit)).send().await?).await
    }

    pub async fn delete_file(&self, key: &str) -> Result<DeleteResponse, ClientError> {
        decode(self.api.delete(self.endpoint.file(key)).send().await?).await
    }

    /// Mints a fresh download link for a key whose cached URL has expired.
    pub async fn fetch_download_url(&self, key: &str) -> Result<DownloadUrlResponse, ClientError> {
        let request = DownloadUrlRequest {
            key: Some(key.to_string()),
        };
        decode(
            self.api
                .post(self.endpoint.download_url())
                .json(&request)
                .send()
                .await?,
        )
        .await
    }

    /// Legacy direct-upload path: asks the server for a short-lived
    /// presigned PUT link instead of proxying the bytes.
    pub async fn request_upload_url(
        &self,
        file_name: &str,
        file_type: &str,
        file_size: Option<u64>,
    ) -> Result<UploadUrlResponse, ClientError> {
        let request = UploadUrlRequest {
            file_name: Some(file_name.to_string()),
            file_type: Some(file_type.to_string()),
            file_size,
        };
        decode(
            self.api
                .post(self.endpoint.upload_url())
                .json(&request)
                .send()
                .await?,
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
            error: format!("HTTP {status}"),
            details: None,
        });
        Err(ClientError::Api {
            status,
            error: body.error,
            details: body.details,
        })
    }
}
