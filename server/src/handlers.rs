#![allow(clippy::unused_async)]
use crate::domain::{NewObject, ObjectStore};
use crate::error::ApiError;
use crate::keys::{self, KEY_PREFIX};
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::Utc;
use futures::{Stream, TryStreamExt};
use futures_util::StreamExt;
use kernel::{
    DeleteResponse, DownloadUrlRequest, DownloadUrlResponse, ErrorBody, HealthResponse,
    ListResponse, StoredFile, UploadResponse, UploadUrlRequest, UploadUrlResponse,
};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::StreamReader;
use utoipa::IntoParams;

/// Expiry of every read (download) link.
pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(3600);
/// Expiry of the legacy direct-upload write link.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(300);

const DEFAULT_LIST_LIMIT: i32 = 50;

/// Shared handler state. The store is the only shared piece and it is
/// read-only, so handlers are safe under unbounded concurrency.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
}

/// Reports service liveness.
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Server is running!".to_string(),
        timestamp: Utc::now(),
    })
}

/// Stores a single multipart file under a fresh key and returns a working
/// download link in the same response.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "files",
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "No file present in the form", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed upload body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let (body, read_bytes) = read_from_stream(field)
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed upload body: {e}")))?;
        tracing::debug!("file: {name} read: {read_bytes}");
        file = Some((name, content_type, body));
        break;
    }

    let Some((name, content_type, body)) = file else {
        return Err(ApiError::Validation("No file uploaded".to_string()));
    };

    let key = keys::make_key(&name);
    let size = body.len() as u64;
    state
        .store
        .put(NewObject {
            key: key.clone(),
            content_type,
            original_name: name.clone(),
            uploaded_at: Utc::now(),
            body,
        })
        .await
        .map_err(|e| ApiError::store("Failed to upload file", e))?;

    // The object is already stored here. A presign failure still fails the
    // whole request and the orphan object stays in the store.
    let download_url = state
        .store
        .presign_get(&key, DOWNLOAD_URL_TTL)
        .await
        .map_err(|e| ApiError::store("Failed to upload file", e))?;

    tracing::info!("uploaded file: {name} ({key})");

    Ok(Json(UploadResponse {
        success: true,
        key,
        name,
        size,
        download_url,
        message: "File uploaded successfully".to_string(),
    }))
}

/// Mints a presigned direct-upload URL without touching the file bytes.
///
/// Secondary path with known cross-origin limitations against the backing
/// store; the proxied upload is the primary path.
#[utoipa::path(
    post,
    path = "/api/upload-url",
    tag = "files",
    responses(
        (status = 200, description = "Upload URL generated", body = UploadUrlResponse),
        (status = 400, description = "fileName or fileType missing", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
)]
pub async fn upload_url(
    State(state): State<AppState>,
    Json(request): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    let file_name = request.file_name.unwrap_or_default();
    let file_type = request.file_type.unwrap_or_default();
    if file_name.is_empty() || file_type.is_empty() {
        return Err(ApiError::Validation(
            "fileName and fileType are required".to_string(),
        ));
    }
    // fileSize is accepted but nothing enforces it on this path.

    let key = keys::make_key(&file_name);
    let upload_url = state
        .store
        .presign_put(&key, &file_type, UPLOAD_URL_TTL)
        .await
        .map_err(|e| ApiError::store("Failed to generate upload URL", e))?;

    tracing::info!("generated upload URL for: {file_name}");

    Ok(Json(UploadUrlResponse {
        upload_url,
        key,
        message: "Upload URL generated successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListParams {
    /// Maximum number of entries to return, defaults to 50
    limit: Option<i32>,
}

/// Lists stored objects under the managed prefix with fresh download links.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(ListParams),
    responses(
        (status = 200, description = "One page of stored files", body = ListResponse),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
)]
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let limit = match params.limit {
        Some(n) if n > 0 => n,
        _ => DEFAULT_LIST_LIMIT,
    };

    let listing = state
        .store
        .list(KEY_PREFIX, limit)
        .await
        .map_err(|e| ApiError::store("Failed to list files", e))?;

    // One signing call per object, sequential. The main latency cost of this
    // endpoint at scale.
    let mut files = Vec::with_capacity(listing.objects.len());
    for object in listing.objects {
        let download_url = state
            .store
            .presign_get(&object.key, DOWNLOAD_URL_TTL)
            .await
            .map_err(|e| ApiError::store("Failed to list files", e))?;
        files.push(StoredFile {
            name: keys::display_name(&object.key),
            key: object.key,
            size: object.size,
            last_modified: object.last_modified,
            download_url,
        });
    }

    tracing::info!("listed {} files", files.len());

    Ok(Json(ListResponse {
        count: files.len(),
        files,
        is_truncated: listing.is_truncated,
    }))
}

/// Deletes one object by key.
///
/// The prefix check is the system's only access-control rule: keys outside
/// `uploads/` are refused without touching the store.
#[utoipa::path(
    delete,
    path = "/api/files/{key}",
    tag = "files",
    params(
        ("key" = String, Path, description = "URL-encoded storage key, may contain slashes")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 403, description = "Key outside the managed prefix", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if !key.starts_with(KEY_PREFIX) {
        return Err(ApiError::Forbidden(format!(
            "Access denied: Can only delete files in {KEY_PREFIX} folder"
        )));
    }

    state
        .store
        .delete(&key)
        .await
        .map_err(|e| ApiError::store("Failed to delete file", e))?;

    tracing::info!("deleted file: {key}");

    Ok(Json(DeleteResponse {
        message: "File deleted successfully".to_string(),
        key,
    }))
}

/// Mints a fresh download link for an existing object, so callers can
/// refresh an expired URL without re-listing.
#[utoipa::path(
    post,
    path = "/api/download-url",
    tag = "files",
    responses(
        (status = 200, description = "Fresh download URL", body = DownloadUrlResponse),
        (status = 400, description = "Key missing", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
)]
pub async fn download_url(
    State(state): State<AppState>,
    Json(request): Json<DownloadUrlRequest>,
) -> Result<Json<DownloadUrlResponse>, ApiError> {
    let key = request.key.unwrap_or_default();
    if key.is_empty() {
        return Err(ApiError::Validation("File key is required".to_string()));
    }

    let download_url = state
        .store
        .presign_get(&key, DOWNLOAD_URL_TTL)
        .await
        .map_err(|e| ApiError::store("Failed to generate download URL", e))?;

    Ok(Json(DownloadUrlResponse { download_url, key }))
}

async fn read_from_stream<S, E>(stream: S) -> io::Result<(Vec<u8>, usize)>
where
    S: Stream<Item = Result<Bytes, E>> + StreamExt,
    E: Sync + std::error::Error + Send + 'static,
{
    // Convert the stream into an `AsyncRead`.
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);
    let mut buffer = Vec::new();

    let copied_bytes = tokio::io::copy(&mut body_reader, &mut buffer).await?;
    let copied_bytes = usize::try_from(copied_bytes).unwrap_or(usize::MAX);
    Ok((buffer, copied_bytes))
}
