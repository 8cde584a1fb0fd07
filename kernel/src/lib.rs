#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Represents one object held in the backing store.
///
/// The key is the only durable identifier. The name is recovered from the
/// key for display purposes and may be wrong for keys that were not produced
/// by the server's key naming scheme.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Unique path-like identifier inside the store, prefixed `uploads/`
    pub key: String,
    /// Best-effort original file name recovered from the key
    pub name: String,
    /// Size of the object in bytes
    pub size: u64,
    /// Last modification time reported by the store
    pub last_modified: DateTime<Utc>,
    /// Time-limited presigned link for downloading the object
    pub download_url: String,
}

/// Liveness probe payload.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Static readiness message
    pub status: String,
    /// Server time at the moment of the probe
    pub timestamp: DateTime<Utc>,
}

/// Result of a successful proxied upload.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Key the object was stored under
    pub key: String,
    /// Original file name as sent by the caller
    pub name: String,
    /// Number of bytes stored
    pub size: u64,
    /// Presigned download link, valid for one hour
    pub download_url: String,
    pub message: String,
}

/// Request for a presigned direct-upload URL.
///
/// `file_size` is accepted but never enforced server side; only the proxied
/// upload path carries a size cap.
#[derive(Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadUrlRequest {
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<u64>,
}

/// Presigned direct-upload URL with the key the object will live under.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    /// Presigned PUT link, valid for five minutes
    pub upload_url: String,
    pub key: String,
    pub message: String,
}

/// One page of stored objects.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub files: Vec<StoredFile>,
    /// Number of entries in this page
    pub count: usize,
    /// Whether more objects exist beyond this page
    pub is_truncated: bool,
}

/// Acknowledgement of a deletion.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    /// Key that was deleted
    pub key: String,
}

/// Request to refresh the download link of one object.
#[derive(Serialize, Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct DownloadUrlRequest {
    pub key: Option<String>,
}

/// Fresh presigned download link for an existing object.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub download_url: String,
    pub key: String,
}

/// Uniform error shape returned by all endpoints on failure.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable description of what failed
    pub error: String,
    /// Backend message passed through verbatim, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
