use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Failure raised by the backing object store.
///
/// The backend's own message is carried through so handlers can pass it to
/// the caller verbatim. No retries happen at this layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
    #[error("invalid presign expiration: {0}")]
    Presign(String),
}

/// A single object about to be written into the store.
pub struct NewObject {
    pub key: String,
    pub content_type: String,
    /// Kept in object metadata because name recovery from the key is lossy
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub body: Vec<u8>,
}

/// Metadata of one stored object as reported by a listing.
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a listing.
pub struct Listing {
    pub objects: Vec<ObjectInfo>,
    /// True when more objects exist beyond this page
    pub is_truncated: bool,
}

/// The seam between request handlers and the backing store.
///
/// Handlers never talk to the storage SDK directly, which keeps them
/// testable against an in-memory implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, object: NewObject) -> Result<(), StoreError>;

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Listing, StoreError>;

    /// Deleting a missing key is a no-op, per S3 `DeleteObject` semantics.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError>;

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;
}
