use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::channel::oneshot::Sender;
use kernel::{
    DeleteResponse, DownloadUrlResponse, ErrorBody, HealthResponse, ListResponse, UploadResponse,
    UploadUrlResponse,
};
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serial_test::serial;
use server::domain::{Listing, NewObject, ObjectInfo, ObjectStore, StoreError};
use server::keys::KEY_PREFIX;
use server::AppState;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_context::{test_context, AsyncTestContext};
use tokio::task::JoinHandle;
use urlencoding::encode;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

struct StoredObject {
    size: u64,
    last_modified: DateTime<Utc>,
    original_name: String,
}

/// In-memory stand-in for the backing store. Counts every mutation and
/// every signing call so tests can assert what the handlers touched.
#[derive(Default)]
struct MemStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: AtomicU64,
    deletes: AtomicU64,
    signatures: AtomicU64,
}

impl MemStore {
    fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn original_name(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.original_name.clone())
    }

    fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn put(&self, object: NewObject) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(
            object.key,
            StoredObject {
                size: object.body.len() as u64,
                last_modified: object.uploaded_at,
                original_name: object.original_name,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Listing, StoreError> {
        let objects = self.objects.lock().unwrap();
        let matching: Vec<_> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        let limit = usize::try_from(max_keys).unwrap_or_default();
        let is_truncated = matching.len() > limit;
        let page = matching
            .into_iter()
            .take(limit)
            .map(|(key, value)| ObjectInfo {
                key: key.clone(),
                size: value.size,
                last_modified: value.last_modified,
            })
            .collect();
        Ok(Listing {
            objects: page,
            is_truncated,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        // DeleteObject succeeds for missing keys as well
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let seq = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "http://store.local/test-bucket/{key}?X-Amz-Expires={}&X-Amz-Signature=get{seq}",
            expires_in.as_secs()
        ))
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let seq = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "http://store.local/test-bucket/{key}?X-Amz-Expires={}&X-Amz-Signature=put{seq}",
            expires_in.as_secs()
        ))
    }
}

/// Store whose every operation fails with the same backend message.
struct BrokenStore;

#[async_trait]
impl ObjectStore for BrokenStore {
    async fn put(&self, _object: NewObject) -> Result<(), StoreError> {
        Err(StoreError::Backend("bucket offline".to_string()))
    }

    async fn list(&self, _prefix: &str, _max_keys: i32) -> Result<Listing, StoreError> {
        Err(StoreError::Backend("bucket offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("bucket offline".to_string()))
    }

    async fn presign_get(&self, _key: &str, _expires_in: Duration) -> Result<String, StoreError> {
        Err(StoreError::Backend("bucket offline".to_string()))
    }

    async fn presign_put(
        &self,
        _key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> Result<String, StoreError> {
        Err(StoreError::Backend("bucket offline".to_string()))
    }
}

/// Store that persists objects fine but cannot sign URLs. Used to drive
/// the branch where signing fails after the object is already written.
#[derive(Default)]
struct SignerDownStore {
    inner: MemStore,
}

#[async_trait]
impl ObjectStore for SignerDownStore {
    async fn put(&self, object: NewObject) -> Result<(), StoreError> {
        self.inner.put(object).await
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Listing, StoreError> {
        self.inner.list(prefix, max_keys).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn presign_get(&self, _key: &str, _expires_in: Duration) -> Result<String, StoreError> {
        Err(StoreError::Backend("signer offline".to_string()))
    }

    async fn presign_put(
        &self,
        _key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> Result<String, StoreError> {
        Err(StoreError::Backend("signer offline".to_string()))
    }
}

fn get_available_port() -> Option<u16> {
    loop {
        let port = rand::thread_rng().gen_range(8000..9000);
        if port_is_available(port) {
            return Some(port);
        }
    }
}

fn port_is_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

async fn spawn_server(store: Arc<dyn ObjectStore>) -> (u16, Sender<()>, JoinHandle<()>) {
    let port = get_available_port().unwrap();
    let state = AppState { store };
    let app = server::create_routes(state, None);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    let (shutdown, recv) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async { recv.await.unwrap_or_default() })
            .await
            .unwrap();
    });
    (port, shutdown, join)
}

struct PailAsyncContext {
    port: u16,
    store: Arc<MemStore>,
    shutdown: Sender<()>,
    join: JoinHandle<()>,
}

impl AsyncTestContext for PailAsyncContext {
    async fn setup() -> PailAsyncContext {
        let store = Arc::new(MemStore::default());
        let (port, shutdown, join) = spawn_server(store.clone()).await;
        PailAsyncContext {
            port,
            store,
            shutdown,
            join,
        }
    }

    async fn teardown(self) {
        self.shutdown.send(()).unwrap_or_default();
        self.join.await.unwrap_or_default();
    }
}

impl PailAsyncContext {
    fn url(&self, path: &str) -> String {
        format!("http://localhost:{}{path}", self.port)
    }

    async fn seed(&self, key: &str, size: usize) {
        self.store
            .put(NewObject {
                key: key.to_string(),
                content_type: "application/octet-stream".to_string(),
                original_name: server::keys::display_name(key),
                uploaded_at: Utc::now(),
                body: vec![0u8; size],
            })
            .await
            .unwrap();
    }
}

fn text_file_form(name: &str, content: &[u8]) -> Form {
    let part = Part::bytes(content.to_vec())
        .file_name(name.to_string())
        .mime_str("text/plain")
        .unwrap();
    Form::new().part("file", part)
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn health_reports_liveness(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();

    // Act
    let response = client.get(ctx.url("/health")).send().await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: HealthResponse = response.json().await.unwrap();
    assert_eq!(body.status, "Server is running!");
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_returns_prefixed_key_and_download_link(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let form = text_file_form("a.txt", b"0123456789");

    // Act
    let response = client
        .post(ctx.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: UploadResponse = response.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.name, "a.txt");
    assert_eq!(body.size, 10);
    assert!(body.key.starts_with(KEY_PREFIX));
    assert!(body.key.ends_with("-a.txt"));

    // uploads/<digits>-<alnum>-a.txt
    let rest = body.key.strip_prefix(KEY_PREFIX).unwrap();
    let mut segments = rest.splitn(3, '-');
    assert!(segments.next().unwrap().chars().all(|c| c.is_ascii_digit()));
    assert!(segments.next().unwrap().chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(segments.next().unwrap(), "a.txt");

    assert!(body.download_url.contains(&body.key));
    assert!(ctx.store.contains(&body.key));
    assert_eq!(ctx.store.original_name(&body.key).unwrap(), "a.txt");
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_without_file_field_is_rejected(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let form = Form::new().text("comment", "no file here");

    // Act
    let response = client
        .post(ctx.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "No file uploaded");
    assert_eq!(ctx.store.put_count(), 0);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn garbled_multipart_body_is_reported_as_malformed(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();

    // Act: multipart content type, body without any boundary in it
    let response = client
        .post(ctx.url("/api/upload"))
        .header("content-type", "multipart/form-data; boundary=oops")
        .body("definitely not a multipart payload")
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert!(body.error.starts_with("Malformed upload body"));
    assert_eq!(ctx.store.put_count(), 0);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_over_size_limit_never_reaches_the_store(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let form = text_file_form("big.bin", &vec![0u8; MAX_UPLOAD_BYTES + 1]);

    // Act
    let result = client
        .post(ctx.url("/api/upload"))
        .multipart(form)
        .send()
        .await;

    // Assert: the server may cut the connection before the body is fully
    // written, so a transport error is as valid as a 413 response.
    if let Ok(response) = result {
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
    assert_eq!(ctx.store.put_count(), 0);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_url_issues_short_lived_put_link(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();

    // Act
    let response = client
        .post(ctx.url("/api/upload-url"))
        .json(&serde_json::json!({
            "fileName": "b.bin",
            "fileType": "application/octet-stream",
            "fileSize": 42
        }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: UploadUrlResponse = response.json().await.unwrap();
    assert!(body.key.starts_with(KEY_PREFIX));
    assert!(body.key.ends_with("-b.bin"));
    assert!(body.upload_url.contains("X-Amz-Expires=300"));
    // no bytes were touched
    assert_eq!(ctx.store.put_count(), 0);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_url_requires_name_and_type(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();

    // Act
    let response = client
        .post(ctx.url("/api/upload-url"))
        .json(&serde_json::json!({ "fileName": "b.bin" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "fileName and fileType are required");
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn list_respects_limit_and_reports_truncation(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    for i in 0..5 {
        ctx.seed(&format!("uploads/170000000000{i}-abc123-f{i}.txt"), i + 1)
            .await;
    }

    // Act
    let page: ListResponse = client
        .get(ctx.url("/api/files?limit=3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let full: ListResponse = client
        .get(ctx.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(page.count, 3);
    assert_eq!(page.files.len(), 3);
    assert!(page.is_truncated);
    assert_eq!(full.count, 5);
    assert!(!full.is_truncated);
    assert!(full.files.iter().all(|f| f.download_url.contains("X-Amz-Expires=3600")));
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn download_urls_are_fresh_per_call(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let key = "uploads/1700000000000-abc123-a.txt";
    ctx.seed(key, 10).await;

    // Act
    let first: DownloadUrlResponse = client
        .post(ctx.url("/api/download-url"))
        .json(&serde_json::json!({ "key": key }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: DownloadUrlResponse = client
        .post(ctx.url("/api/download-url"))
        .json(&serde_json::json!({ "key": key }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(first.key, key);
    assert_ne!(first.download_url, second.download_url);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn download_url_requires_a_key(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();

    // Act
    let response = client
        .post(ctx.url("/api/download-url"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "File key is required");
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn delete_outside_managed_prefix_is_forbidden(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let key = format!("private/{}.txt", Uuid::new_v4());

    // Act
    let response = client
        .delete(ctx.url(&format!("/api/files/{}", encode(&key))))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: ErrorBody = response.json().await.unwrap();
    assert!(body.error.contains("uploads/"));
    // no store mutation happened
    assert_eq!(ctx.store.delete_count(), 0);
    assert_eq!(ctx.store.put_count(), 0);
}

#[test_context(PailAsyncContext)]
#[tokio::test]
#[serial]
async fn upload_list_delete_round_trip(ctx: &mut PailAsyncContext) {
    // Arrange
    let client = Client::new();
    let form = text_file_form("a.txt", b"0123456789");

    // Act: upload
    let uploaded: UploadResponse = client
        .post(ctx.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert: the listing recovers the original name and size
    let listing: ListResponse = client
        .get(ctx.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = listing
        .files
        .iter()
        .find(|f| f.key == uploaded.key)
        .expect("uploaded file missing from listing");
    assert_eq!(entry.name, "a.txt");
    assert_eq!(entry.size, 10);

    // Act: delete
    let deleted = client
        .delete(ctx.url(&format!("/api/files/{}", encode(&uploaded.key))))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    let deleted: DeleteResponse = deleted.json().await.unwrap();
    assert_eq!(deleted.key, uploaded.key);

    // Assert: gone from the listing
    let listing: ListResponse = client
        .get(ctx.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listing.files.iter().all(|f| f.key != uploaded.key));

    // A second delete of the same key reports success-of-no-op
    let again = client
        .delete(ctx.url(&format!("/api/files/{}", encode(&uploaded.key))))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);
}

#[serial]
#[tokio::test]
async fn presign_failure_after_put_fails_the_upload_and_keeps_the_object() {
    // Arrange
    let store = Arc::new(SignerDownStore::default());
    let (port, shutdown, join) = spawn_server(store.clone()).await;
    let client = Client::new();

    // Act
    let response = client
        .post(format!("http://localhost:{port}/api/upload"))
        .multipart(text_file_form("a.txt", b"0123456789"))
        .send()
        .await
        .unwrap();

    // Assert: the request fails even though the put went through
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Failed to upload file");
    assert_eq!(body.details.as_deref(), Some("signer offline"));

    // the orphan object stays in the store
    assert_eq!(store.inner.put_count(), 1);
    assert_eq!(store.inner.objects.lock().unwrap().len(), 1);

    shutdown.send(()).unwrap_or_default();
    join.await.unwrap_or_default();
}

#[serial]
#[tokio::test]
async fn store_failures_surface_as_server_errors() {
    // Arrange
    let (port, shutdown, join) = spawn_server(Arc::new(BrokenStore)).await;
    let client = Client::new();

    // Act
    let listing = client
        .get(format!("http://localhost:{port}/api/files"))
        .send()
        .await
        .unwrap();
    let upload = client
        .post(format!("http://localhost:{port}/api/upload"))
        .multipart(text_file_form("a.txt", b"0123456789"))
        .send()
        .await
        .unwrap();

    // Assert: backend message passed through in details
    assert_eq!(listing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = listing.json().await.unwrap();
    assert_eq!(body.error, "Failed to list files");
    assert_eq!(body.details.as_deref(), Some("bucket offline"));

    assert_eq!(upload.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = upload.json().await.unwrap();
    assert_eq!(body.error, "Failed to upload file");

    shutdown.send(()).unwrap_or_default();
    join.await.unwrap_or_default();
}
