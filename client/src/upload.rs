use crate::{ClientError, StoreClient};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use kernel::UploadResponse;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// State of one file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Complete,
    Error,
}

/// Transient per-file record, discarded once the whole batch settles.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub file_name: String,
    /// 0-100
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
}

/// Percentage callback fed by transport-level progress events.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Receives a snapshot of every task after each state change.
pub type Observer = Arc<dyn Fn(&HashMap<String, UploadTask>) + Send + Sync>;

/// The transfer itself, behind a seam so the sequencing logic is testable
/// without a server.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Transfers one file, reporting percentage milestones through
    /// `on_progress`, and returns the storage key on success.
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        on_progress: ProgressFn,
    ) -> Result<String, ClientError>;
}

/// Uploads `files` strictly one at a time.
///
/// Every task change hands the observer a snapshot of all task states. One
/// file failing does not stop the rest; its task ends in
/// [`UploadStatus::Error`] while the others are unaffected. Returns the
/// final task map exactly once, after all files have settled.
pub async fn upload_files<B: UploadBackend>(
    backend: &B,
    files: &[PathBuf],
    observer: Observer,
) -> HashMap<String, UploadTask> {
    let tasks: Arc<Mutex<HashMap<String, UploadTask>>> = Arc::default();

    let names: Vec<String> = files.iter().map(|p| task_name(p)).collect();
    {
        let mut guard = tasks.lock().unwrap();
        for name in &names {
            guard.insert(
                name.clone(),
                UploadTask {
                    file_name: name.clone(),
                    progress: 0,
                    status: UploadStatus::Uploading,
                    error: None,
                },
            );
        }
        observer(&guard);
    }

    for (path, name) in files.iter().zip(&names) {
        let on_progress: ProgressFn = {
            let tasks = tasks.clone();
            let observer = observer.clone();
            let name = name.clone();
            Arc::new(move |pct| {
                let mut guard = tasks.lock().unwrap();
                if let Some(task) = guard.get_mut(&name) {
                    task.progress = pct.min(100);
                }
                observer(&guard);
            })
        };

        let outcome = backend.upload(path, name, on_progress).await;

        let mut guard = tasks.lock().unwrap();
        if let Some(task) = guard.get_mut(name) {
            match outcome {
                Ok(_key) => {
                    task.progress = 100;
                    task.status = UploadStatus::Complete;
                }
                Err(e) => {
                    task.progress = 0;
                    task.status = UploadStatus::Error;
                    task.error = Some(e.to_string());
                }
            }
        }
        observer(&guard);
    }

    let guard = tasks.lock().unwrap();
    guard.clone()
}

/// Display name of a path, falling back to the full path text.
pub fn task_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Body stream wrapper that counts sent bytes and reports percentages.
struct ProgressStream<S> {
    inner: S,
    sent: u64,
    total: u64,
    last: u8,
    on_progress: ProgressFn,
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            this.sent += chunk.len() as u64;
            let pct = if this.total == 0 {
                100
            } else {
                ((this.sent * 100) / this.total).min(100) as u8
            };
            if pct != this.last {
                this.last = pct;
                (this.on_progress)(pct);
            }
        }
        polled
    }
}

#[async_trait]
impl UploadBackend for StoreClient {
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        on_progress: ProgressFn,
    ) -> Result<String, ClientError> {
        let file = File::open(path).await?;
        let total = file.metadata().await?.len();
        let stream = ProgressStream {
            inner: ReaderStream::new(file),
            sent: 0,
            total,
            last: 0,
            on_progress,
        };
        let part =
            reqwest::multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
                .file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .transfer
            .post(self.endpoint.upload())
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = crate::decode(response).await?;
        Ok(uploaded.key)
    }
}
