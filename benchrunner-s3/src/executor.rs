//! Transfer request executor
//!
//! Turns one [`TaskConfig`] into one backend request running on its own
//! tokio task. The caller hands over a [`GatePermit`] with each dispatch;
//! the spawned task owns it and drops it when the transfer ends, so the
//! acquire/release pairing holds on the success path, the error path, and
//! even if the transfer panics.

use crate::backend::{DownloadRequest, DownloadSink, StorageBackend, UploadRequest, UploadSource};
use crate::error::TransferError;
use crate::gate::GatePermit;
use anyhow::{Context, anyhow, bail};
use benchrunner::{TaskAction, TaskConfig, WorkloadConfig};
use bytes::Bytes;
use futures::FutureExt;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context as TaskContext, Poll};
use tokio::task::JoinHandle;

/// Issues transfers for the tasks of one workload
///
/// Cheap to clone; clones share the backend, workload, and upload buffer.
#[derive(Clone)]
pub struct TransferExecutor {
    backend: Arc<dyn StorageBackend>,
    workload: Arc<WorkloadConfig>,
    /// Shared source for every in-memory upload, sized to the largest one
    upload_buffer: Bytes,
    files_dir: PathBuf,
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferExecutor")
            .field("backend", &self.backend.name())
            .field("tasks", &self.workload.tasks().len())
            .field("upload_buffer_len", &self.upload_buffer.len())
            .field("files_dir", &self.files_dir)
            .finish()
    }
}

/// Random bytes to upload from when files aren't on disk
fn random_upload_buffer(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(0x5333_4265_6e63_6821).fill_bytes(&mut data);
    Bytes::from(data)
}

impl TransferExecutor {
    /// Create an executor; `files_dir` is the root that task keys are relative to
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        workload: Arc<WorkloadConfig>,
        files_dir: impl Into<PathBuf>,
    ) -> Self {
        let upload_buffer = if workload.files_on_disk() {
            Bytes::new()
        } else {
            random_upload_buffer(workload.max_upload_size() as usize)
        };

        TransferExecutor {
            backend,
            workload,
            upload_buffer,
            files_dir: files_dir.into(),
        }
    }

    pub fn workload(&self) -> &WorkloadConfig {
        &self.workload
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn upload_buffer_len(&self) -> usize {
        self.upload_buffer.len()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.files_dir.join(key)
    }

    /// Untimed work between runs
    ///
    /// When files are on disk: removes download targets left by the last run
    /// (an overwrite can be slower than a fresh write), creates missing
    /// directories for downloads, and checks every upload source exists.
    pub async fn prepare_run(&self) -> anyhow::Result<()> {
        if !self.workload.files_on_disk() {
            return Ok(());
        }

        for task in self.workload.tasks() {
            let path = self.path_for(&task.key);
            match task.action {
                TaskAction::Download => {
                    let exists = tokio::fs::try_exists(&path).await.with_context(|| {
                        format!("failed checking for previous download: {}", path.display())
                    })?;
                    if exists {
                        tokio::fs::remove_file(&path).await.with_context(|| {
                            format!("failed removing file from previous run: {}", path.display())
                        })?;
                    } else if let Some(dir) = path.parent() {
                        tokio::fs::create_dir_all(dir).await.with_context(|| {
                            format!("failed creating directory: {}", dir.display())
                        })?;
                    }
                }
                TaskAction::Upload => {
                    let is_file = tokio::fs::metadata(&path)
                        .await
                        .map(|m| m.is_file())
                        .unwrap_or(false);
                    if !is_file {
                        bail!("file not found: {}", path.display());
                    }
                }
            }
        }

        Ok(())
    }

    /// Start task `task_index` in the background
    ///
    /// `permit` is released when the transfer finishes. On failure or panic
    /// `failed` is raised before the permit goes back, so a dispatcher
    /// waiting on the gate sees the flag as soon as it gets the slot.
    pub fn dispatch(
        &self,
        task_index: usize,
        permit: GatePermit,
        failed: Arc<AtomicBool>,
    ) -> TransferHandle {
        let task = &self.workload.tasks()[task_index];
        let action = task.action;
        let key = task.key.clone();

        let executor = self.clone();
        let panic_key = key.clone();
        let inner = tokio::spawn(async move {
            let result = match AssertUnwindSafe(executor.transfer(task_index))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => Err(TransferError {
                    task_index,
                    action,
                    key: panic_key,
                    source: anyhow!("transfer panicked: {}", panic_message(payload.as_ref())),
                }),
            };
            if let Err(e) = &result {
                failed.store(true, Ordering::Release);
                tracing::error!("{e}");
            }
            drop(permit);
            result
        });

        TransferHandle {
            task_index,
            action,
            key,
            inner,
        }
    }

    /// Run task `task_index` to completion on the current task
    pub async fn transfer(&self, task_index: usize) -> Result<(), TransferError> {
        let task = &self.workload.tasks()[task_index];
        let result = match task.action {
            TaskAction::Upload => self.upload(task).await,
            TaskAction::Download => self.download(task).await,
        };

        result.map_err(|source| TransferError {
            task_index,
            action: task.action,
            key: task.key.clone(),
            source,
        })
    }

    async fn upload(&self, task: &TaskConfig) -> anyhow::Result<()> {
        let source = if self.workload.files_on_disk() {
            UploadSource::File(self.path_for(&task.key))
        } else {
            UploadSource::Memory(self.upload_buffer.slice(0..task.size as usize))
        };

        tracing::trace!("upload {} ({} bytes)", task.key, task.size);
        self.backend
            .upload(UploadRequest {
                key: task.key.clone(),
                size: task.size,
                source,
                checksum: self.workload.checksum(),
            })
            .await
    }

    async fn download(&self, task: &TaskConfig) -> anyhow::Result<()> {
        let sink = if self.workload.files_on_disk() {
            let path = self.path_for(&task.key);
            ensure_parent_dir(&path).await?;
            DownloadSink::File(path)
        } else {
            DownloadSink::Discard
        };

        tracing::trace!("download {} ({} bytes)", task.key, task.size);
        let received = self
            .backend
            .download(DownloadRequest {
                key: task.key.clone(),
                sink,
                validate_checksum: self.workload.checksum().is_some(),
            })
            .await?;

        if received != task.size {
            bail!(
                "downloaded {} bytes but expected {} bytes",
                received,
                task.size
            );
        }
        Ok(())
    }
}

async fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed creating directory: {}", dir.display()))?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

/// Completion signal for one dispatched transfer
#[derive(Debug)]
pub struct TransferHandle {
    task_index: usize,
    action: TaskAction,
    key: String,
    inner: JoinHandle<Result<(), TransferError>>,
}

impl TransferHandle {
    pub fn task_index(&self) -> usize {
        self.task_index
    }
}

impl Future for TransferHandle {
    type Output = Result<(), TransferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => Poll::Ready(Err(TransferError {
                task_index: self.task_index,
                action: self.action,
                key: self.key.clone(),
                source: anyhow!("transfer task panicked: {join_error}"),
            })),
        }
    }
}
