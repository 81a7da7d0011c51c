//! In-process simulated object store
//!
//! Behaves like a remote service with a fixed per-request latency. Objects
//! live in a map, any key can be made to fail, and atomic counters track how
//! many requests were in flight at once.

use super::{DownloadRequest, SinkWriter, StorageBackend, UploadRequest, UploadSource};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use benchrunner::{TaskAction, WorkloadConfig};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Size of the chunks downloads are delivered in
const CHUNK_SIZE: usize = 64 * 1024;

/// Request counters, updated lock-free from every in-flight request
#[derive(Debug, Default)]
pub struct MemoryBackendStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pub uploads: AtomicU64,
    pub downloads: AtomicU64,
    pub failures: AtomicU64,
}

impl MemoryBackendStats {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of requests ever in flight at the same moment
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { stats: self }
    }
}

struct InFlightGuard<'a> {
    stats: &'a MemoryBackendStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    latency: Duration,
    objects: Mutex<HashMap<String, Bytes>>,
    failing_keys: Mutex<HashSet<String>>,
    request_log: Mutex<Vec<String>>,
    stats: MemoryBackendStats,
}

impl MemoryBackend {
    pub fn new(latency: Duration) -> Self {
        MemoryBackend {
            latency,
            ..Default::default()
        }
    }

    /// Store an object of `size` zero bytes under `key`
    pub fn put_object(&self, key: impl Into<String>, size: usize) {
        self.objects
            .lock()
            .insert(key.into(), Bytes::from(vec![0u8; size]));
    }

    /// Create every object the workload's downloads expect to find
    pub fn seed_workload(&self, workload: &WorkloadConfig) {
        let mut objects = self.objects.lock();
        for task in workload.tasks() {
            if task.action == TaskAction::Download {
                objects
                    .entry(task.key.clone())
                    .or_insert_with(|| Bytes::from(vec![0u8; task.size as usize]));
            }
        }
    }

    /// Make every request for `key` fail
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.lock().insert(key.into());
    }

    pub fn object_size(&self, key: &str) -> Option<usize> {
        self.objects.lock().get(key).map(Bytes::len)
    }

    /// Keys in the order their requests arrived
    pub fn request_log(&self) -> Vec<String> {
        self.request_log.lock().clone()
    }

    pub fn stats(&self) -> &MemoryBackendStats {
        &self.stats
    }

    fn check_failure(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().contains(key) {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            bail!("InternalError: simulated failure for key {key}");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, request: UploadRequest) -> Result<()> {
        let _guard = self.stats.enter();
        self.request_log.lock().push(request.key.clone());

        let data = match request.source {
            UploadSource::Memory(bytes) => bytes,
            UploadSource::File(path) => Bytes::from(
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed reading file: {}", path.display()))?,
            ),
        };
        if data.len() as u64 != request.size {
            bail!(
                "upload body is {} bytes but Content-Length is {}",
                data.len(),
                request.size
            );
        }

        tokio::time::sleep(self.latency).await;
        self.check_failure(&request.key)?;

        self.objects.lock().insert(request.key, data);
        self.stats.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn download(&self, request: DownloadRequest) -> Result<u64> {
        let _guard = self.stats.enter();
        self.request_log.lock().push(request.key.clone());

        tokio::time::sleep(self.latency).await;
        self.check_failure(&request.key)?;

        let Some(data) = self.objects.lock().get(&request.key).cloned() else {
            bail!("NoSuchKey: {}", request.key);
        };

        let mut writer = SinkWriter::open(&request.sink).await?;
        for chunk in data.chunks(CHUNK_SIZE) {
            writer.write(chunk).await?;
        }
        let received = writer.finish().await?;
        self.stats.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DownloadSink;

    fn upload(key: &str, data: &'static [u8]) -> UploadRequest {
        UploadRequest {
            key: key.to_string(),
            size: data.len() as u64,
            source: UploadSource::Memory(Bytes::from_static(data)),
            checksum: None,
        }
    }

    fn download(key: &str) -> DownloadRequest {
        DownloadRequest {
            key: key.to_string(),
            sink: DownloadSink::Discard,
            validate_checksum: false,
        }
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let backend = MemoryBackend::new(Duration::ZERO);
        backend.upload(upload("k", b"abcdef")).await.unwrap();

        assert_eq!(backend.object_size("k"), Some(6));
        assert_eq!(backend.download(download("k")).await.unwrap(), 6);
        assert_eq!(backend.stats().uploads.load(Ordering::Relaxed), 1);
        assert_eq!(backend.stats().downloads.load(Ordering::Relaxed), 1);
        assert_eq!(backend.request_log(), vec!["k", "k"]);
        assert_eq!(backend.stats().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_fails() {
        let backend = MemoryBackend::new(Duration::ZERO);
        let err = backend.download(download("nope")).await.unwrap_err();
        assert!(err.to_string().contains("NoSuchKey"));
        assert_eq!(backend.stats().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_size_mismatch_rejected() {
        let backend = MemoryBackend::new(Duration::ZERO);
        let mut request = upload("k", b"abc");
        request.size = 10;
        let err = backend.upload(request).await.unwrap_err();
        assert!(err.to_string().contains("Content-Length"));
        assert_eq!(backend.object_size("k"), None);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = MemoryBackend::new(Duration::ZERO);
        backend.put_object("bad", 10);
        backend.fail_key("bad");

        assert!(backend.download(download("bad")).await.is_err());
        assert!(backend.upload(upload("bad", b"x")).await.is_err());
        assert_eq!(backend.stats().failures.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_seed_workload_creates_download_objects() {
        let workload = WorkloadConfig::builder()
            .task(TaskAction::Download, "d/1", 100_000)
            .task(TaskAction::Upload, "u/1", 5)
            .build();
        let backend = MemoryBackend::new(Duration::ZERO);
        backend.seed_workload(&workload);

        assert_eq!(backend.object_size("d/1"), Some(100_000));
        assert_eq!(backend.object_size("u/1"), None);
        assert_eq!(backend.download(download("d/1")).await.unwrap(), 100_000);
    }

    #[tokio::test]
    async fn test_peak_in_flight_tracks_concurrency() {
        let backend = std::sync::Arc::new(MemoryBackend::new(Duration::from_millis(20)));
        backend.put_object("k", 1);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend.download(download("k")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(backend.stats().peak_in_flight(), 4);
        assert_eq!(backend.stats().in_flight(), 0);
    }
}
