//! Storage service backends
//!
//! The runner talks to the object store only through [`StorageBackend`].
//! Each backend is responsible for:
//! - Sending one upload or download request per call
//! - Attaching or validating checksums when the workload asks for them
//! - Streaming downloaded bytes into the requested [`DownloadSink`]
//!
//! # Available Backends
//!
//! - [`s3`]: Amazon S3 (or an S3-compatible endpoint) via `aws-sdk-s3`
//! - [`memory`]: in-process simulated object store for smoke runs and tests

pub mod memory;
pub mod s3;

use anyhow::{Context, Result};
use async_trait::async_trait;
use benchrunner::{ChecksumAlgorithm, WorkloadConfig};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Where an upload's payload comes from
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Slice of the shared in-memory buffer
    Memory(Bytes),
    /// Local file to stream from
    File(PathBuf),
}

/// Where a download's payload goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSink {
    /// Bytes are counted and thrown away
    Discard,
    /// Bytes are written to this file, replacing any existing content
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub key: String,
    pub size: u64,
    pub source: UploadSource,
    /// Algorithm for a trailing checksum, if any
    pub checksum: Option<ChecksumAlgorithm>,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub key: String,
    pub sink: DownloadSink,
    /// Ask the service for a checksum and validate it on receipt
    pub validate_checksum: bool,
}

/// Common interface for object store clients
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Check whether this backend can express every task of `workload`
    ///
    /// Returns a reason when it can't; the runner reports that as a skip.
    fn unsupported_reason(&self, _workload: &WorkloadConfig) -> Option<String> {
        None
    }

    /// Upload one object
    async fn upload(&self, request: UploadRequest) -> Result<()>;

    /// Download one object, returning the number of bytes received
    async fn download(&self, request: DownloadRequest) -> Result<u64>;
}

/// Writes downloaded chunks to a [`DownloadSink`]
pub struct SinkWriter {
    file: Option<tokio::io::BufWriter<tokio::fs::File>>,
    written: u64,
}

impl SinkWriter {
    pub async fn open(sink: &DownloadSink) -> Result<Self> {
        let file = match sink {
            DownloadSink::Discard => None,
            DownloadSink::File(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("failed creating file: {}", path.display()))?;
                Some(tokio::io::BufWriter::new(file))
            }
        };
        Ok(SinkWriter { file, written: 0 })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(file) = &mut self.file {
            file.write_all(chunk)
                .await
                .context("failed writing downloaded data")?;
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and return the total number of bytes written
    pub async fn finish(mut self) -> Result<u64> {
        if let Some(file) = &mut self.file {
            file.flush().await.context("failed flushing downloaded file")?;
        }
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discard_sink_counts_bytes() {
        let mut writer = SinkWriter::open(&DownloadSink::Discard).await.unwrap();
        writer.write(&[0u8; 100]).await.unwrap();
        writer.write(&[1u8; 28]).await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 128);
    }

    #[tokio::test]
    async fn test_file_sink_writes_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        std::fs::write(&path, vec![9u8; 4096]).unwrap();

        let mut writer = SinkWriter::open(&DownloadSink::File(path.clone()))
            .await
            .unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 11);

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_file_sink_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/obj");
        let result = SinkWriter::open(&DownloadSink::File(path)).await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("failed creating file"));
    }
}
