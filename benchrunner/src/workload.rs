//! Workload description loading
//!
//! A workload is a JSON document describing an ordered list of transfer tasks
//! plus the policy for repeating them. Only schema version
//! [`SUPPORTED_VERSION`] is understood; any other version is reported as
//! [`WorkloadError::UnsupportedVersion`], which callers treat as "skip this
//! benchmark" rather than as a failure.
//!
//! # Example
//!
//! ```
//! use benchrunner::{TaskAction, WorkloadConfig};
//!
//! let json = r#"{
//!     "version": 2,
//!     "filesOnDisk": false,
//!     "checksum": null,
//!     "maxRepeatCount": 10,
//!     "maxRepeatSecs": 600,
//!     "tasks": [
//!         {"action": "upload", "key": "upload/5GiB-1x/1", "size": 5368709120}
//!     ]
//! }"#;
//!
//! let workload = WorkloadConfig::from_json(json).unwrap();
//! assert_eq!(workload.tasks()[0].action, TaskAction::Upload);
//! assert_eq!(workload.bytes_per_run(), 5_368_709_120);
//! ```

use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The only workload schema version this crate understands
pub const SUPPORTED_VERSION: u64 = 2;

/// Errors that can occur while loading a workload
#[derive(Debug)]
pub enum WorkloadError {
    /// The workload file couldn't be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Required fields are missing, have the wrong type, or are out of range
    Malformed(String),
    /// The document's `version` is not [`SUPPORTED_VERSION`]
    UnsupportedVersion(u64),
}

impl WorkloadError {
    /// Whether this error means "skip the benchmark" rather than "fail"
    pub fn is_skip(&self) -> bool {
        matches!(self, WorkloadError::UnsupportedVersion(_))
    }
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadError::Io { path, source } => {
                write!(f, "failed reading workload '{}': {source}", path.display())
            }
            WorkloadError::Malformed(msg) => write!(f, "malformed workload: {msg}"),
            WorkloadError::UnsupportedVersion(v) => {
                write!(f, "workload version not supported: {v}")
            }
        }
    }
}

impl Error for WorkloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkloadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// What a task does with its object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Upload,
    Download,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Upload => "upload",
            TaskAction::Download => "download",
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checksum algorithm named by the workload's `checksum` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChecksumAlgorithm {
    #[serde(rename = "CRC32")]
    Crc32,
    #[serde(rename = "CRC32C")]
    Crc32c,
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Crc32 => "CRC32",
            ChecksumAlgorithm::Crc32c => "CRC32C",
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Sha256 => "SHA256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload or download of a single object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskConfig {
    pub action: TaskAction,
    /// Object key, and also the relative file path when files are on disk
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// Raw document shape, validated before becoming a [`WorkloadConfig`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadDocument {
    files_on_disk: bool,
    #[serde(default)]
    checksum: Option<ChecksumAlgorithm>,
    max_repeat_count: u32,
    max_repeat_secs: f64,
    tasks: Vec<TaskConfig>,
}

/// A loaded workload
///
/// Immutable once built. The total number of bytes moved by one repeat is
/// computed at construction, so [`bytes_per_run`](Self::bytes_per_run) is O(1).
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    files_on_disk: bool,
    checksum: Option<ChecksumAlgorithm>,
    max_repeat_count: u32,
    max_repeat_secs: Duration,
    tasks: Vec<TaskConfig>,
    bytes_per_run: u64,
}

impl WorkloadConfig {
    /// Load a workload from a JSON file
    ///
    /// # Errors
    ///
    /// - [`WorkloadError::Io`] if the file can't be read
    /// - [`WorkloadError::UnsupportedVersion`] if `version` isn't 2
    /// - [`WorkloadError::Malformed`] for anything else wrong with the document
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WorkloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a workload from JSON text
    ///
    /// The version is checked before the rest of the document, so a document
    /// written against a different schema reports `UnsupportedVersion`
    /// instead of a confusing field error.
    pub fn from_json(text: &str) -> Result<Self, WorkloadError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| WorkloadError::Malformed(format!("invalid JSON: {e}")))?;

        let version = value
            .get("version")
            .ok_or_else(|| WorkloadError::Malformed("missing field `version`".to_string()))?
            .as_u64()
            .ok_or_else(|| {
                WorkloadError::Malformed("`version` must be a non-negative integer".to_string())
            })?;
        if version != SUPPORTED_VERSION {
            return Err(WorkloadError::UnsupportedVersion(version));
        }

        let doc: WorkloadDocument =
            serde_json::from_value(value).map_err(|e| WorkloadError::Malformed(e.to_string()))?;

        if doc.max_repeat_count == 0 {
            return Err(WorkloadError::Malformed(
                "`maxRepeatCount` must be positive".to_string(),
            ));
        }
        let max_repeat_secs = Duration::try_from_secs_f64(doc.max_repeat_secs).map_err(|_| {
            WorkloadError::Malformed(format!(
                "`maxRepeatSecs` must be a non-negative number of seconds, got {}",
                doc.max_repeat_secs
            ))
        })?;

        let bytes_per_run = total_size(&doc.tasks).ok_or_else(|| {
            WorkloadError::Malformed("total task size overflows u64".to_string())
        })?;

        Ok(Self::new(
            doc.files_on_disk,
            doc.checksum,
            doc.max_repeat_count,
            max_repeat_secs,
            doc.tasks,
            bytes_per_run,
        ))
    }

    /// Start building a workload in code
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder::default()
    }

    fn new(
        files_on_disk: bool,
        checksum: Option<ChecksumAlgorithm>,
        max_repeat_count: u32,
        max_repeat_secs: Duration,
        tasks: Vec<TaskConfig>,
        bytes_per_run: u64,
    ) -> Self {
        WorkloadConfig {
            files_on_disk,
            checksum,
            max_repeat_count,
            max_repeat_secs,
            tasks,
            bytes_per_run,
        }
    }

    /// Whether payloads are read from and written to local files
    pub fn files_on_disk(&self) -> bool {
        self.files_on_disk
    }

    pub fn checksum(&self) -> Option<ChecksumAlgorithm> {
        self.checksum
    }

    pub fn max_repeat_count(&self) -> u32 {
        self.max_repeat_count
    }

    pub fn max_repeat_secs(&self) -> Duration {
        self.max_repeat_secs
    }

    pub fn tasks(&self) -> &[TaskConfig] {
        &self.tasks
    }

    /// Sum of all task sizes
    pub fn bytes_per_run(&self) -> u64 {
        self.bytes_per_run
    }

    /// Size of the largest upload task, or 0 if there are none
    pub fn max_upload_size(&self) -> u64 {
        self.tasks
            .iter()
            .filter(|t| t.action == TaskAction::Upload)
            .map(|t| t.size)
            .max()
            .unwrap_or(0)
    }
}

/// Sum of task sizes, or `None` if it doesn't fit in a `u64`
fn total_size(tasks: &[TaskConfig]) -> Option<u64> {
    tasks.iter().try_fold(0u64, |total, t| total.checked_add(t.size))
}

/// Builder for [`WorkloadConfig`]
///
/// # Example
///
/// ```
/// use benchrunner::{ChecksumAlgorithm, TaskAction, WorkloadConfig};
/// use std::time::Duration;
///
/// let workload = WorkloadConfig::builder()
///     .checksum(Some(ChecksumAlgorithm::Crc32))
///     .max_repeat_count(3)
///     .max_repeat_secs(Duration::from_secs(60))
///     .task(TaskAction::Upload, "a", 100)
///     .task(TaskAction::Download, "b", 200)
///     .build();
///
/// assert_eq!(workload.bytes_per_run(), 300);
/// ```
#[derive(Debug, Clone)]
pub struct WorkloadBuilder {
    files_on_disk: bool,
    checksum: Option<ChecksumAlgorithm>,
    max_repeat_count: u32,
    max_repeat_secs: Duration,
    tasks: Vec<TaskConfig>,
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        WorkloadBuilder {
            files_on_disk: false,
            checksum: None,
            max_repeat_count: 1,
            max_repeat_secs: Duration::from_secs(600),
            tasks: Vec::new(),
        }
    }
}

impl WorkloadBuilder {
    pub fn files_on_disk(mut self, files_on_disk: bool) -> Self {
        self.files_on_disk = files_on_disk;
        self
    }

    pub fn checksum(mut self, checksum: Option<ChecksumAlgorithm>) -> Self {
        self.checksum = checksum;
        self
    }

    /// Upper bound on repeats; clamped to at least 1
    pub fn max_repeat_count(mut self, count: u32) -> Self {
        self.max_repeat_count = count.max(1);
        self
    }

    pub fn max_repeat_secs(mut self, secs: Duration) -> Self {
        self.max_repeat_secs = secs;
        self
    }

    pub fn task(mut self, action: TaskAction, key: impl Into<String>, size: u64) -> Self {
        self.tasks.push(TaskConfig {
            action,
            key: key.into(),
            size,
        });
        self
    }

    /// Finish the workload; a total size beyond `u64::MAX` saturates
    pub fn build(self) -> WorkloadConfig {
        let bytes_per_run = total_size(&self.tasks).unwrap_or(u64::MAX);
        WorkloadConfig::new(
            self.files_on_disk,
            self.checksum,
            self.max_repeat_count,
            self.max_repeat_secs,
            self.tasks,
            bytes_per_run,
        )
    }
}

/// Short name for a workload file: "path/to/download-5GiB.run.json" -> "download-5GiB"
pub fn workload_name(path: &Path) -> &str {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    file_name.split('.').next().unwrap_or(file_name)
}
