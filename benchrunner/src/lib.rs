//! # benchrunner
//!
//! Workload model and throughput math shared by the S3 benchmark runners.
//!
//! ## Overview
//!
//! A benchmark is described by a workload file: an ordered list of upload and
//! download tasks, a checksum policy, and a budget for how many times (and for
//! how long) the whole list is repeated. This crate knows how to:
//! - **Load workloads**: parse and validate the JSON description ([`WorkloadConfig`])
//! - **Compute throughput**: turn bytes moved and elapsed time into rates ([`aggregate`])
//! - **Report runs**: format the per-run line that metrics tooling greps for ([`RunRecord`])
//! - **Summarize**: median/mean/min/max/variance across all runs ([`RunSummary`])
//!
//! It has no async runtime and performs no transfers; `benchrunner-s3` drives
//! the actual requests.
//!
//! ## Quick Start
//!
//! ```
//! use benchrunner::{RunRecord, WorkloadConfig, TaskAction};
//! use std::time::Duration;
//!
//! let workload = WorkloadConfig::builder()
//!     .max_repeat_count(3)
//!     .task(TaskAction::Download, "download/1GiB-1x/1", 1 << 30)
//!     .build();
//!
//! // Pretend the transfer took 2 seconds
//! let record = RunRecord::new(1, workload.bytes_per_run(), Duration::from_secs(2));
//! assert!(record.to_string().starts_with("Run:1 Secs:2.000000 Gb/s:4.294967"));
//! ```
//!
//! ## Workload Format
//!
//! ```json
//! {
//!   "version": 2,
//!   "filesOnDisk": true,
//!   "checksum": "CRC32",
//!   "maxRepeatCount": 10,
//!   "maxRepeatSecs": 600,
//!   "tasks": [
//!     {"action": "download", "key": "download/256KiB-10_000x/00001", "size": 262144}
//!   ]
//! }
//! ```
//!
//! `checksum` may be `null` or one of `CRC32`, `CRC32C`, `SHA1`, `SHA256`.

pub mod stats;
pub mod throughput;
pub mod workload;


pub use stats::{RunSummary, Summary};
pub use throughput::{
    GIBIBYTE, KIBIBYTE, MEBIBYTE, RunRecord, ThroughputRecord, aggregate, bytes_to_gibibytes,
    bytes_to_gigabits, bytes_to_mebibytes, bytes_to_megabits,
};
pub use workload::{
    ChecksumAlgorithm, SUPPORTED_VERSION, TaskAction, TaskConfig, WorkloadBuilder,
    WorkloadConfig, WorkloadError, workload_name,
};
