//! # benchrunner-s3
//!
//! Runs a benchmark workload against S3: every task is sent as its own
//! concurrent request, bounded by a [`ConcurrencyGate`], and each repeat of
//! the workload is timed as a unit.
//!
//! ## Pieces
//!
//! - [`gate`]: counting semaphore sized from the open-file limit
//! - [`executor`]: turns one task into one backend request on its own tokio task
//! - [`driver`]: one timed pass over all tasks, stopping new work after a failure
//! - [`repeat`]: runs passes until the workload's count or time budget runs out
//! - [`backend`]: the S3 client and an in-process simulated store
//!
//! ## Output
//!
//! stdout carries one line per successful run, then overall statistics:
//!
//! ```text
//! Run:1 Secs:0.512345 Gb/s:16.771860 Mb/s:16771.860000 GiB/s:1.952450 MiB/s:1999.308800
//! Overall Throughput (Gb/s) Median:16.771860 Mean:16.771860 Min:16.771860 Max:16.771860 Variance:0.000000 StdDev:0.000000
//! Overall Duration (Secs) Median:0.512345 Mean:0.512345 Min:0.512345 Max:0.512345 Variance:0.000000 StdDev:0.000000
//! Peak RSS:1034.125000 MiB
//! ```
//!
//! Logs go to stderr.

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod gate;
pub mod repeat;

pub use backend::StorageBackend;
pub use backend::memory::MemoryBackend;
pub use backend::s3::{S3Backend, S3BackendConfig};
pub use config::{Config, S3ClientId};
pub use driver::{RunDriver, RunResult};
pub use error::{FAIL_EXIT_CODE, Result, RunnerError, SKIP_EXIT_CODE, TransferError};
pub use executor::{TransferExecutor, TransferHandle};
pub use gate::{ConcurrencyGate, GatePermit};
pub use repeat::RepeatController;

use benchrunner::{RunRecord, RunSummary, WorkloadConfig, workload_name};
use std::sync::Arc;

/// Create the storage client selected by `config`
pub async fn create_backend(
    config: &Config,
    workload: &WorkloadConfig,
) -> Arc<dyn StorageBackend> {
    match config.s3_client {
        S3ClientId::SdkRustClient => {
            let backend = S3Backend::new(&S3BackendConfig {
                bucket: config.bucket.clone(),
                region: config.region.clone(),
                endpoint_url: config.endpoint_url.clone(),
                force_path_style: config.force_path_style,
                target_throughput_gbps: config.target_throughput_gbps,
            })
            .await;
            Arc::new(backend)
        }
        S3ClientId::Memory => {
            let backend = MemoryBackend::new(config.memory_latency);
            backend.seed_workload(workload);
            Arc::new(backend)
        }
    }
}

/// Load the workload, run it to completion, and print results to stdout
///
/// Returns the records of every successful run. Overall statistics are
/// printed even when a later run fails, as long as one run finished.
pub async fn run_benchmark(config: &Config) -> Result<Vec<RunRecord>> {
    let workload = WorkloadConfig::load(&config.workload)?;
    let name = workload_name(&config.workload).to_string();
    let bytes_per_run = workload.bytes_per_run();

    let backend = create_backend(config, &workload).await;
    tracing::info!(
        "running {} ({} tasks, {} bytes per run) with {}",
        name,
        workload.tasks().len(),
        bytes_per_run,
        backend.name()
    );
    if let Some(reason) = backend.unsupported_reason(&workload) {
        return Err(RunnerError::Skip(reason));
    }

    let gate = match config.max_concurrency {
        Some(capacity) => ConcurrencyGate::new(capacity),
        None => ConcurrencyGate::from_file_limit(),
    };
    let executor = TransferExecutor::new(backend, Arc::new(workload), &config.files_dir);
    let controller = RepeatController::new(RunDriver::new(gate, executor), name);

    let mut records = Vec::new();
    let outcome = controller
        .run(|record| {
            println!("{record}");
            records.push(*record);
        })
        .await;

    print_summary(bytes_per_run, &records);
    outcome.map(|_| records)
}

/// Print overall statistics for `records`, if there are any
pub fn print_summary(bytes_per_run: u64, records: &[RunRecord]) {
    if let Some(summary) = RunSummary::from_records(bytes_per_run, records) {
        println!("{summary}");
    }
    if let Some(peak) = peak_rss_mib() {
        println!("Peak RSS:{peak:.6} MiB");
    }
}

/// Largest resident set size this process has reached, in MiB
#[cfg(unix)]
pub fn peak_rss_mib() -> Option<f64> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }

    let max_rss = usage.ru_maxrss as f64;
    // macOS reports bytes, everything else kibibytes
    if cfg!(target_os = "macos") {
        Some(max_rss / (1024.0 * 1024.0))
    } else {
        Some(max_rss / 1024.0)
    }
}

#[cfg(not(unix))]
pub fn peak_rss_mib() -> Option<f64> {
    None
}
