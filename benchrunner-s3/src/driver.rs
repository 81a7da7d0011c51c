//! One timed pass over a workload's tasks

use crate::error::TransferError;
use crate::executor::TransferExecutor;
use crate::gate::ConcurrencyGate;
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// What happened during one run
#[derive(Debug)]
pub struct RunResult {
    /// Wall time from before the first dispatch until the last transfer finished
    pub duration: Duration,
    /// Number of tasks actually started
    pub dispatched: usize,
    /// First failure to complete, if any transfer failed
    pub outcome: Result<(), TransferError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Dispatches every task of a workload under a [`ConcurrencyGate`]
///
/// Tasks are started in workload order, each after taking a permit. Once any
/// transfer fails no further tasks are started; transfers already in flight
/// are allowed to finish before the run returns.
#[derive(Debug, Clone)]
pub struct RunDriver {
    gate: ConcurrencyGate,
    executor: TransferExecutor,
}

impl RunDriver {
    pub fn new(gate: ConcurrencyGate, executor: TransferExecutor) -> Self {
        RunDriver { gate, executor }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn executor(&self) -> &TransferExecutor {
        &self.executor
    }

    /// Run all tasks once and wait for every dispatched transfer
    ///
    /// Errors only if the gate is closed underneath the run; transfer
    /// failures are reported through [`RunResult::outcome`].
    pub async fn run_once(&self) -> Result<RunResult> {
        let failed = Arc::new(AtomicBool::new(false));
        let task_count = self.executor.workload().tasks().len();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0;

        let start = Instant::now();

        for task_index in 0..task_count {
            // Reserve a slot before looking at the flag, so a failure raised
            // while we waited is seen here.
            let permit = self.gate.acquire().await?;
            if failed.load(Ordering::Acquire) {
                drop(permit);
                break;
            }
            in_flight.push(self.executor.dispatch(task_index, permit, failed.clone()));
            dispatched += 1;
        }

        let mut first_error = None;
        while let Some(result) = in_flight.next().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        let duration = start.elapsed();

        if first_error.is_some() {
            tracing::debug!(
                "run stopped after dispatching {} of {} tasks",
                dispatched,
                task_count
            );
        }

        Ok(RunResult {
            duration,
            dispatched,
            outcome: first_error.map_or(Ok(()), Err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use benchrunner::{TaskAction, WorkloadConfig};

    fn driver(
        workload: WorkloadConfig,
        latency: Duration,
        capacity: usize,
    ) -> (RunDriver, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(latency));
        backend.seed_workload(&workload);
        let executor = TransferExecutor::new(backend.clone(), Arc::new(workload), ".");
        (RunDriver::new(ConcurrencyGate::new(capacity), executor), backend)
    }

    fn downloads(count: usize, size: u64) -> WorkloadConfig {
        let mut builder = WorkloadConfig::builder();
        for i in 1..=count {
            builder = builder.task(TaskAction::Download, format!("download/{i}"), size);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_run_dispatches_every_task() {
        let (driver, backend) = driver(downloads(20, 1_000), Duration::from_millis(1), 4);

        let result = driver.run_once().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.dispatched, 20);
        assert_eq!(backend.stats().downloads.load(Ordering::Relaxed), 20);
        assert_eq!(driver.gate().available(), 4);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_capacity() {
        let (driver, backend) = driver(downloads(30, 10), Duration::from_millis(5), 3);

        driver.run_once().await.unwrap();
        assert!(backend.stats().peak_in_flight() <= 3);
        assert!(backend.stats().peak_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_dispatch_in_workload_order() {
        let (driver, backend) = driver(downloads(5, 10), Duration::ZERO, 1);

        driver.run_once().await.unwrap();
        let expected: Vec<String> = (1..=5).map(|i| format!("download/{i}")).collect();
        assert_eq!(backend.request_log(), expected);
    }

    #[tokio::test]
    async fn test_failure_stops_new_dispatch() {
        let (driver, backend) = driver(downloads(10, 10), Duration::from_millis(1), 1);
        backend.fail_key("download/3");

        let result = driver.run_once().await.unwrap();
        let err = result.outcome.unwrap_err();
        assert_eq!(err.task_index, 2);
        assert_eq!(err.key, "download/3");
        assert_eq!(result.dispatched, 3);
        assert_eq!(
            backend.request_log(),
            vec!["download/1", "download/2", "download/3"]
        );
        assert_eq!(driver.gate().available(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_transfers_finish_after_failure() {
        let mut builder = WorkloadConfig::builder().task(TaskAction::Download, "bad", 10);
        for i in 0..3 {
            builder = builder.task(TaskAction::Download, format!("slow/{i}"), 10);
        }
        let (driver, backend) = driver(builder.build(), Duration::from_millis(20), 4);
        backend.fail_key("bad");

        let result = driver.run_once().await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.dispatched, 4);
        // The three slow transfers were already running and still completed
        assert_eq!(backend.stats().downloads.load(Ordering::Relaxed), 3);
        assert_eq!(backend.stats().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_workload_runs_nothing() {
        let (driver, backend) = driver(WorkloadConfig::builder().build(), Duration::ZERO, 2);

        let result = driver.run_once().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.dispatched, 0);
        assert!(backend.request_log().is_empty());
    }

    #[tokio::test]
    async fn test_closed_gate_aborts_run() {
        let (driver, _backend) = driver(downloads(2, 10), Duration::ZERO, 2);
        driver.gate().close();
        assert!(driver.run_once().await.is_err());
    }
}
