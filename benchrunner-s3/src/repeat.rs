//! Repeat loop: runs a workload until its count or time budget runs out

use crate::driver::RunDriver;
use crate::error::{Result, RunnerError};
use benchrunner::RunRecord;
use std::time::Instant;
use tracing::Instrument;

/// Drives repeated runs of one workload
///
/// The repeat count is checked before every run. The time budget is only
/// checked before the second and later runs: the first run always happens,
/// and a run in progress is never cut short.
#[derive(Debug, Clone)]
pub struct RepeatController {
    driver: RunDriver,
    workload_name: String,
}

impl RepeatController {
    pub fn new(driver: RunDriver, workload_name: impl Into<String>) -> Self {
        RepeatController {
            driver,
            workload_name: workload_name.into(),
        }
    }

    pub fn driver(&self) -> &RunDriver {
        &self.driver
    }

    /// Run until done, handing each record to `on_record` as soon as it exists
    ///
    /// Stops at the first failed run. Records for runs that completed before
    /// the failure have already been handed out by then.
    pub async fn run<F>(&self, mut on_record: F) -> Result<Vec<RunRecord>>
    where
        F: FnMut(&RunRecord),
    {
        let workload = self.driver.executor().workload();
        let max_count = workload.max_repeat_count();
        let max_secs = workload.max_repeat_secs();
        let bytes_per_run = workload.bytes_per_run();

        let mut records = Vec::new();
        let loop_start = Instant::now();

        for run in 1..=max_count {
            if run > 1 && loop_start.elapsed() >= max_secs {
                tracing::debug!(
                    "time budget of {:?} used up after {} runs",
                    max_secs,
                    records.len()
                );
                break;
            }

            self.driver
                .executor()
                .prepare_run()
                .await
                .map_err(RunnerError::Fail)?;

            let span = tracing::info_span!(
                "run-benchmark",
                num = run,
                workload = %self.workload_name
            );
            let result = self.driver.run_once().instrument(span).await?;
            result.outcome?;

            let record = RunRecord::new(run, bytes_per_run, result.duration);
            tracing::debug!("run {} finished in {:.6}s", run, record.secs());
            on_record(&record);
            records.push(record);
        }

        Ok(records)
    }
}
