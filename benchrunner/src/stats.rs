//! Summary statistics over all runs of a benchmark

use crate::throughput::{RunRecord, bytes_to_gigabits};
use std::fmt;

/// Median, mean, min, max, and spread of a set of samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population variance
    pub variance: f64,
    pub std_dev: f64,
}

impl Summary {
    /// Summarize `values`, or `None` if there are none
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let middle = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[middle]
        } else {
            (sorted[middle - 1] + sorted[middle]) / 2.0
        };
        let variance = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        Some(Summary {
            median,
            mean,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Median:{:.6} Mean:{:.6} Min:{:.6} Max:{:.6} Variance:{:.6} StdDev:{:.6}",
            self.median, self.mean, self.min, self.max, self.variance, self.std_dev
        )
    }
}

/// Throughput and duration summaries for a finished benchmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub throughput_gbps: Summary,
    pub duration_secs: Summary,
}

impl RunSummary {
    /// Summarize `records`, or `None` if no run completed
    pub fn from_records(bytes_per_run: u64, records: &[RunRecord]) -> Option<Self> {
        let durations: Vec<f64> = records.iter().map(RunRecord::secs).collect();
        let gigabits = bytes_to_gigabits(bytes_per_run);
        let throughputs: Vec<f64> = durations.iter().map(|secs| gigabits / secs).collect();

        Some(RunSummary {
            throughput_gbps: Summary::from_values(&throughputs)?,
            duration_secs: Summary::from_values(&durations)?,
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overall Throughput (Gb/s) {}", self.throughput_gbps)?;
        write!(f, "Overall Duration (Secs) {}", self.duration_secs)
    }
}
