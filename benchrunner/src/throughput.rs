//! Throughput math and the per-run record format
//!
//! The textual form of [`RunRecord`] is consumed by the metrics publisher,
//! which matches lines against `^Run:\d+ Secs:(\d+\.\d+) .* Gb/s:(\d+\.\d+)`.
//! Field order and labels must stay as they are.

use std::fmt;
use std::time::Duration;

pub const KIBIBYTE: u64 = 1024;
pub const MEBIBYTE: u64 = 1024 * KIBIBYTE;
pub const GIBIBYTE: u64 = 1024 * MEBIBYTE;

pub fn bytes_to_megabits(bytes: u64) -> f64 {
    (bytes as f64 * 8.0) / 1_000_000.0
}

pub fn bytes_to_gigabits(bytes: u64) -> f64 {
    (bytes as f64 * 8.0) / 1_000_000_000.0
}

pub fn bytes_to_mebibytes(bytes: u64) -> f64 {
    bytes as f64 / MEBIBYTE as f64
}

pub fn bytes_to_gibibytes(bytes: u64) -> f64 {
    bytes as f64 / GIBIBYTE as f64
}

/// Transfer rate of one run at several unit scales
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputRecord {
    pub bits_per_sec: f64,
    pub bytes_per_sec: f64,
    /// Decimal gigabits per second
    pub gigabits_per_sec: f64,
    /// Decimal megabits per second
    pub megabits_per_sec: f64,
    /// Binary gibibytes per second
    pub gibibytes_per_sec: f64,
    /// Binary mebibytes per second
    pub mebibytes_per_sec: f64,
}

/// Compute throughput for `bytes_per_run` bytes moved in `duration_secs` seconds
///
/// Pure arithmetic with no clamping: a duration near zero yields a very
/// large rate, and sanity-checking is left to the caller.
///
/// # Example
///
/// ```
/// use benchrunner::aggregate;
///
/// let t = aggregate(1_000_000_000, 1.0);
/// assert_eq!(t.gigabits_per_sec, 8.0);
/// assert!((t.gibibytes_per_sec - 0.9313).abs() < 0.0001);
/// ```
pub fn aggregate(bytes_per_run: u64, duration_secs: f64) -> ThroughputRecord {
    ThroughputRecord {
        bits_per_sec: (bytes_per_run as f64 * 8.0) / duration_secs,
        bytes_per_sec: bytes_per_run as f64 / duration_secs,
        gigabits_per_sec: bytes_to_gigabits(bytes_per_run) / duration_secs,
        megabits_per_sec: bytes_to_megabits(bytes_per_run) / duration_secs,
        gibibytes_per_sec: bytes_to_gibibytes(bytes_per_run) / duration_secs,
        mebibytes_per_sec: bytes_to_mebibytes(bytes_per_run) / duration_secs,
    }
}

/// Outcome of one successful repeat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRecord {
    /// 1-based repeat number
    pub run: u32,
    pub duration: Duration,
    pub throughput: ThroughputRecord,
}

impl RunRecord {
    pub fn new(run: u32, bytes_per_run: u64, duration: Duration) -> Self {
        RunRecord {
            run,
            duration,
            throughput: aggregate(bytes_per_run, duration.as_secs_f64()),
        }
    }

    pub fn secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run:{} Secs:{:.6} Gb/s:{:.6} Mb/s:{:.6} GiB/s:{:.6} MiB/s:{:.6}",
            self.run,
            self.secs(),
            self.throughput.gigabits_per_sec,
            self.throughput.megabits_per_sec,
            self.throughput.gibibytes_per_sec,
            self.throughput.mebibytes_per_sec,
        )
    }
}
