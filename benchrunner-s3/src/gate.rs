//! Admission control for in-flight transfers
//!
//! Every transfer holds one permit from a [`ConcurrencyGate`] for as long as
//! it is in flight. The permit is an RAII guard: it goes back to the gate
//! when dropped, on whichever task or thread the transfer finished on, so a
//! failed transfer can't leak its slot.
//!
//! The gate's capacity comes from the process's open-file limit. Each
//! transfer can need a socket plus a file handle, so without a cap a
//! workload of tens of thousands of small files would exhaust descriptors
//! and fail outright instead of just running slower.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Hard ceiling on simultaneous transfers, whatever the descriptor limit
pub const MAX_CONCURRENCY: usize = 10_000;

/// Share of the descriptor limit we're willing to use for transfers.
/// A transfer may need two descriptors (connection + file), so stay under half.
pub const FILE_LIMIT_FRACTION: f64 = 0.40;

/// Compute the concurrency budget from an open-file soft limit
///
/// `None` (limit unknown or unlimited) yields [`MAX_CONCURRENCY`].
/// The result is never zero.
pub fn budget_from_file_limit(soft_limit: Option<u64>) -> usize {
    let budget = match soft_limit {
        Some(limit) if limit > 0 => {
            let scaled = (limit as f64 * FILE_LIMIT_FRACTION) as u64;
            scaled.min(MAX_CONCURRENCY as u64) as usize
        }
        _ => MAX_CONCURRENCY,
    };
    budget.max(1)
}

/// Current soft `RLIMIT_NOFILE`, or `None` if it can't be queried or is unlimited
#[cfg(unix)]
pub fn file_descriptor_limit() -> Option<u64> {
    let mut lim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we pass it.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) };
    if rc != 0 {
        tracing::warn!(
            "getrlimit(RLIMIT_NOFILE) failed: {}",
            std::io::Error::last_os_error()
        );
        return None;
    }
    tracing::debug!("RLIMIT_NOFILE - current: {} hard: {}", lim.rlim_cur, lim.rlim_max);
    if lim.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(lim.rlim_cur as u64)
}

#[cfg(not(unix))]
pub fn file_descriptor_limit() -> Option<u64> {
    None
}

/// Budget derived from this process's descriptor limit
pub fn default_budget() -> usize {
    budget_from_file_limit(file_descriptor_limit())
}

/// Counting semaphore bounding in-flight transfers
///
/// Cloning is cheap; clones share the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admission slot, released when dropped
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` permits (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        ConcurrencyGate {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Create a gate sized from the process's descriptor limit
    pub fn from_file_limit() -> Self {
        let capacity = default_budget();
        tracing::info!("max concurrency: {}", capacity);
        Self::new(capacity)
    }

    /// Wait until a permit is free and take it
    ///
    /// Suspends the caller without spinning. Fails only if the gate was closed.
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("concurrency gate closed")?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held by in-flight transfers
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Reject all pending and future acquires
    pub fn close(&self) {
        self.semaphore.close();
    }
}
