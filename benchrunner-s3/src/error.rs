use benchrunner::{TaskAction, WorkloadError};
use thiserror::Error;

/// Exit code telling the batch driver "this benchmark doesn't apply, move on"
pub const SKIP_EXIT_CODE: u8 = 123;

/// Exit code for any unrecoverable failure
pub const FAIL_EXIT_CODE: u8 = 255;

/// A single upload or download that didn't succeed
#[derive(Error, Debug)]
#[error("Task[{task_index}] failed. action:{action} key:{key} error:{source:#}")]
pub struct TransferError {
    pub task_index: usize,
    pub action: TaskAction,
    pub key: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The runner knows it can't run this workload.
    /// Not the user's fault, not a bug.
    #[error("{0}")]
    Skip(String),

    #[error(transparent)]
    Workload(WorkloadError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Fail(#[from] anyhow::Error),
}

impl RunnerError {
    pub fn is_skip(&self) -> bool {
        matches!(self, RunnerError::Skip(_))
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_skip() {
            SKIP_EXIT_CODE
        } else {
            FAIL_EXIT_CODE
        }
    }
}

impl From<WorkloadError> for RunnerError {
    fn from(err: WorkloadError) -> Self {
        if err.is_skip() {
            RunnerError::Skip(err.to_string())
        } else {
            RunnerError::Workload(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_becomes_skip() {
        let err: RunnerError = WorkloadError::UnsupportedVersion(1).into();
        assert!(err.is_skip());
        assert_eq!(err.exit_code(), 123);
        assert_eq!(err.to_string(), "workload version not supported: 1");
    }

    #[test]
    fn test_malformed_workload_is_failure() {
        let err: RunnerError = WorkloadError::Malformed("missing field `tasks`".into()).into();
        assert!(!err.is_skip());
        assert_eq!(err.exit_code(), 255);
    }

    #[test]
    fn test_transfer_error_names_task() {
        let err: RunnerError = TransferError {
            task_index: 2,
            action: TaskAction::Download,
            key: "download/1MiB/00003".to_string(),
            source: anyhow::anyhow!("NoSuchKey"),
        }
        .into();

        assert_eq!(err.exit_code(), 255);
        assert_eq!(
            err.to_string(),
            "Task[2] failed. action:download key:download/1MiB/00003 error:NoSuchKey"
        );
    }
}
