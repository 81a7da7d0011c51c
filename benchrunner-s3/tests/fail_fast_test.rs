use benchrunner::{TaskAction, WorkloadConfig};
use benchrunner_s3::{
    ConcurrencyGate, MemoryBackend, RepeatController, RunDriver, RunnerError, TransferExecutor,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn ten_downloads() -> WorkloadConfig {
    let mut builder = WorkloadConfig::builder().max_repeat_count(3);
    for i in 1..=10 {
        builder = builder.task(TaskAction::Download, format!("download/{i}"), 1_000);
    }
    builder.build()
}

fn setup(capacity: usize, latency: Duration) -> (RunDriver, Arc<MemoryBackend>) {
    let workload = ten_downloads();
    let backend = Arc::new(MemoryBackend::new(latency));
    backend.seed_workload(&workload);
    backend.fail_key("download/3");
    let executor = TransferExecutor::new(backend.clone(), Arc::new(workload), ".");
    (RunDriver::new(ConcurrencyGate::new(capacity), executor), backend)
}

#[tokio::test]
async fn test_nothing_dispatched_after_failure_is_seen() {
    let (driver, backend) = setup(1, Duration::from_millis(2));

    let result = driver.run_once().await.unwrap();

    let err = result.outcome.unwrap_err();
    assert_eq!(err.task_index, 2);
    assert_eq!(err.action, TaskAction::Download);
    assert_eq!(
        backend.request_log(),
        vec!["download/1", "download/2", "download/3"]
    );
    assert_eq!(backend.stats().downloads.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_siblings_in_flight_complete() {
    // Capacity lets tasks 1-4 start together; task 3 fails while 1, 2 and 4 run
    let (driver, backend) = setup(4, Duration::from_millis(20));

    let result = driver.run_once().await.unwrap();

    assert!(!result.is_success());
    assert!(result.dispatched >= 4);
    assert!(result.dispatched < 10);
    assert_eq!(backend.request_log().len(), result.dispatched);
    // Everything dispatched except the failing task ran to completion
    assert_eq!(
        backend.stats().downloads.load(Ordering::Relaxed),
        result.dispatched as u64 - 1
    );
    assert_eq!(backend.stats().in_flight(), 0);
}

#[tokio::test]
async fn test_failed_run_stops_repeats() {
    let (driver, backend) = setup(1, Duration::from_millis(1));
    let controller = RepeatController::new(driver, "ten-downloads");

    let mut records = 0;
    let err = controller.run(|_| records += 1).await.unwrap_err();

    assert!(matches!(err, RunnerError::Transfer(_)));
    assert!(err.to_string().contains("key:download/3"));
    assert_eq!(records, 0);
    // Only the first run was attempted, and it stopped at task 3
    assert_eq!(backend.request_log().len(), 3);
}
