use benchrunner::{TaskAction, WorkloadConfig};
use benchrunner_s3::{ConcurrencyGate, MemoryBackend, RunDriver, TransferExecutor};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const TASKS: usize = 1_000;

fn driver(action: TaskAction, capacity: usize) -> RunDriver {
    let mut builder = WorkloadConfig::builder();
    for i in 0..TASKS {
        builder = builder.task(action, format!("bench/{i}"), 4096);
    }
    let workload = builder.build();

    let backend = Arc::new(MemoryBackend::new(Duration::ZERO));
    backend.seed_workload(&workload);
    let executor = TransferExecutor::new(backend, Arc::new(workload), ".");
    RunDriver::new(ConcurrencyGate::new(capacity), executor)
}

fn benchmark_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(3));
    group.warm_up_time(Duration::from_millis(500));
    group.throughput(Throughput::Elements(TASKS as u64));

    for capacity in [1, 16, 256] {
        let downloads = driver(TaskAction::Download, capacity);
        group.bench_with_input(
            BenchmarkId::new("download", capacity),
            &downloads,
            |b, driver| {
                b.to_async(&runtime)
                    .iter(|| async { black_box(driver.run_once().await) });
            },
        );

        let uploads = driver(TaskAction::Upload, capacity);
        group.bench_with_input(
            BenchmarkId::new("upload", capacity),
            &uploads,
            |b, driver| {
                b.to_async(&runtime)
                    .iter(|| async { black_box(driver.run_once().await) });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_dispatch);
criterion_main!(benches);
