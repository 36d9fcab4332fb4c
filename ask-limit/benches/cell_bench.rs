use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Instant;

use chrono::TimeDelta;
use chrono::Utc;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use ask_limit::AtomicCell;
use ask_limit::ConcurrentCell;
use ask_limit::CounterStore;
use ask_limit::EligibilityRequirement;
use ask_limit::SharedCell;
use ask_limit::YearlyReset;
use ask_limit::evaluate;

fn bench_single_cell<C: SharedCell<u64>>(group_name: &str, c: &mut Criterion, cell: Arc<C>) {
    let mut group = c.benchmark_group(group_name);

    group.bench_function("single-threaded", |b| {
        b.iter(|| {
            let _ = black_box(cell.as_ref()).update(|v| v + 1);
        })
    });

    group.finish();
}

fn bench_parallel_cell<C: SharedCell<u64> + Send + Sync + 'static>(
    group_name: &str,
    c: &mut Criterion,
    cell: Arc<C>,
) {
    let mut group = c.benchmark_group(group_name);

    for threads in [2, 4, 8].iter() {
        let num_threads = *threads;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}-threads", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter_custom(|iters| {
                    let barrier = Arc::new(Barrier::new(n + 1));
                    let mut handles = Vec::with_capacity(n);

                    for _ in 0..n {
                        let cell = Arc::clone(&cell);
                        let bar = Arc::clone(&barrier);
                        let iters_per_thread = iters / n as u64;

                        handles.push(thread::spawn(move || {
                            bar.wait(); // Wait for the start signal
                            for _ in 0..iters_per_thread {
                                let _ = black_box(cell.update(|v| v + 1));
                            }
                        }));
                    }

                    // Synchronize the start across all threads
                    barrier.wait();
                    let start = Instant::now();

                    for handle in handles {
                        let _ = handle.join();
                    }

                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let now = Utc::now();
    let store = CounterStore::new(now - TimeDelta::days(90), YearlyReset::CalendarYear);
    for _ in 0..10 {
        store.increment_launches();
        store.increment_activations();
    }
    store.mark_rated("1.0.0");
    let requirement = EligibilityRequirement::default();

    let mut group = c.benchmark_group("Evaluate");

    group.bench_function("snapshot-and-evaluate", |b| {
        b.iter(|| {
            let snapshot = store.snapshot();
            black_box(evaluate(&snapshot, &requirement, now, black_box("1.1.0")))
        })
    });

    group.finish();
}

fn run_all_benches(c: &mut Criterion) {
    let atomic = Arc::new(AtomicCell::new(0));
    let mutex = Arc::new(ConcurrentCell::new(0u64));

    bench_single_cell("AtomicCell", c, Arc::clone(&atomic));
    bench_parallel_cell("AtomicCell", c, atomic);

    bench_single_cell("ConcurrentCell", c, Arc::clone(&mutex));
    bench_parallel_cell("ConcurrentCell", c, mutex);

    bench_evaluate(c);
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
