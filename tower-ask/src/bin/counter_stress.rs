use std::sync::Arc;
use std::time::Instant;

use ask_limit::Clock;
use ask_limit::CounterStore;
use ask_limit::EligibilityRequirement;
use ask_limit::NoopAnalytics;
use hdrhistogram::Histogram;
use rand::Rng;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tower::BoxError;
use tower_ask::RatingCoordinator;
use tower_ask::StaticVersion;
use tower_ask::UserDecision;

#[derive(Debug, Clone, Copy)]
enum Op {
    Launch,
    Activation,
    Evaluate,
    Snapshot,
}

impl Op {
    fn pick(roll: u32) -> Self {
        match roll {
            0..=4 => Op::Launch,
            5..=7 => Op::Activation,
            8 => Op::Evaluate,
            _ => Op::Snapshot,
        }
    }
}

#[derive(Default)]
struct Tally {
    launches: u64,
    activations: u64,
    evaluations: u64,
    snapshots: u64,
}

async fn run_load_test(
    name: &str,
    coordinator: Arc<RatingCoordinator>,
    tasks: usize,
    ops: usize,
) -> Result<(), BoxError> {
    let mut hist = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3)?;
    let mut tally = Tally::default();
    let mut set = JoinSet::new();
    let barrier = Arc::new(Barrier::new(tasks));

    let before = coordinator.store().snapshot();
    let start = Instant::now();

    for _ in 0..tasks {
        let coordinator = Arc::clone(&coordinator);
        let bar = barrier.clone();
        set.spawn(async move {
            bar.wait().await;
            let mut samples = Vec::with_capacity(ops);
            for _ in 0..ops {
                let op = Op::pick(rand::rng().random_range(0..10));
                let op_start = Instant::now();
                match op {
                    Op::Launch => {
                        coordinator.record_launch();
                    }
                    Op::Activation => {
                        coordinator.record_activation();
                    }
                    Op::Evaluate => {
                        let status = coordinator.evaluate();
                        coordinator.complete(&status, UserDecision::Dismissed);
                    }
                    Op::Snapshot => {
                        let _ = coordinator.store().snapshot();
                    }
                }
                samples.push((op, op_start.elapsed()));
                tokio::task::yield_now().await;
            }
            samples
        });
    }

    while let Some(task) = set.join_next().await {
        for (op, elapsed) in task? {
            hist.record(elapsed.as_nanos() as u64)?;
            match op {
                Op::Launch => tally.launches += 1,
                Op::Activation => tally.activations += 1,
                Op::Evaluate => tally.evaluations += 1,
                Op::Snapshot => tally.snapshots += 1,
            }
        }
    }

    let total_duration = start.elapsed();
    let after = coordinator.store().snapshot();
    let total_ops = (tasks * ops) as f64;

    println!("--- {} ---", name);
    println!("Total Duration:  {:.2?}", total_duration);
    println!(
        "Total Rate:      {:.2} ops/sec",
        total_ops / total_duration.as_secs_f64()
    );
    println!("P50:             {}ns", hist.value_at_quantile(0.5));
    println!("P99:             {}ns", hist.value_at_quantile(0.99));
    println!("Max:             {}ns", hist.max());
    println!(
        "Operations:      {} launches, {} activations, {} evaluations, {} snapshots",
        tally.launches, tally.activations, tally.evaluations, tally.snapshots
    );

    let lost_launches = (before.launch_count + tally.launches) as i64 - after.launch_count as i64;
    let lost_activations =
        (before.activation_count + tally.activations) as i64 - after.activation_count as i64;
    println!(
        "Lost Updates:    {} launches, {} activations",
        lost_launches, lost_activations
    );
    println!();

    if lost_launches != 0 || lost_activations != 0 {
        return Err(format!("{name}: counters lost updates").into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt::init();

    let tasks = 512;
    let ops = 2_000;
    let clock = Clock::new();

    // 1. Calendar year accounting
    let requirement = EligibilityRequirement::default();
    let store = Arc::new(CounterStore::new(clock.now(), requirement.yearly_reset));
    let coordinator = RatingCoordinator::new(store, requirement, StaticVersion::new("1.0.0"))
        .with_clock(clock.clone())
        .with_analytics(NoopAnalytics);
    run_load_test("Default Requirement", Arc::new(coordinator), tasks, ops).await?;

    // 2. Debug override, every evaluation is eligible
    let requirement = EligibilityRequirement {
        debug_override_enabled: true,
        ..Default::default()
    };
    let store = Arc::new(CounterStore::new(clock.now(), requirement.yearly_reset));
    let coordinator = RatingCoordinator::new(store, requirement, StaticVersion::new("1.0.0"))
        .with_clock(clock)
        .with_analytics(NoopAnalytics);
    run_load_test("Debug Override", Arc::new(coordinator), tasks, ops).await?;

    Ok(())
}
