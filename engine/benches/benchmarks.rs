//! Performance benchmarks for fazenda-engine

use fazenda_engine::{
    aggregate_pen_count, calculate_calibration, calculate_confidence, smooth_count,
    ActionKind, ActionQueue, AggregationRule, CalibrationSample, QueueSnapshot, RetryPolicy,
    SyncAction,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn populated_queue(size: usize) -> ActionQueue {
    let mut queue = ActionQueue::new();
    for i in 0..size {
        let action = SyncAction::new(
            format!("a-{}", i),
            ActionKind::Create,
            "animal",
            json!({"brinco": format!("{:04}", i), "raca": "Nelore", "peso": 380.5}),
            1_706_745_600_000 + i as u64,
        );
        let _ = queue.push(action);
    }
    queue
}

fn camera_counts(size: usize) -> Vec<u32> {
    (0..size).map(|i| 40 + (i * 7 % 11) as u32).collect()
}

fn bench_vision(c: &mut Criterion) {
    let mut group = c.benchmark_group("vision");

    for size in [4, 16, 64].iter() {
        let counts = camera_counts(*size);

        group.bench_with_input(BenchmarkId::new("median", size), &counts, |b, counts| {
            b.iter(|| aggregate_pen_count(black_box(counts), AggregationRule::Median, None))
        });

        group.bench_with_input(BenchmarkId::new("confidence", size), &counts, |b, counts| {
            b.iter(|| calculate_confidence(black_box(counts)))
        });
    }

    // A day of readings at one per minute
    let history = camera_counts(1440);
    group.bench_function("smooth_day_window_30", |b| {
        b.iter(|| smooth_count(black_box(&history), black_box(30)))
    });

    group.finish();
}

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");

    for size in [10, 100, 1000].iter() {
        let samples: Vec<_> = (0..*size)
            .map(|i| {
                let estimated = 250.0 + i as f64 * 0.5;
                CalibrationSample::new(estimated, estimated * 1.04 + 3.0)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("fit", size), &samples, |b, samples| {
            b.iter(|| calculate_calibration(black_box(samples)))
        });
    }

    group.finish();
}

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");

    // Mark every other action synced and prune, as a flush does
    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("flush_pass", size), size, |b, &size| {
            let template = populated_queue(size);
            b.iter(|| {
                let mut queue = template.clone();
                let ids: Vec<_> = queue.pending().map(|a| a.id.clone()).collect();
                for (i, id) in ids.iter().enumerate() {
                    if i % 2 == 0 {
                        queue.mark_synced(id);
                    } else {
                        queue.record_failure(id, "timeout", &RetryPolicy::default());
                    }
                }
                queue.prune_synced()
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 500, 1000].iter() {
        let queue = populated_queue(*size);

        group.bench_with_input(BenchmarkId::new("to_json", size), &queue, |b, queue| {
            b.iter(|| queue.export().to_json())
        });

        let json = queue.export().to_json().unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("from_json", size), &json, |b, json| {
            b.iter(|| QueueSnapshot::from_json(black_box(json)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_vision,
    bench_calibration,
    bench_queue,
    bench_snapshot,
);
criterion_main!(benches);
