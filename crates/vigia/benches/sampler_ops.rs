//! Sampler and Fault Ring Benchmarks
//!
//! Per-frame cost of the sampler and the cost of recording faults into a
//! full ring.
//!
//! Run with: `cargo bench --bench sampler_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;
use vigia::mock::MockPage;
use vigia::{FaultReporter, Sampler};

fn bench_record_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_frame");

    for fps in [30_u32, 60, 144] {
        group.bench_with_input(BenchmarkId::from_parameter(fps), &fps, |bench, &fps| {
            let sampler = Sampler::new();
            let step = 1000.0 / f64::from(fps);
            let mut now = 0.0;
            bench.iter(|| {
                now += step;
                black_box(sampler.record_frame(black_box(now)));
            });
        });
    }

    group.finish();
}

fn bench_frame_loop(c: &mut Criterion) {
    c.bench_function("frame_loop_one_second", |bench| {
        let page = Rc::new(MockPage::new());
        let sampler = Sampler::new();
        let _handle = sampler.init(Rc::clone(&page)).unwrap();
        bench.iter(|| {
            page.drive_frames(60, 1000.0);
            black_box(sampler.performance_report());
        });
    });
}

fn bench_fault_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("fault_ring");

    for preload in [0_usize, 50] {
        group.bench_with_input(
            BenchmarkId::from_parameter(preload),
            &preload,
            |bench, &preload| {
                let reporter = FaultReporter::new();
                for i in 0..preload {
                    reporter.handle_error(format!("warmup {i}"), "bench");
                }
                bench.iter(|| {
                    black_box(reporter.handle_error("TypeError: x is undefined", "bench"));
                });
            },
        );
    }

    group.finish();
}

fn bench_error_stats(c: &mut Criterion) {
    let reporter = FaultReporter::new();
    for i in 0..50 {
        reporter.handle_error(format!("fault {i}"), if i % 2 == 0 { "a" } else { "b" });
    }
    c.bench_function("error_stats_full_ring", |bench| {
        bench.iter(|| black_box(reporter.error_stats()));
    });
}

criterion_group!(
    benches,
    bench_record_frame,
    bench_frame_loop,
    bench_fault_ring,
    bench_error_stats
);
criterion_main!(benches);
