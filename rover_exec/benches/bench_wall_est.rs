//! Benchmark of the wall estimator, the hottest derived-state path in the mission tick.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rover_lib::rover_state::samples::Radar;
use rover_lib::rover_state::walls::{classify_gap, estimate_wall, WallParams, WallSide};

fn bench_wall_est(c: &mut Criterion) {
    let radar = Radar {
        dist_mm: [600.0, 500.0, 400.0, 600.0, 2000.0, 800.0, 850.0, 900.0],
        status: [0; 8],
    };
    let params = WallParams::default();

    c.bench_function("estimate_wall both sides", |b| {
        b.iter(|| {
            let l = estimate_wall(black_box(&radar), WallSide::Left);
            let r = estimate_wall(black_box(&radar), WallSide::Right);
            (l, r)
        })
    });

    c.bench_function("classify_gap both sides", |b| {
        b.iter(|| {
            let l = classify_gap(black_box(&radar), WallSide::Left, &params);
            let r = classify_gap(black_box(&radar), WallSide::Right, &params);
            (l, r)
        })
    });
}

criterion_group!(benches, bench_wall_est);
criterion_main!(benches);
