use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use orbat_core::{project, NUnit, ScenarioState, StateKeyframe};

fn build_state(units: usize, keyframes: usize) -> ScenarioState {
    let mut state = ScenarioState::default();
    let map = Arc::make_mut(&mut state.unit_map);
    for index in 0..units {
        let id = format!("unit-{index}");
        let lon = (index % 360) as f64 - 180.0;
        let state = (0..keyframes)
            .map(|step| StateKeyframe {
                id: format!("{id}-{step}"),
                t: step as i64 * 3_600_000,
                location: Some([lon, (step % 80) as f64]),
                via: (step % 3 == 0).then(|| vec![[lon + 0.5, (step % 80) as f64 + 0.5]]),
                ..StateKeyframe::default()
            })
            .collect();
        map.insert(
            id.clone(),
            Arc::new(NUnit {
                id,
                sidc: "10031000001211000000".into(),
                state,
                ..NUnit::default()
            }),
        );
    }
    state
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");

    for units in [100usize, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::new("units", units), &units, |b, &units| {
            b.iter_batched(
                || build_state(units, 24),
                |mut state| {
                    project(&mut state, 11 * 3_600_000 + 1_800_000);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(projection_benches, bench_projection);
criterion_main!(projection_benches);
