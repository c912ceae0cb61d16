use criterion::{criterion_group, criterion_main, Criterion};
use moodwave::{SamplerConfig, SyntheticSignal};
use std::hint::black_box;

fn synthetic_step(c: &mut Criterion) {
    let config = SamplerConfig {
        seed: Some(7),
        ..SamplerConfig::default()
    };
    let mut group = c.benchmark_group("synthetic_signal");
    for playing in [false, true] {
        let mut signal = SyntheticSignal::new(&config);
        let mut t = 0.0_f64;
        let name = if playing { "playing" } else { "idle" };
        group.bench_function(name, |b| {
            b.iter(|| {
                t += 0.016;
                black_box(signal.step(black_box(t), playing)[0])
            });
        });
    }
    group.finish();
}

criterion_group!(benches, synthetic_step);
criterion_main!(benches);
