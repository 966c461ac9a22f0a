use criterion::{Criterion, black_box, criterion_group, criterion_main};
use phasewarp::{RenderConfig, ShifterKind, pitch_shift};

fn test_signal() -> Vec<f32> {
    let sample_rate = 44_100u32;
    (0..sample_rate / 2)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (libm::sin(2.0 * core::f64::consts::PI * 440.0 * t)
                + 0.5 * libm::sin(2.0 * core::f64::consts::PI * 1_320.0 * t)) as f32
        })
        .collect()
}

fn bench_shifters(c: &mut Criterion) {
    let samples = test_signal();
    let mut group = c.benchmark_group("pitch_shift");
    for (name, kind) in [
        ("basic", ShifterKind::Basic),
        ("lock-id", ShifterKind::LockedIdentity),
        ("lock-sc", ShifterKind::LockedScaled),
        ("lam", ShifterKind::Laminar),
        ("lock-dyn", ShifterKind::LockedDynamic),
    ] {
        let config = RenderConfig {
            shifter: kind,
            half_tone_steps_to_shift: 5,
            ..Default::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| pitch_shift(black_box(&samples), 44_100, &config).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shifters);
criterion_main!(benches);
