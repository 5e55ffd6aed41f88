use std::hint::black_box;

use chirpset::{AugmentConfig, Augmenter, FeatureConfig, FeatureExtractor, FeatureMode};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

const RATE: u32 = 22_050;

fn chirp(seconds: f32) -> Vec<f32> {
    let len = (RATE as f32 * seconds) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            0.4 * (2.0 * std::f32::consts::PI * (1_500.0 * t + 600.0 * t * t)).sin()
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let signal = chirp(3.0);
    for mode in [FeatureMode::Statistics, FeatureMode::MeanOnly] {
        let extractor = FeatureExtractor::new(FeatureConfig {
            mode,
            ..FeatureConfig::default()
        })
        .expect("extractor");
        c.bench_with_input(BenchmarkId::new("extract_3s", mode), &signal, |b, signal| {
            b.iter(|| extractor.extract_samples(black_box(signal)).expect("extract"));
        });
    }
}

fn bench_augment(c: &mut Criterion) {
    let signal = chirp(3.0);
    let augmenter = Augmenter::new(AugmentConfig::default(), RATE);
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("augment_3s", |b| {
        b.iter(|| augmenter.augment(black_box(&signal), &mut rng));
    });
}

criterion_group!(benches, bench_extract, bench_augment);
criterion_main!(benches);
