//! Pipeline benchmarks
//!
//! Per-stage cost of one experiment cell: noise injection, each denoiser,
//! and the full-reference metrics.
//!
//! Run with: cargo bench --bench pipeline_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use denoise_lab::denoise::{default_config, AlgorithmId, DenoiseRegistry};
use denoise_lab::image::{BitDepth, Image};
use denoise_lab::ledger::Ledger;
use denoise_lab::metrics;
use denoise_lab::noise::{standard_suite, NoiseRegistry};
use denoise_lab::pipeline::{DenoisePlan, Orchestrator, SweepSpec};
use denoise_lab::rng::Seed;

const FRAME: usize = 128; // 128x128, a cropped thermal frame

/// Every noise model of the standard suite on a 14-bit frame
fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise");
    let registry = NoiseRegistry::with_defaults();
    let image = Image::hot_spots(FRAME, FRAME, BitDepth::U14).unwrap();

    for config in standard_suite(Seed::default()) {
        let name = denoise_lab::ledger::canonical_name(&config);
        group.bench_with_input(BenchmarkId::new("apply", name), &config, |b, config| {
            b.iter(|| registry.apply_noise(black_box(&image), config));
        });
    }
    group.finish();
}

/// Each built-in denoiser with its default parameters
fn bench_denoise(c: &mut Criterion) {
    let mut group = c.benchmark_group("denoise");
    group.sample_size(10);
    let registry = DenoiseRegistry::with_defaults();
    let truth = Image::hot_spots(FRAME, FRAME, BitDepth::U8).unwrap();
    let (noisy, _) = NoiseRegistry::with_defaults()
        .apply_noise(&truth, &denoise_lab::noise::NoiseConfig::gaussian(15.0, Seed::default()))
        .unwrap();

    for id in AlgorithmId::ALL {
        let config = default_config(id);
        group.bench_with_input(BenchmarkId::new("default", id.as_str()), &config, |b, config| {
            b.iter(|| registry.apply_denoise(black_box(&noisy), config));
        });
    }
    group.finish();
}

/// PSNR + SSIM + MSE + edge preservation at several frame sizes
fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    for size in [64, 256, 640] {
        let truth = Image::gradient(size, size, BitDepth::U16).unwrap();
        let (noisy, _) = NoiseRegistry::with_defaults()
            .apply_noise(&truth, &denoise_lab::noise::NoiseConfig::speckle(0.05, Seed::default()))
            .unwrap();
        group.bench_with_input(BenchmarkId::new("compute", size), &noisy, |b, noisy| {
            b.iter(|| metrics::compute(black_box(&truth), noisy));
        });
    }
    group.finish();
}

/// A small recommended sweep, sequential vs rayon
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);
    let spec = SweepSpec::new(
        vec![
            Image::gradient(64, 64, BitDepth::U8).unwrap(),
            Image::hot_spots(64, 64, BitDepth::U8).unwrap(),
        ],
        standard_suite(Seed::default())
            .into_iter()
            .filter(|c| c.noise_type != denoise_lab::noise::NoiseType::Gaussian)
            .collect(),
        DenoisePlan::Recommended,
    );

    group.bench_function("sequential", |b| {
        b.iter(|| Orchestrator::new(Ledger::in_memory()).run_sweep(black_box(&spec)));
    });
    #[cfg(feature = "parallel")]
    group.bench_function("parallel", |b| {
        b.iter(|| Orchestrator::new(Ledger::in_memory()).run_sweep_parallel(black_box(&spec)));
    });
    group.finish();
}

criterion_group!(benches, bench_noise, bench_denoise, bench_metrics, bench_sweep);
criterion_main!(benches);
