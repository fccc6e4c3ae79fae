//! Metrics engine tests

use denoise_lab::image::{BitDepth, Image, Shape};
use denoise_lab::metrics::{self, compute_reference_free, summarize_stats, MetricsRecord, SubjectPair};
use denoise_lab::noise::{NoiseConfig, NoiseRegistry};
use denoise_lab::rng::Seed;
use denoise_lab::Error;

fn noisy(truth: &Image, sigma: f64) -> Image {
    NoiseRegistry::with_defaults()
        .apply_noise(truth, &NoiseConfig::gaussian(sigma, Seed::new(42)))
        .unwrap()
        .0
}

#[test]
fn test_identical_images() {
    let image = Image::hot_spots(32, 32, BitDepth::U14).unwrap();
    let record = metrics::compute(&image, &image).unwrap();
    assert!(record.psnr.is_infinite() && record.psnr > 0.0);
    assert!((record.ssim - 1.0).abs() < 1e-12);
    assert_eq!(record.mse, 0.0);
    assert!((record.edge_preservation - 1.0).abs() < 1e-12);
}

#[test]
fn test_more_noise_scores_worse() {
    let truth = Image::hot_spots(48, 48, BitDepth::U8).unwrap();
    let light = metrics::compute(&truth, &noisy(&truth, 5.0)).unwrap();
    let heavy = metrics::compute(&truth, &noisy(&truth, 25.0)).unwrap();
    assert!(light.psnr > heavy.psnr);
    assert!(light.ssim > heavy.ssim);
    assert!(light.mse < heavy.mse);
    assert!(light.edge_preservation > heavy.edge_preservation);
}

#[test]
fn test_values_are_finite_and_bounded() {
    let truth = Image::gradient(32, 32, BitDepth::U12).unwrap();
    let record = metrics::compute(&truth, &noisy(&truth, 200.0)).unwrap();
    assert!(record.psnr.is_finite());
    assert!((-1.0..=1.0).contains(&record.ssim));
    assert!((-1.0..=1.0).contains(&record.edge_preservation));
    assert!(record.mse > 0.0);
    assert!(record.processing_time_ms >= 0.0);
}

#[test]
fn test_psnr_uses_depth_full_scale() {
    // one sample off by one on a 10x10 image: MSE = 0.01
    let shape = Shape {
        width: 10,
        height: 10,
        channels: 1,
    };
    let a = Image::new(shape, BitDepth::U8, vec![100; 100], "synthetic:a").unwrap();
    let mut samples = vec![100; 100];
    samples[0] = 101;
    let b = Image::new(shape, BitDepth::U8, samples, "synthetic:b").unwrap();
    let record = metrics::compute(&a, &b).unwrap();
    let expected = 10.0 * (255.0_f64 * 255.0 / 0.01).log10();
    assert!((record.psnr - expected).abs() < 1e-9);
}

#[test]
fn test_shape_and_depth_mismatch() {
    let a = Image::gradient(16, 16, BitDepth::U8).unwrap();
    let b = Image::gradient(16, 8, BitDepth::U8).unwrap();
    assert!(matches!(metrics::compute(&a, &b), Err(Error::ShapeMismatch(_))));
    let c = Image::gradient(16, 16, BitDepth::U16).unwrap();
    assert!(matches!(metrics::compute(&a, &c), Err(Error::ShapeMismatch(_))));
}

#[test]
fn test_infinite_psnr_survives_json() {
    let image = Image::gradient(8, 8, BitDepth::U8).unwrap();
    let record = metrics::compute(&image, &image)
        .unwrap()
        .with_pair(SubjectPair::TruthVsDenoised);
    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("\"inf\""));
    assert!(json.contains("truth_vs_denoised"));
    let back: MetricsRecord = serde_json::from_str(&json).unwrap();
    assert!(back.psnr.is_infinite());
}

#[test]
fn test_reference_free_stats() {
    let flat = Image::new(
        Shape {
            width: 16,
            height: 16,
            channels: 1,
        },
        BitDepth::U8,
        vec![128; 256],
        "synthetic:flat",
    )
    .unwrap();
    let stats = compute_reference_free(&flat);
    assert_eq!(stats.mean, 128.0);
    assert_eq!(stats.std, 0.0);
    assert_eq!(stats.laplacian_variance, 0.0);

    let clean = compute_reference_free(&Image::hot_spots(32, 32, BitDepth::U8).unwrap());
    let rough = compute_reference_free(&noisy(&Image::hot_spots(32, 32, BitDepth::U8).unwrap(), 20.0));
    assert!(rough.laplacian_variance > clean.laplacian_variance);

    let summary = summarize_stats(&[clean, rough]);
    let lap = summary["laplacian_variance"];
    assert!(lap.min <= lap.median && lap.median <= lap.max);
}

#[test]
fn test_local_contrast_and_total_saturation() {
    let shape = Shape {
        width: 32,
        height: 32,
        channels: 1,
    };
    let checker: Vec<u16> = (0..32 * 32)
        .map(|i| if (i % 32 + i / 32) % 2 == 0 { 100 } else { 300 })
        .collect();
    let image = Image::new(shape, BitDepth::U12, checker, "synthetic:checker").unwrap();
    let stats = compute_reference_free(&image);
    // std 100 over mean 200 in every window, near-balanced at the border
    assert!((stats.mean_local_contrast - 0.5).abs() < 0.01, "{stats:?}");
    assert!(stats.std_local_contrast < 0.01, "{stats:?}");

    let flat = Image::new(shape, BitDepth::U12, vec![2000; 32 * 32], "synthetic:flat").unwrap();
    let stats = compute_reference_free(&flat);
    assert_eq!(stats.mean_local_contrast, 0.0);
    assert_eq!(stats.std_local_contrast, 0.0);

    let mut clipped = vec![2000_u16; 32 * 32];
    clipped[..64].fill(0);
    clipped[64..96].fill(4095);
    let stats = compute_reference_free(&Image::new(shape, BitDepth::U12, clipped, "synthetic:clipped").unwrap());
    assert_eq!(stats.saturation_low_pct, 6.25);
    assert_eq!(stats.saturation_high_pct, 3.125);
    assert_eq!(stats.saturation_total_pct, 9.375);

    let summary = summarize_stats(&[stats]);
    assert_eq!(summary.len(), 19);
    assert!(summary.contains_key("mean_local_contrast"));
    assert!(summary.contains_key("saturation_total_pct"));
}
