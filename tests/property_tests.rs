//! Property-based tests for denoise-lab
//!
//! - Canonical names round-trip and never collide
//! - Noise is a pure function of (image, config)
//! - Outputs stay inside the bit depth's range
//! - Run with ProptestConfig::with_cases(100)

use denoise_lab::denoise::{AlgorithmId, DenoiseConfig, DenoiseRegistry};
use denoise_lab::image::{BitDepth, Image, Shape};
use denoise_lab::ledger::{parse_denoise_name, parse_noise_name, CanonicalName};
use denoise_lab::metrics;
use denoise_lab::noise::{NoiseConfig, NoiseRegistry};
use denoise_lab::params::{param_map, ParamValue};
use denoise_lab::rng::Seed;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_depth() -> impl Strategy<Value = BitDepth> {
    prop_oneof![
        Just(BitDepth::U8),
        Just(BitDepth::U12),
        Just(BitDepth::U14),
        Just(BitDepth::U16),
    ]
}

/// Small random grayscale image of any depth
fn arb_image() -> impl Strategy<Value = Image> {
    (arb_depth(), 8usize..20, 8usize..20).prop_flat_map(|(depth, w, h)| {
        proptest::collection::vec(0..=depth.max_value(), w * h).prop_map(move |samples| {
            let shape = Shape {
                width: w,
                height: h,
                channels: 1,
            };
            Image::new(shape, depth, samples, format!("synthetic:prop_{w}x{h}")).unwrap()
        })
    })
}

/// Any valid noise config
fn arb_noise_config() -> impl Strategy<Value = NoiseConfig> {
    let seed = any::<u64>().prop_map(Seed::new);
    prop_oneof![
        (0u32..=255, seed.clone()).prop_map(|(s, seed)| NoiseConfig::gaussian(f64::from(s), seed)),
        (1u32..=100_000, seed.clone())
            .prop_map(|(s, seed)| NoiseConfig::poisson(f64::from(s), seed)),
        (0u32..=100, seed.clone())
            .prop_map(|(d, seed)| NoiseConfig::salt_pepper(f64::from(d) / 100.0, seed)),
        (0u32..=100, seed).prop_map(|(v, seed)| NoiseConfig::speckle(f64::from(v) / 100.0, seed)),
    ]
}

/// Valid configs of the cheap algorithms, with arbitrary parameter values
fn arb_denoise_config() -> impl Strategy<Value = DenoiseConfig> {
    prop_oneof![
        (0i64..4).prop_map(|k| DenoiseConfig::new(
            AlgorithmId::Median,
            param_map([("ksize", ParamValue::Int(2 * k + 3))])
        )),
        (1i64..8, 1u32..2000, 1u32..2000).prop_map(|(d, sc, ss)| DenoiseConfig::new(
            AlgorithmId::Bilateral,
            param_map([
                ("d", ParamValue::Int(d)),
                ("sigma_color", ParamValue::Float(f64::from(sc) / 10.0)),
                ("sigma_space", ParamValue::Float(f64::from(ss) / 10.0)),
            ])
        )),
        (1u32..1000, 1i64..50).prop_map(|(w, it)| DenoiseConfig::new(
            AlgorithmId::Tv,
            param_map([
                ("weight", ParamValue::Float(f64::from(w) / 1000.0)),
                ("max_num_iter", ParamValue::Int(it)),
            ])
        )),
        (0usize..5, any::<bool>(), 0u32..100).prop_map(|(w, hard, s)| DenoiseConfig::new(
            AlgorithmId::Wavelet,
            param_map([
                ("wavelet", ParamValue::from(["haar", "db2", "db4", "sym8", "coif1"][w])),
                ("mode", ParamValue::from(if hard { "hard" } else { "soft" })),
                ("sigma", ParamValue::Float(f64::from(s) / 4.0)),
            ])
        )),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: parse(name(config)) == config for noise
    #[test]
    fn prop_noise_name_round_trip(config in arb_noise_config()) {
        let name = config.canonical_name();
        let parsed = parse_noise_name(&name, config.seed).unwrap();
        prop_assert_eq!(parsed.canonical_name(), name);
        prop_assert_eq!(parsed.level(), config.level());
    }

    /// Property: parse(name(config)) == config for denoise
    #[test]
    fn prop_denoise_name_round_trip(config in arb_denoise_config()) {
        let canonical = DenoiseRegistry::with_defaults().validate(&config).unwrap();
        let name = canonical.canonical_name();
        prop_assert_eq!(parse_denoise_name(&name).unwrap(), canonical);
    }

    /// Property: distinct parameters give distinct names
    #[test]
    fn prop_names_do_not_collide(a in arb_noise_config(), b in arb_noise_config()) {
        let same_params = a.noise_type == b.noise_type && a.level() == b.level();
        prop_assert_eq!(a.canonical_name() == b.canonical_name(), same_params);
    }

    /// Property: noise is reproducible and range-preserving
    #[test]
    fn prop_noise_deterministic_and_in_range(image in arb_image(), config in arb_noise_config()) {
        let registry = NoiseRegistry::with_defaults();
        let depth = image.depth();
        match registry.apply_noise(&image, &config) {
            Ok((first, _)) => {
                let (second, _) = registry.apply_noise(&image, &config).unwrap();
                prop_assert_eq!(first.samples(), second.samples());
                prop_assert!(first.samples().iter().all(|&s| s <= depth.max_value()));
            }
            // sigma above an 8-bit full scale
            Err(e) => {
                let is_invalid_param = matches!(e, denoise_lab::Error::InvalidParameter { .. });
                prop_assert!(is_invalid_param);
            }
        }
    }

    /// Property: denoisers keep shape, depth and range
    #[test]
    fn prop_denoise_in_range(image in arb_image(), config in arb_denoise_config()) {
        let out = DenoiseRegistry::with_defaults().apply_denoise(&image, &config).unwrap();
        prop_assert_eq!(out.shape(), image.shape());
        prop_assert!(out.samples().iter().all(|&s| s <= image.depth().max_value()));
    }

    /// Property: metrics of an image against itself are perfect
    #[test]
    fn prop_self_metrics(image in arb_image()) {
        let record = metrics::compute(&image, &image).unwrap();
        prop_assert!(record.psnr.is_infinite());
        prop_assert_eq!(record.mse, 0.0);
        prop_assert_eq!(record.ssim, 1.0);
    }

    /// Property: metrics are symmetric in their arguments
    #[test]
    fn prop_metrics_symmetric(image in arb_image(), seed in any::<u64>()) {
        let (noisy, _) = NoiseRegistry::with_defaults()
            .apply_noise(&image, &NoiseConfig::salt_pepper(0.1, Seed::new(seed)))
            .unwrap();
        let ab = metrics::compute(&image, &noisy).unwrap();
        let ba = metrics::compute(&noisy, &image).unwrap();
        prop_assert!((ab.mse - ba.mse).abs() < 1e-9);
        prop_assert!((ab.ssim - ba.ssim).abs() < 1e-9);
    }
}
