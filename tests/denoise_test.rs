//! Denoise registry tests: dispatch, validation, recommendation table

use denoise_lab::denoise::{
    default_config, recommend, recommend_for, recommended_algorithms, AlgorithmId, DenoiseConfig,
    DenoiseRegistry, Denoiser, InputDomain,
};
use denoise_lab::image::{BitDepth, Image, Plane};
use denoise_lab::metrics;
use denoise_lab::noise::{NoiseConfig, NoiseRegistry, NoiseType};
use denoise_lab::params::{param_map, ParamMap, ParamValue};
use denoise_lab::rng::Seed;
use denoise_lab::Error;

fn noisy_gradient(sigma: f64) -> (Image, Image) {
    let truth = Image::gradient(40, 40, BitDepth::U8).unwrap();
    let (noisy, _) = NoiseRegistry::with_defaults()
        .apply_noise(&truth, &NoiseConfig::gaussian(sigma, Seed::new(42)))
        .unwrap();
    (truth, noisy)
}

#[test]
fn test_every_default_preserves_shape_and_range() {
    let registry = DenoiseRegistry::with_defaults();
    let (_, noisy) = noisy_gradient(15.0);
    for id in AlgorithmId::ALL {
        let out = registry.apply_denoise(&noisy, &default_config(id)).unwrap();
        assert_eq!(out.shape(), noisy.shape(), "{id}");
        assert_eq!(out.depth(), noisy.depth(), "{id}");
        assert!(out.samples().iter().all(|&s| s <= 255), "{id}");
    }
}

#[test]
fn test_denoise_is_deterministic() {
    let registry = DenoiseRegistry::with_defaults();
    let (_, noisy) = noisy_gradient(10.0);
    for id in AlgorithmId::ALL {
        let a = registry.apply_denoise(&noisy, &default_config(id)).unwrap();
        let b = registry.apply_denoise(&noisy, &default_config(id)).unwrap();
        assert_eq!(a.identity(), b.identity(), "{id}");
    }
}

#[test]
fn test_median_removes_impulses() {
    let truth = Image::gradient(32, 32, BitDepth::U8).unwrap();
    let (noisy, _) = NoiseRegistry::with_defaults()
        .apply_noise(&truth, &NoiseConfig::salt_pepper(0.05, Seed::new(42)))
        .unwrap();
    let denoised = DenoiseRegistry::with_defaults()
        .apply_denoise(&noisy, &recommend_for(AlgorithmId::Median, NoiseType::SaltPepper, 0.05))
        .unwrap();
    let before = metrics::compute(&truth, &noisy).unwrap();
    let after = metrics::compute(&truth, &denoised).unwrap();
    assert!(after.psnr > before.psnr);
}

#[test]
fn test_even_median_kernel_rejected() {
    let (_, noisy) = noisy_gradient(5.0);
    let config = DenoiseConfig::new(AlgorithmId::Median, param_map([("ksize", ParamValue::Int(4))]));
    match DenoiseRegistry::with_defaults().apply_denoise(&noisy, &config) {
        Err(Error::ParameterOutOfRange {
            algorithm,
            parameter,
            ..
        }) => {
            assert_eq!(algorithm, "median");
            assert_eq!(parameter, "ksize");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unknown_choice_rejected() {
    let mut config = default_config(AlgorithmId::Wavelet);
    config
        .params
        .insert("wavelet".to_string(), ParamValue::from("sym8"));
    assert!(matches!(
        DenoiseRegistry::with_defaults().validate(&config),
        Err(Error::ParameterOutOfRange { .. })
    ));
}

#[test]
fn test_validate_canonicalizes() {
    let config = DenoiseConfig::new(
        AlgorithmId::Tv,
        param_map([
            ("weight", ParamValue::Float(0.2)),
            ("max_num_iter", ParamValue::Float(50.0)),
        ]),
    )
    .tuned_for(NoiseType::Gaussian, 20.0);
    let valid = DenoiseRegistry::with_defaults().validate(&config).unwrap();
    assert_eq!(valid.params["max_num_iter"], ParamValue::Int(50));
    assert_eq!(valid.tuned_for, config.tuned_for);
}

struct Flatten;

impl Denoiser for Flatten {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Median
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::Native
    }

    fn denoise(&self, plane: &Plane, _params: &ParamMap) -> anyhow::Result<Plane> {
        Ok(Plane::filled(plane.width, plane.height, 0.0))
    }
}

#[test]
fn test_registered_strategy_replaces_builtin() {
    let mut registry = DenoiseRegistry::with_defaults();
    registry.register(Box::new(Flatten));
    let (_, noisy) = noisy_gradient(5.0);
    let out = registry
        .apply_denoise(&noisy, &default_config(AlgorithmId::Median))
        .unwrap();
    assert!(out.samples().iter().all(|&s| s == 0));
    assert_eq!(registry.ids().len(), 6);
}

#[test]
fn test_recommendation_table() {
    assert_eq!(
        recommended_algorithms(NoiseType::SaltPepper),
        &[AlgorithmId::Median]
    );
    let gaussian = recommend(NoiseType::Gaussian, 10.0);
    assert_eq!(gaussian.len(), 5);
    assert_eq!(gaussian[0].algorithm, AlgorithmId::Bm3d);
    assert_eq!(gaussian[0].params["sigma_psd"].as_f64(), Some(0.039));
    assert!(gaussian.iter().all(|c| c.tuned_for.is_some()));

    let registry = DenoiseRegistry::with_defaults();
    for noise_type in NoiseType::ALL {
        for config in recommend(noise_type, 0.05) {
            registry.validate(&config).unwrap();
        }
    }
}

#[test]
fn test_median_ksize_follows_density() {
    let ksize = |density| recommend_for(AlgorithmId::Median, NoiseType::SaltPepper, density).params["ksize"].clone();
    assert_eq!(ksize(0.01), ParamValue::Int(3));
    assert_eq!(ksize(0.05), ParamValue::Int(5));
    assert_eq!(ksize(0.3), ParamValue::Int(7));
}
