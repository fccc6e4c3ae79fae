//! Recommended-parameter table
//!
//! Levels are read in each noise type's own parameter: gaussian `sigma` on
//! the 8-bit scale (callers with deeper images rescale by `255 / max`),
//! poisson `scale`, salt & pepper `density`, speckle `variance`.

use super::{AlgorithmId, DenoiseConfig};
use crate::noise::NoiseType;
use crate::params::{param_map, ParamValue};

/// Algorithms worth running against a noise family, best first.
#[must_use]
pub const fn recommended_algorithms(noise_type: NoiseType) -> &'static [AlgorithmId] {
    match noise_type {
        NoiseType::Gaussian => &[
            AlgorithmId::Bm3d,
            AlgorithmId::Nlm,
            AlgorithmId::Bilateral,
            AlgorithmId::Wavelet,
            AlgorithmId::Tv,
        ],
        NoiseType::Poisson => &[AlgorithmId::Bm3d, AlgorithmId::Nlm, AlgorithmId::Wavelet],
        NoiseType::SaltPepper => &[AlgorithmId::Median],
        NoiseType::Speckle => &[AlgorithmId::Bm3d, AlgorithmId::Nlm, AlgorithmId::Median],
    }
}

/// Stock parameters for an algorithm.
#[must_use]
pub fn default_config(algorithm: AlgorithmId) -> DenoiseConfig {
    let params = match algorithm {
        AlgorithmId::Median => param_map([("ksize", ParamValue::Int(5))]),
        AlgorithmId::Bilateral => param_map([
            ("d", ParamValue::Int(9)),
            ("sigma_color", ParamValue::Float(75.0)),
            ("sigma_space", ParamValue::Float(75.0)),
        ]),
        AlgorithmId::Nlm => param_map([
            ("h", ParamValue::Float(10.0)),
            ("template_window_size", ParamValue::Int(7)),
            ("search_window_size", ParamValue::Int(21)),
        ]),
        AlgorithmId::Bm3d => param_map([
            ("sigma_psd", ParamValue::Float(0.039)),
            ("stage", ParamValue::from("all")),
            ("profile", ParamValue::from("np")),
        ]),
        AlgorithmId::Wavelet => param_map([
            ("wavelet", ParamValue::from("db4")),
            ("mode", ParamValue::from("soft")),
            ("sigma", ParamValue::Float(0.0)),
        ]),
        AlgorithmId::Tv => param_map([
            ("weight", ParamValue::Float(0.1)),
            ("max_num_iter", ParamValue::Int(200)),
        ]),
    };
    DenoiseConfig::new(algorithm, params)
}

/// Approximate noise standard deviation on the 8-bit scale at mid-gray.
fn effective_sigma(noise_type: NoiseType, level: f64) -> Option<f64> {
    if !level.is_finite() || level <= 0.0 {
        return None;
    }
    match noise_type {
        NoiseType::Gaussian => Some(level),
        NoiseType::Poisson => Some((0.5 / level).sqrt() * 255.0),
        NoiseType::Speckle => Some(0.5 * level.sqrt() * 255.0),
        NoiseType::SaltPepper => None,
    }
}

/// Round to a whole number of `1 / per_unit` steps.
fn round_to(value: f64, per_unit: f64) -> f64 {
    (value * per_unit).round() / per_unit
}

/// Parameters for `algorithm` tuned to a noise condition.
///
/// Falls back to [`default_config`] values when the level carries no usable
/// information for that algorithm. Provenance is always filled in.
#[must_use]
pub fn recommend_for(algorithm: AlgorithmId, noise_type: NoiseType, level: f64) -> DenoiseConfig {
    let mut config = default_config(algorithm);
    let sigma = effective_sigma(noise_type, level);
    let set = |config: &mut DenoiseConfig, name: &str, value: ParamValue| {
        config.params.insert(name.to_string(), value);
    };

    match (algorithm, sigma) {
        (AlgorithmId::Median, _) if noise_type == NoiseType::SaltPepper => {
            let ksize = if level <= 0.02 {
                3
            } else if level <= 0.1 {
                5
            } else {
                7
            };
            set(&mut config, "ksize", ParamValue::Int(ksize));
        }
        (AlgorithmId::Median, Some(s)) => {
            set(&mut config, "ksize", ParamValue::Int(if s < 10.0 { 3 } else { 5 }));
        }
        (AlgorithmId::Bilateral, Some(s)) => {
            set(&mut config, "sigma_color", ParamValue::Float((5.0 * s).round().clamp(25.0, 150.0)));
        }
        (AlgorithmId::Nlm, Some(s)) => {
            set(&mut config, "h", ParamValue::Float(s.round().clamp(3.0, 100.0)));
        }
        (AlgorithmId::Bm3d, Some(s)) => {
            set(
                &mut config,
                "sigma_psd",
                ParamValue::Float(round_to(s / 255.0, 1000.0).clamp(0.001, 1.0)),
            );
        }
        (AlgorithmId::Tv, Some(s)) => {
            set(
                &mut config,
                "weight",
                ParamValue::Float(round_to(2.0 * s / 255.0, 100.0).clamp(0.05, 1.0)),
            );
        }
        // wavelet estimates sigma itself
        _ => {}
    }
    config.tuned_for(noise_type, level)
}

/// Tuned configs for every algorithm recommended against `noise_type`.
#[must_use]
pub fn recommend(noise_type: NoiseType, level: f64) -> Vec<DenoiseConfig> {
    recommended_algorithms(noise_type)
        .iter()
        .map(|&algorithm| recommend_for(algorithm, noise_type, level))
        .collect()
}
