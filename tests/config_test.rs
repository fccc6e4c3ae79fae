//! Configuration file tests

use std::io::Write;

use denoise_lab::config::{DenoiseStudyConfig, NoiseStudyConfig};
use denoise_lab::denoise::{default_config, AlgorithmId};
use denoise_lab::ledger::CanonicalName;
use denoise_lab::noise::{NoiseType, DEFAULT_PHOTON_SCALE};
use denoise_lab::params::ParamValue;
use denoise_lab::rng::Seed;
use denoise_lab::Error;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_noise_config_file() {
    let file = write_temp(
        r#"{
            "random_seed": 1234,
            "source_path": "data/clean",
            "destination_path": "data/noisy",
            "comment": "unknown keys are ignored",
            "noise_types": {
                "gaussian": { "enabled": true, "sigma": [5, 10, 15] },
                "salt_pepper": { "enabled": true, "density": 0.01 },
                "speckle": { "enabled": false, "variance": 0.05 },
                "poisson": { "enabled": true }
            }
        }"#,
    );
    let config = NoiseStudyConfig::load(file.path()).unwrap();
    assert_eq!(config.seed, Seed::new(1234));
    assert_eq!(config.noise.len(), 5);
    assert!(config.noise.iter().all(|c| c.seed == Seed::new(1234)));
    assert!(config.noise.iter().all(|c| c.noise_type != NoiseType::Speckle));

    let names: Vec<String> = config.noise.iter().map(CanonicalName::canonical_name).collect();
    assert!(names.contains(&"gaussian_sigma15".to_string()));
    assert!(names.contains(&"saltpepper_d001".to_string()));
    let poisson = config
        .noise
        .iter()
        .find(|c| c.noise_type == NoiseType::Poisson)
        .unwrap();
    assert_eq!(poisson.level(), Some(DEFAULT_PHOTON_SCALE));
}

#[test]
fn test_missing_required_key() {
    let err = NoiseStudyConfig::from_json_str(r#"{"noise_types": {"gaussian": {"enabled": true}}}"#)
        .unwrap_err();
    assert!(matches!(err, Error::ConfigValidation(ref m) if m.contains("sigma")));
}

#[test]
fn test_out_of_range_rejected_at_load() {
    let err = NoiseStudyConfig::from_json_str(
        r#"{"noise_types": {"salt_pepper": {"density": [0.01, 1.5]}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::ConfigValidation(_)));
}

#[test]
fn test_disabled_type_is_not_validated() {
    let config = NoiseStudyConfig::from_json_str(
        r#"{"noise_types": {"speckle": {"enabled": false, "variance": 7}}}"#,
    )
    .unwrap();
    assert!(config.noise.is_empty());
}

#[test]
fn test_bad_seeds() {
    for seed in ["-1", "1.5", "\"42\"", "18446744073709551616"] {
        let json = format!(r#"{{"random_seed": {seed}, "noise_types": {{}}}}"#);
        assert!(
            matches!(NoiseStudyConfig::from_json_str(&json), Err(Error::InvalidSeed(_))),
            "{seed}"
        );
    }
}

#[test]
fn test_unknown_noise_type() {
    assert!(matches!(
        NoiseStudyConfig::from_json_str(r#"{"noise_types": {"pink": {"level": 1}}}"#),
        Err(Error::ConfigValidation(_))
    ));
}

#[test]
fn test_load_denoise_config_file() {
    let file = write_temp(
        r#"{
            "algorithms": {
                "median": { "parameter_variations": [
                    { "name": "k3", "ksize": 3 },
                    { "name": "k7", "ksize": 7 }
                ]},
                "nlm": { "parameter_variations": [ { "name": "strong", "h": 20 } ] }
            },
            "noise_to_algorithm_mapping": {
                "salt_pepper": ["median:k3", "median:k7"],
                "gaussian": ["nlm:strong", "bm3d"]
            }
        }"#,
    );
    let study = DenoiseStudyConfig::load(file.path()).unwrap();
    assert_eq!(study.variations(AlgorithmId::Median).len(), 2);

    let sp = study.mapping_for(NoiseType::SaltPepper).unwrap();
    assert_eq!(sp[1].canonical_name(), "median_k7");
    let gaussian = study.mapping_for(NoiseType::Gaussian).unwrap();
    assert_eq!(gaussian[0].params["h"], ParamValue::Float(20.0));
    assert_eq!(gaussian[1], default_config(AlgorithmId::Bm3d));
    assert!(study.mapping_for(NoiseType::Speckle).is_none());

    assert_eq!(study.configs_for(AlgorithmId::Tv), vec![default_config(AlgorithmId::Tv)]);
    assert_eq!(study.configs_for(AlgorithmId::Median).len(), 2);
}

#[test]
fn test_denoise_config_rejects_bad_variation() {
    for json in [
        r#"{"algorithms": {"median": {"parameter_variations": [{"name": "k4", "ksize": 4}]}}}"#,
        r#"{"algorithms": {"gauss": {"parameter_variations": []}}}"#,
        r#"{"noise_to_algorithm_mapping": {"gaussian": ["median:nope"]}}"#,
        r#"{"algorithms": {"tv": {"parameter_variations": [{"weight": 0.2}]}}}"#,
    ] {
        assert!(
            matches!(DenoiseStudyConfig::from_json_str(json), Err(Error::ConfigValidation(_))),
            "{json}"
        );
    }
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        NoiseStudyConfig::load("/nonexistent/noise.json"),
        Err(Error::ConfigValidation(_))
    ));
}
