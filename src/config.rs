//! Study configuration files
//!
//! Two JSON documents drive a study:
//!
//! ```json
//! {
//!   "random_seed": 42,
//!   "source_path": "data/clean",
//!   "destination_path": "data/noisy",
//!   "noise_types": {
//!     "gaussian":    { "enabled": true, "sigma": [5, 10, 15] },
//!     "salt_pepper": { "enabled": false, "density": 0.01 }
//!   }
//! }
//! ```
//!
//! ```json
//! {
//!   "algorithms": {
//!     "median": { "parameter_variations": [ { "name": "k3", "ksize": 3 } ] }
//!   },
//!   "noise_to_algorithm_mapping": { "salt_pepper": ["median:k3", "median"] }
//! }
//! ```
//!
//! Both are validated completely at load time, so a sweep never starts with
//! a config it cannot run. Unknown keys are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::denoise::{default_config, AlgorithmId, DenoiseConfig, DenoiseRegistry};
use crate::image::BitDepth;
use crate::noise::{standard_suite, NoiseConfig, NoiseRegistry, NoiseType, DEFAULT_PHOTON_SCALE};
use crate::params::{ParamMap, ParamValue};
use crate::rng::Seed;
use crate::{Error, Result};

fn invalid(msg: impl Into<String>) -> Error {
    Error::ConfigValidation(msg.into())
}

fn read_json(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| invalid(format!("{}: {e}", path.display())))
}

fn to_param(key: &str, value: &Value) -> Result<ParamValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(ParamValue::Int)
            .or_else(|| n.as_f64().map(ParamValue::Float))
            .ok_or_else(|| invalid(format!("'{key}': {n} is not representable"))),
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        other => Err(invalid(format!("'{key}': expected a number or string, found {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct RawDataPaths {
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default, alias = "destination_base")]
    destination: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawNoiseFile {
    #[serde(default)]
    random_seed: Option<Value>,
    #[serde(default)]
    source_path: Option<PathBuf>,
    #[serde(default)]
    destination_path: Option<PathBuf>,
    #[serde(default)]
    data_paths: Option<RawDataPaths>,
    #[serde(default, alias = "current_params")]
    noise_types: BTreeMap<String, serde_json::Map<String, Value>>,
}

/// Noise half of a study: seed, data locations and the noise configs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseStudyConfig {
    /// Run seed shared by every noise config
    pub seed: Seed,
    /// Directory of clean inputs
    pub source_path: Option<PathBuf>,
    /// Root directory for outputs
    pub destination_path: Option<PathBuf>,
    /// Enabled noise configs, one per value combination
    pub noise: Vec<NoiseConfig>,
}

impl Default for NoiseStudyConfig {
    /// The standard suite at seed 42.
    fn default() -> Self {
        let seed = Seed::default();
        Self {
            seed,
            source_path: None,
            destination_path: None,
            noise: standard_suite(seed),
        }
    }
}

impl NoiseStudyConfig {
    /// Read and validate a noise configuration file.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigValidation`] for unreadable files, unknown noise types,
    /// missing or out-of-range parameters; [`Error::InvalidSeed`] for a bad
    /// `random_seed`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&read_json(path)?)?;
        tracing::info!(
            path = %path.display(),
            seed = %config.seed,
            configs = config.noise.len(),
            "noise config loaded"
        );
        Ok(config)
    }

    /// Parse and validate a noise configuration document.
    ///
    /// # Errors
    ///
    /// Same as [`NoiseStudyConfig::load`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawNoiseFile =
            serde_json::from_str(json).map_err(|e| invalid(format!("noise config: {e}")))?;
        let seed = raw
            .random_seed
            .as_ref()
            .map_or(Ok(Seed::default()), Seed::from_json)?;
        let registry = NoiseRegistry::with_defaults();

        let mut noise = Vec::new();
        for (name, entry) in &raw.noise_types {
            let noise_type =
                NoiseType::parse(name).map_err(|_| invalid(format!("unknown noise type '{name}'")))?;
            if !entry.get("enabled").and_then(Value::as_bool).unwrap_or(true) {
                continue;
            }
            for params in expand(noise_type, entry)? {
                let config = NoiseConfig::new(noise_type, params, seed);
                // range check against the widest depth; depth-bound limits are
                // enforced again per image
                let params = registry
                    .validate(&config, BitDepth::U16)
                    .map_err(|e| invalid(format!("noise type '{name}': {e}")))?;
                noise.push(NoiseConfig::new(noise_type, params, seed));
            }
        }

        let (source, destination) = raw
            .data_paths
            .map_or((None, None), |p| (p.source, p.destination));
        Ok(Self {
            seed,
            source_path: raw.source_path.or(source),
            destination_path: raw.destination_path.or(destination),
            noise,
        })
    }
}

/// Expand `{ "sigma": [5, 10] }` into one parameter map per value combination.
fn expand(noise_type: NoiseType, entry: &serde_json::Map<String, Value>) -> Result<Vec<ParamMap>> {
    let mut combos = vec![ParamMap::new()];
    for spec in noise_type.schema() {
        let values: Vec<ParamValue> = match entry.get(spec.name) {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|v| to_param(spec.name, v))
                .collect::<Result<_>>()?,
            Some(Value::Array(_)) => {
                return Err(invalid(format!(
                    "noise type '{noise_type}': '{}' has no values",
                    spec.name
                )))
            }
            Some(value) => vec![to_param(spec.name, value)?],
            // shot noise needs no parameter in older configs
            None if noise_type == NoiseType::Poisson => vec![ParamValue::Float(DEFAULT_PHOTON_SCALE)],
            None => {
                return Err(invalid(format!(
                    "noise type '{noise_type}' is enabled but missing required '{}'",
                    spec.name
                )))
            }
        };
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |v| {
                    let mut next = base.clone();
                    next.insert(spec.name.to_string(), v.clone());
                    next
                })
            })
            .collect();
    }
    Ok(combos)
}

/// A named parameter set for one algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedVariation {
    /// Variation name, unique per algorithm
    pub name: String,
    /// Validated config
    pub config: DenoiseConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawAlgorithm {
    #[serde(default)]
    parameter_variations: Vec<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawDenoiseFile {
    #[serde(default)]
    algorithms: BTreeMap<String, RawAlgorithm>,
    #[serde(default)]
    noise_to_algorithm_mapping: BTreeMap<String, Vec<String>>,
}

/// Denoise half of a study: per-algorithm variations and an optional
/// noise → algorithm mapping that overrides the recommendation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenoiseStudyConfig {
    variations: BTreeMap<AlgorithmId, Vec<NamedVariation>>,
    mapping: BTreeMap<NoiseType, Vec<DenoiseConfig>>,
}

impl DenoiseStudyConfig {
    /// Read and validate a denoise configuration file.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigValidation`] for unreadable files, unknown algorithms or
    /// variations, and parameters the algorithm rejects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&read_json(path)?)?;
        tracing::info!(
            path = %path.display(),
            algorithms = config.variations.len(),
            mapped = config.mapping.len(),
            "denoise config loaded"
        );
        Ok(config)
    }

    /// Parse and validate a denoise configuration document.
    ///
    /// Variation parameters are laid over the algorithm's defaults, so a
    /// variation only needs to name what it changes.
    ///
    /// # Errors
    ///
    /// Same as [`DenoiseStudyConfig::load`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDenoiseFile =
            serde_json::from_str(json).map_err(|e| invalid(format!("denoise config: {e}")))?;
        let registry = DenoiseRegistry::with_defaults();

        let mut variations: BTreeMap<AlgorithmId, Vec<NamedVariation>> = BTreeMap::new();
        for (algo_name, algo) in &raw.algorithms {
            let algorithm = AlgorithmId::parse(algo_name)
                .map_err(|_| invalid(format!("unknown algorithm '{algo_name}'")))?;
            let mut named = Vec::with_capacity(algo.parameter_variations.len());
            for entry in &algo.parameter_variations {
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid(format!("{algo_name}: variation without a name")))?;
                if named.iter().any(|v: &NamedVariation| v.name == name) {
                    return Err(invalid(format!("{algo_name}: duplicate variation '{name}'")));
                }
                let mut config = default_config(algorithm);
                for (key, value) in entry.iter().filter(|(k, _)| k.as_str() != "name") {
                    config.params.insert(key.clone(), to_param(key, value)?);
                }
                let config = registry
                    .validate(&config)
                    .map_err(|e| invalid(format!("{algo_name}:{name}: {e}")))?;
                named.push(NamedVariation {
                    name: name.to_string(),
                    config,
                });
            }
            variations.insert(algorithm, named);
        }

        let mut study = Self {
            variations,
            mapping: BTreeMap::new(),
        };
        for (noise_name, specs) in &raw.noise_to_algorithm_mapping {
            let noise_type = NoiseType::parse(noise_name)
                .map_err(|_| invalid(format!("mapping: unknown noise type '{noise_name}'")))?;
            let configs = specs
                .iter()
                .map(|spec| study.resolve(spec))
                .collect::<Result<Vec<_>>>()?;
            study.mapping.insert(noise_type, configs);
        }
        Ok(study)
    }

    /// Resolve `"<algo>"` or `"<algo>:<variation>"`; `default` names the
    /// stock parameters.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigValidation`] if the algorithm or variation is unknown.
    pub fn resolve(&self, spec: &str) -> Result<DenoiseConfig> {
        let (algo_name, variation) = spec.split_once(':').unwrap_or((spec, "default"));
        let algorithm = AlgorithmId::parse(algo_name)
            .map_err(|_| invalid(format!("unknown algorithm '{algo_name}' in '{spec}'")))?;
        if variation == "default" {
            return Ok(default_config(algorithm));
        }
        self.variations(algorithm)
            .iter()
            .find(|v| v.name == variation)
            .map(|v| v.config.clone())
            .ok_or_else(|| invalid(format!("unknown variation '{variation}' of {algorithm}")))
    }

    /// Configured variations of `algorithm`, possibly empty.
    #[must_use]
    pub fn variations(&self, algorithm: AlgorithmId) -> &[NamedVariation] {
        self.variations.get(&algorithm).map_or(&[], Vec::as_slice)
    }

    /// Override list for `noise_type`, if the file maps it.
    #[must_use]
    pub fn mapping_for(&self, noise_type: NoiseType) -> Option<&[DenoiseConfig]> {
        self.mapping.get(&noise_type).map(Vec::as_slice)
    }

    /// Configured variations of `algorithm`, or its defaults when none are
    /// configured.
    #[must_use]
    pub fn configs_for(&self, algorithm: AlgorithmId) -> Vec<DenoiseConfig> {
        let named = self.variations(algorithm);
        if named.is_empty() {
            vec![default_config(algorithm)]
        } else {
            named.iter().map(|v| v.config.clone()).collect()
        }
    }
}
