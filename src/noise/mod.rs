//! Noise Model Registry
//!
//! Maps a [`NoiseType`] to a [`NoiseModel`] strategy. Every call draws from a
//! fresh [`RandomStream`] derived from the config's seed plus
//! `(image identity, noise token, canonical parameter string)`, so the same
//! image and config always produce the same noisy image regardless of what
//! else the process has done.
//!
//! ## Example
//!
//! ```rust
//! use denoise_lab::image::{BitDepth, Image};
//! use denoise_lab::noise::{NoiseConfig, NoiseRegistry};
//! use denoise_lab::rng::Seed;
//!
//! let registry = NoiseRegistry::with_defaults();
//! let truth = Image::gradient(32, 32, BitDepth::U8)?;
//! let config = NoiseConfig::gaussian(10.0, Seed::new(42));
//!
//! let (a, _) = registry.apply_noise(&truth, &config)?;
//! let (b, _) = registry.apply_noise(&truth, &config)?;
//! assert_eq!(a.samples(), b.samples());
//! # Ok::<(), denoise_lab::Error>(())
//! ```

mod gaussian;
mod poisson;
mod salt_pepper;
mod speckle;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use gaussian::GaussianNoise;
pub use poisson::{PoissonNoise, DEFAULT_PHOTON_SCALE};
pub use salt_pepper::SaltPepperNoise;
pub use speckle::SpeckleNoise;

use crate::image::{BitDepth, Image};
use crate::params::{self, conform, param_map, ParamMap, ParamSpec, SchemaViolation};
use crate::rng::{self, RandomStream, Seed, StreamState};
use crate::{Error, Result};

/// Supported noise families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseType {
    /// Additive zero-mean Gaussian noise
    Gaussian,
    /// Photon shot noise
    Poisson,
    /// Impulse noise (samples forced to 0 or full scale)
    #[serde(alias = "saltpepper")]
    SaltPepper,
    /// Multiplicative Gaussian noise
    Speckle,
}

impl NoiseType {
    /// All noise types, in canonical order.
    pub const ALL: [Self; 4] = [Self::Gaussian, Self::Poisson, Self::SaltPepper, Self::Speckle];

    /// Identifier used in configs and ledger payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Poisson => "poisson",
            Self::SaltPepper => "salt_pepper",
            Self::Speckle => "speckle",
        }
    }

    /// Token used in canonical names (no underscore, so names split cleanly).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::SaltPepper => "saltpepper",
            other => other.as_str(),
        }
    }

    /// Parameter schema of the built-in model.
    #[must_use]
    pub const fn schema(self) -> &'static [ParamSpec] {
        match self {
            Self::Gaussian => gaussian::SCHEMA,
            Self::Poisson => poisson::SCHEMA,
            Self::SaltPepper => salt_pepper::SCHEMA,
            Self::Speckle => speckle::SCHEMA,
        }
    }

    /// Name of the parameter that expresses the noise level.
    #[must_use]
    pub const fn level_parameter(self) -> &'static str {
        match self {
            Self::Gaussian => "sigma",
            Self::Poisson => "scale",
            Self::SaltPepper => "density",
            Self::Speckle => "variance",
        }
    }

    /// Parse an identifier or canonical token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNoiseType`] for anything else.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Self::Gaussian),
            "poisson" => Ok(Self::Poisson),
            "salt_pepper" | "saltpepper" => Ok(Self::SaltPepper),
            "speckle" => Ok(Self::Speckle),
            _ => Err(Error::UnknownNoiseType(name.to_string())),
        }
    }
}

impl std::fmt::Display for NoiseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A noise type with concrete parameters and the seed its stream derives from.
///
/// Construction does not validate; [`NoiseRegistry::apply_noise`] does, so a
/// bad config fails the cell that uses it rather than the whole sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Noise family
    pub noise_type: NoiseType,
    /// Parameters, keyed by schema name
    pub params: ParamMap,
    /// Run seed
    pub seed: Seed,
}

impl NoiseConfig {
    /// Build a config from parts.
    #[must_use]
    pub const fn new(noise_type: NoiseType, params: ParamMap, seed: Seed) -> Self {
        Self {
            noise_type,
            params,
            seed,
        }
    }

    /// Additive Gaussian noise with standard deviation `sigma` (native scale).
    #[must_use]
    pub fn gaussian(sigma: f64, seed: Seed) -> Self {
        Self::new(NoiseType::Gaussian, param_map([("sigma", sigma)]), seed)
    }

    /// Shot noise with `scale` photons at full scale.
    #[must_use]
    pub fn poisson(scale: f64, seed: Seed) -> Self {
        Self::new(NoiseType::Poisson, param_map([("scale", scale)]), seed)
    }

    /// Impulse noise hitting a `density` fraction of samples.
    #[must_use]
    pub fn salt_pepper(density: f64, seed: Seed) -> Self {
        Self::new(NoiseType::SaltPepper, param_map([("density", density)]), seed)
    }

    /// Multiplicative noise with the given `variance`.
    #[must_use]
    pub fn speckle(variance: f64, seed: Seed) -> Self {
        Self::new(NoiseType::Speckle, param_map([("variance", variance)]), seed)
    }

    /// Numeric noise level (the type's level parameter), if present.
    #[must_use]
    pub fn level(&self) -> Option<f64> {
        self.params
            .get(self.noise_type.level_parameter())
            .and_then(params::ParamValue::as_f64)
    }
}

/// A noise family: a pure function of image, parameters and random stream.
pub trait NoiseModel: Send + Sync {
    /// Family this model implements.
    fn noise_type(&self) -> NoiseType;

    /// Parameter schema.
    fn schema(&self) -> &'static [ParamSpec] {
        self.noise_type().schema()
    }

    /// Constraints that depend on the image (e.g. a sigma bounded by full scale).
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] describing the first violated constraint.
    fn check(&self, _params: &ParamMap, _depth: BitDepth) -> std::result::Result<(), SchemaViolation> {
        Ok(())
    }

    /// Produce noisy samples. `params` has already been validated and
    /// canonicalized. Output must have the input's length and lie in the
    /// depth's valid range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if a distribution cannot be built.
    fn apply(&self, image: &Image, params: &ParamMap, rng: &mut RandomStream) -> Result<Vec<u16>>;
}

/// Registry of noise models keyed by [`NoiseType`].
pub struct NoiseRegistry {
    models: FxHashMap<NoiseType, Box<dyn NoiseModel>>,
}

impl std::fmt::Debug for NoiseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.models.keys().collect();
        types.sort();
        f.debug_struct("NoiseRegistry").field("models", &types).finish()
    }
}

impl Default for NoiseRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl NoiseRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            models: FxHashMap::default(),
        }
    }

    /// Registry with the four built-in models.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GaussianNoise));
        registry.register(Box::new(PoissonNoise));
        registry.register(Box::new(SaltPepperNoise));
        registry.register(Box::new(SpeckleNoise));
        registry
    }

    /// Add or replace the model for its noise type.
    pub fn register(&mut self, model: Box<dyn NoiseModel>) {
        self.models.insert(model.noise_type(), model);
    }

    /// Whether a model is registered for `noise_type`.
    #[must_use]
    pub fn contains(&self, noise_type: NoiseType) -> bool {
        self.models.contains_key(&noise_type)
    }

    fn model(&self, noise_type: NoiseType) -> Result<&dyn NoiseModel> {
        self.models
            .get(&noise_type)
            .map(Box::as_ref)
            .ok_or_else(|| Error::UnknownNoiseType(noise_type.to_string()))
    }

    /// Validate `config` for an image of the given depth and return its
    /// canonical parameters.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNoiseType`] or [`Error::InvalidParameter`].
    pub fn validate(&self, config: &NoiseConfig, depth: BitDepth) -> Result<ParamMap> {
        let model = self.model(config.noise_type)?;
        let invalid = |v: SchemaViolation| Error::InvalidParameter {
            model: config.noise_type.to_string(),
            parameter: v.parameter,
            reason: v.reason,
        };
        let params = conform(model.schema(), &config.params).map_err(invalid)?;
        model.check(&params, depth).map_err(invalid)?;
        Ok(params)
    }

    /// Apply `config` to `image`.
    ///
    /// Returns the noisy image (identity = content address) and the final
    /// state of the stream that produced it.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNoiseType`] or [`Error::InvalidParameter`].
    pub fn apply_noise(&self, image: &Image, config: &NoiseConfig) -> Result<(Image, StreamState)> {
        let model = self.model(config.noise_type)?;
        let params = self.validate(config, image.depth())?;
        let discriminators = [
            image.identity().to_string(),
            config.noise_type.token().to_string(),
            params::canonical_param_string(model.schema(), &params),
        ];
        let mut stream = rng::derive(config.seed, &discriminators);
        let samples = model.apply(image, &params, &mut stream)?;
        let noisy = Image::derived(image.shape(), image.depth(), samples)?;
        tracing::debug!(
            noise = %config.noise_type,
            source = image.identity(),
            output = noisy.identity(),
            "noise applied"
        );
        Ok((noisy, stream.state()))
    }
}

/// The standard study suite: gaussian σ ∈ {5, 10, 15, 20}, poisson at
/// [`DEFAULT_PHOTON_SCALE`], salt & pepper density ∈ {0.01, 0.05, 0.1},
/// speckle variance ∈ {0.01, 0.05, 0.1}.
#[must_use]
pub fn standard_suite(seed: Seed) -> Vec<NoiseConfig> {
    let mut suite: Vec<NoiseConfig> = [5.0, 10.0, 15.0, 20.0]
        .into_iter()
        .map(|sigma| NoiseConfig::gaussian(sigma, seed))
        .collect();
    suite.push(NoiseConfig::poisson(DEFAULT_PHOTON_SCALE, seed));
    suite.extend(
        [0.01, 0.05, 0.1]
            .into_iter()
            .map(|d| NoiseConfig::salt_pepper(d, seed)),
    );
    suite.extend(
        [0.01, 0.05, 0.1]
            .into_iter()
            .map(|v| NoiseConfig::speckle(v, seed)),
    );
    suite
}

/// Look up a canonical float parameter. Validation guarantees presence.
pub(crate) fn float_param(params: &ParamMap, name: &str) -> f64 {
    params.get(name).and_then(params::ParamValue::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_type_parse_accepts_token_and_id() {
        assert_eq!(NoiseType::parse("saltpepper").unwrap(), NoiseType::SaltPepper);
        assert_eq!(NoiseType::parse("salt_pepper").unwrap(), NoiseType::SaltPepper);
        assert!(matches!(
            NoiseType::parse("pink"),
            Err(Error::UnknownNoiseType(_))
        ));
    }

    #[test]
    fn test_standard_suite_shape() {
        let suite = standard_suite(Seed::new(42));
        assert_eq!(suite.len(), 11);
        assert!(suite.iter().all(|c| c.seed == Seed::new(42)));
        assert_eq!(suite[1].level(), Some(10.0));
    }

    #[test]
    fn test_empty_registry_reports_unknown_type() {
        let registry = NoiseRegistry::new();
        let img = Image::gradient(8, 8, BitDepth::U8).unwrap();
        let err = registry
            .apply_noise(&img, &NoiseConfig::gaussian(5.0, Seed::default()))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNoiseType(_)));
    }

    #[test]
    fn test_invalid_parameter_names_model() {
        let registry = NoiseRegistry::with_defaults();
        let img = Image::gradient(8, 8, BitDepth::U8).unwrap();
        let err = registry
            .apply_noise(&img, &NoiseConfig::salt_pepper(1.5, Seed::default()))
            .unwrap_err();
        match err {
            Error::InvalidParameter { model, parameter, .. } => {
                assert_eq!(model, "salt_pepper");
                assert_eq!(parameter, "density");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
