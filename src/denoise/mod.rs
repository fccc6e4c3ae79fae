//! Denoise Algorithm Registry
//!
//! Algorithms are opaque [`Denoiser`] strategies looked up by [`AlgorithmId`].
//! The registry owns everything around the call:
//!
//! 1. schema validation (`ParameterOutOfRange`)
//! 2. domain conversion: `Native` strategies see samples on the image's integer
//!    scale, `UnitInterval` strategies see `value / max_value`
//! 3. per-channel dispatch for RGB images
//! 4. rounding and saturation back to the image's bit depth
//! 5. containment: strategy errors *and panics* become `AlgorithmRuntime`
//!
//! so a strategy only has to turn one [`Plane`] into another.

mod bilateral;
mod bm3d;
mod median;
mod nlm;
mod recommend;
mod tv;
mod wavelet;

use std::panic::{catch_unwind, AssertUnwindSafe};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use bilateral::Bilateral;
pub use bm3d::Bm3d;
pub use median::Median;
pub use nlm::NonLocalMeans;
pub use recommend::{default_config, recommend, recommend_for, recommended_algorithms};
pub use tv::TotalVariation;
pub use wavelet::Wavelet;

use crate::image::{Image, Plane};
use crate::noise::NoiseType;
use crate::params::{conform, ParamMap, ParamSpec, ParamValue, SchemaViolation};
use crate::{Error, Result};

/// Identifiers of the built-in algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmId {
    /// Median filter
    Median,
    /// Bilateral filter
    Bilateral,
    /// Non-local means
    Nlm,
    /// Block-matching and 3-D filtering
    Bm3d,
    /// Wavelet shrinkage
    Wavelet,
    /// Total-variation (Chambolle)
    Tv,
}

impl AlgorithmId {
    /// All algorithms, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Median,
        Self::Bilateral,
        Self::Nlm,
        Self::Bm3d,
        Self::Wavelet,
        Self::Tv,
    ];

    /// Identifier used in configs and canonical names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Bilateral => "bilateral",
            Self::Nlm => "nlm",
            Self::Bm3d => "bm3d",
            Self::Wavelet => "wavelet",
            Self::Tv => "tv",
        }
    }

    /// Parameter schema of the built-in strategy.
    #[must_use]
    pub const fn schema(self) -> &'static [ParamSpec] {
        match self {
            Self::Median => median::SCHEMA,
            Self::Bilateral => bilateral::SCHEMA,
            Self::Nlm => nlm::SCHEMA,
            Self::Bm3d => bm3d::SCHEMA,
            Self::Wavelet => wavelet::SCHEMA,
            Self::Tv => tv::SCHEMA,
        }
    }

    /// Parse an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAlgorithm`] for anything else.
    pub fn parse(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == lower)
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }
}

impl std::fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value representation a strategy expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDomain {
    /// Samples on the image's integer scale, `0..=max_value`
    Native,
    /// Samples divided by `max_value`, `0.0..=1.0`
    UnitInterval,
}

/// Noise condition a config was tuned for. Not part of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Noise family
    pub noise_type: NoiseType,
    /// Noise level the parameters were chosen for
    pub level: f64,
}

/// An algorithm with concrete parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenoiseConfig {
    /// Algorithm identifier
    pub algorithm: AlgorithmId,
    /// Parameters, keyed by schema name
    pub params: ParamMap,
    /// Optional tuning provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuned_for: Option<Provenance>,
}

impl DenoiseConfig {
    /// Config without provenance.
    #[must_use]
    pub const fn new(algorithm: AlgorithmId, params: ParamMap) -> Self {
        Self {
            algorithm,
            params,
            tuned_for: None,
        }
    }

    /// Attach tuning provenance.
    #[must_use]
    pub fn tuned_for(mut self, noise_type: NoiseType, level: f64) -> Self {
        self.tuned_for = Some(Provenance { noise_type, level });
        self
    }
}

/// A denoising strategy.
pub trait Denoiser: Send + Sync {
    /// Identifier this strategy is registered under.
    fn id(&self) -> AlgorithmId;

    /// Parameter schema.
    fn schema(&self) -> &'static [ParamSpec] {
        self.id().schema()
    }

    /// Value representation this strategy expects.
    fn input_domain(&self) -> InputDomain;

    /// Constraints spanning several parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] describing the first violated constraint.
    fn check(&self, _params: &ParamMap) -> std::result::Result<(), SchemaViolation> {
        Ok(())
    }

    /// Denoise one channel plane. `params` is validated and canonical.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying computation.
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane>;
}

/// Registry of denoising strategies keyed by [`AlgorithmId`].
pub struct DenoiseRegistry {
    algorithms: FxHashMap<AlgorithmId, Box<dyn Denoiser>>,
}

impl std::fmt::Debug for DenoiseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenoiseRegistry")
            .field("algorithms", &self.ids())
            .finish()
    }
}

impl Default for DenoiseRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DenoiseRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithms: FxHashMap::default(),
        }
    }

    /// Registry with the six built-in strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Median));
        registry.register(Box::new(Bilateral));
        registry.register(Box::new(NonLocalMeans));
        registry.register(Box::new(Bm3d));
        registry.register(Box::new(Wavelet));
        registry.register(Box::new(TotalVariation));
        registry
    }

    /// Add or replace the strategy for its identifier.
    pub fn register(&mut self, denoiser: Box<dyn Denoiser>) {
        self.algorithms.insert(denoiser.id(), denoiser);
    }

    /// Registered identifiers in canonical order.
    #[must_use]
    pub fn ids(&self) -> Vec<AlgorithmId> {
        let mut ids: Vec<_> = self.algorithms.keys().copied().collect();
        ids.sort();
        ids
    }

    fn strategy(&self, id: AlgorithmId) -> Result<&dyn Denoiser> {
        self.algorithms
            .get(&id)
            .map(Box::as_ref)
            .ok_or_else(|| Error::UnknownAlgorithm(id.to_string()))
    }

    /// Validate `config` and return it with canonical parameters.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownAlgorithm`] or [`Error::ParameterOutOfRange`].
    pub fn validate(&self, config: &DenoiseConfig) -> Result<DenoiseConfig> {
        let strategy = self.strategy(config.algorithm)?;
        let out_of_range = |v: SchemaViolation| Error::ParameterOutOfRange {
            algorithm: config.algorithm.to_string(),
            parameter: v.parameter,
            reason: v.reason,
        };
        let params = conform(strategy.schema(), &config.params).map_err(out_of_range)?;
        strategy.check(&params).map_err(out_of_range)?;
        Ok(DenoiseConfig {
            algorithm: config.algorithm,
            params,
            tuned_for: config.tuned_for,
        })
    }

    /// Denoise `image` with `config`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownAlgorithm`], [`Error::ParameterOutOfRange`], or
    /// [`Error::AlgorithmRuntime`] if the strategy fails or panics.
    pub fn apply_denoise(&self, image: &Image, config: &DenoiseConfig) -> Result<Image> {
        let strategy = self.strategy(config.algorithm)?;
        let params = self.validate(config)?.params;
        let scale = match strategy.input_domain() {
            InputDomain::Native => 1.0,
            InputDomain::UnitInterval => image.max_value(),
        };
        let runtime = |source: anyhow::Error| Error::AlgorithmRuntime {
            algorithm: config.algorithm.to_string(),
            source,
        };

        let mut out = Vec::with_capacity(image.channels());
        for plane in image.to_planes(scale) {
            let result = catch_unwind(AssertUnwindSafe(|| strategy.denoise(&plane, &params)))
                .map_err(|payload| runtime(anyhow::anyhow!("panicked: {}", panic_message(&*payload))))?
                .map_err(runtime)?;
            if result.width != plane.width
                || result.height != plane.height
                || result.data.len() != plane.data.len()
            {
                return Err(runtime(anyhow::anyhow!(
                    "returned a {}x{} plane for a {}x{} input",
                    result.width,
                    result.height,
                    plane.width,
                    plane.height
                )));
            }
            out.push(result);
        }
        Image::from_planes(&out, image.depth(), scale)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

pub(crate) fn float(params: &ParamMap, name: &str) -> anyhow::Result<f64> {
    params
        .get(name)
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| anyhow::anyhow!("missing numeric parameter '{name}'"))
}

pub(crate) fn int(params: &ParamMap, name: &str) -> anyhow::Result<usize> {
    match params.get(name) {
        Some(ParamValue::Int(v)) => Ok(usize::try_from(*v)?),
        _ => Err(anyhow::anyhow!("missing integer parameter '{name}'")),
    }
}

pub(crate) fn text<'a>(params: &'a ParamMap, name: &str) -> anyhow::Result<&'a str> {
    params
        .get(name)
        .and_then(ParamValue::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing choice parameter '{name}'"))
}
