//! Photon shot noise
//!
//! Sample values are mapped to expected photon counts with an explicit
//! `scale` (photons at full scale), sampled, and mapped back:
//!
//! ```text
//! photons = v / max * scale
//! out     = Poisson(photons) * max / scale
//! ```
//!
//! Larger `scale` means more photons and therefore *less* relative noise.
//! Above [`NORMAL_APPROX_THRESHOLD`] expected photons the Poisson distribution
//! is replaced by `N(photons, sqrt(photons))`.

use rand_distr::{Distribution, Normal, Poisson};
use rustc_hash::FxHashMap;

use super::{float_param, NoiseModel, NoiseType};
use crate::image::Image;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};
use crate::rng::RandomStream;
use crate::{Error, Result};

/// Photons at full scale used by the standard suite.
pub const DEFAULT_PHOTON_SCALE: f64 = 1000.0;

/// Expected photon count above which a normal approximation is sampled.
pub const NORMAL_APPROX_THRESHOLD: f64 = 1e6;

pub(super) const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: "scale",
    abbrev: "scale",
    kind: ParamKind::Float {
        min: 0.0,
        max: 1e9,
        min_exclusive: true,
    },
    format: ValueFormat::Integer,
}];

/// Shot noise; zero stays zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonNoise;

enum Photons {
    Dark,
    Exact(Poisson<f64>),
    Approx(Normal<f64>),
}

impl Photons {
    fn for_mean(mean: f64) -> Result<Self> {
        if mean <= 0.0 {
            return Ok(Self::Dark);
        }
        let invalid = |reason: String| Error::InvalidParameter {
            model: NoiseType::Poisson.to_string(),
            parameter: "scale".to_string(),
            reason,
        };
        if mean > NORMAL_APPROX_THRESHOLD {
            Normal::new(mean, mean.sqrt())
                .map(Self::Approx)
                .map_err(|e| invalid(e.to_string()))
        } else {
            Poisson::new(mean)
                .map(Self::Exact)
                .map_err(|e| invalid(e.to_string()))
        }
    }

    fn sample(&self, rng: &mut RandomStream) -> f64 {
        match self {
            Self::Dark => 0.0,
            Self::Exact(p) => p.sample(rng),
            Self::Approx(n) => n.sample(rng).max(0.0),
        }
    }
}

impl NoiseModel for PoissonNoise {
    fn noise_type(&self) -> NoiseType {
        NoiseType::Poisson
    }

    fn apply(&self, image: &Image, params: &ParamMap, rng: &mut RandomStream) -> Result<Vec<u16>> {
        let scale = float_param(params, "scale");
        let depth = image.depth();
        let max = depth.max_f64();
        // one distribution per distinct sample value
        let mut cache: FxHashMap<u16, Photons> = FxHashMap::default();
        let mut out = Vec::with_capacity(image.samples().len());
        for &s in image.samples() {
            let photons = match cache.entry(s) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(Photons::for_mean(f64::from(s) / max * scale)?)
                }
            };
            out.push(depth.quantize(photons.sample(rng) * max / scale));
        }
        Ok(out)
    }
}
