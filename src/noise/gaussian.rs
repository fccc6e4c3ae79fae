//! Additive Gaussian noise

use rand_distr::{Distribution, Normal};

use super::{float_param, NoiseModel, NoiseType};
use crate::image::{BitDepth, Image};
use crate::params::{ParamKind, ParamMap, ParamSpec, SchemaViolation, ValueFormat};
use crate::rng::RandomStream;
use crate::{Error, Result};

pub(super) const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: "sigma",
    abbrev: "sigma",
    kind: ParamKind::Float {
        min: 0.0,
        max: 65535.0,
        min_exclusive: false,
    },
    format: ValueFormat::Integer,
}];

/// `out = v + N(0, sigma)`, sigma on the image's native scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianNoise;

impl NoiseModel for GaussianNoise {
    fn noise_type(&self) -> NoiseType {
        NoiseType::Gaussian
    }

    fn check(&self, params: &ParamMap, depth: BitDepth) -> std::result::Result<(), SchemaViolation> {
        let sigma = float_param(params, "sigma");
        if sigma > depth.max_f64() {
            return Err(SchemaViolation {
                parameter: "sigma".to_string(),
                reason: format!("{sigma} exceeds {}-bit full scale", depth.bits()),
            });
        }
        Ok(())
    }

    fn apply(&self, image: &Image, params: &ParamMap, rng: &mut RandomStream) -> Result<Vec<u16>> {
        let sigma = float_param(params, "sigma");
        let normal = Normal::new(0.0, sigma).map_err(|e| Error::InvalidParameter {
            model: NoiseType::Gaussian.to_string(),
            parameter: "sigma".to_string(),
            reason: e.to_string(),
        })?;
        let depth = image.depth();
        Ok(image
            .samples()
            .iter()
            .map(|&s| depth.quantize(f64::from(s) + normal.sample(rng)))
            .collect())
    }
}
