//! Multiplicative (speckle) noise

use rand_distr::{Distribution, Normal};

use super::{float_param, NoiseModel, NoiseType};
use crate::image::Image;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};
use crate::rng::RandomStream;
use crate::{Error, Result};

pub(super) const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: "variance",
    abbrev: "var",
    kind: ParamKind::Float {
        min: 0.0,
        max: 1.0,
        min_exclusive: false,
    },
    format: ValueFormat::Hundredths,
}];

/// `out = v + v * n` with `n ~ N(0, sqrt(variance))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeckleNoise;

impl NoiseModel for SpeckleNoise {
    fn noise_type(&self) -> NoiseType {
        NoiseType::Speckle
    }

    fn apply(&self, image: &Image, params: &ParamMap, rng: &mut RandomStream) -> Result<Vec<u16>> {
        let variance = float_param(params, "variance");
        let normal = Normal::new(0.0, variance.sqrt()).map_err(|e| Error::InvalidParameter {
            model: NoiseType::Speckle.to_string(),
            parameter: "variance".to_string(),
            reason: e.to_string(),
        })?;
        let depth = image.depth();
        Ok(image
            .samples()
            .iter()
            .map(|&s| {
                let v = f64::from(s);
                depth.quantize(v + v * normal.sample(rng))
            })
            .collect())
    }
}
