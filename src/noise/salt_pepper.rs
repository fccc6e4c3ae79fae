//! Impulse (salt & pepper) noise

use rand::Rng;

use super::{float_param, NoiseModel, NoiseType};
use crate::image::Image;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};
use crate::rng::RandomStream;
use crate::Result;

pub(super) const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: "density",
    abbrev: "d",
    kind: ParamKind::Float {
        min: 0.0,
        max: 1.0,
        min_exclusive: false,
    },
    format: ValueFormat::Hundredths,
}];

/// Each sample is hit with probability `density`; a hit sample becomes 0 or
/// full scale with equal probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltPepperNoise;

impl NoiseModel for SaltPepperNoise {
    fn noise_type(&self) -> NoiseType {
        NoiseType::SaltPepper
    }

    fn apply(&self, image: &Image, params: &ParamMap, rng: &mut RandomStream) -> Result<Vec<u16>> {
        let density = float_param(params, "density");
        let max = image.depth().max_value();
        Ok(image
            .samples()
            .iter()
            .map(|&s| {
                if rng.random::<f64>() < density {
                    if rng.random::<bool>() {
                        max
                    } else {
                        0
                    }
                } else {
                    s
                }
            })
            .collect())
    }
}
