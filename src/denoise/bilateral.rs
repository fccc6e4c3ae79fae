//! Bilateral filter

use super::{float, int, AlgorithmId, Denoiser, InputDomain};
use crate::image::Plane;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "d",
        abbrev: "d",
        kind: ParamKind::Int {
            min: 1,
            max: 31,
            odd: false,
        },
        format: ValueFormat::Integer,
    },
    ParamSpec {
        name: "sigma_color",
        abbrev: "sc",
        kind: ParamKind::Float {
            min: 0.0,
            max: 500.0,
            min_exclusive: true,
        },
        format: ValueFormat::Integer,
    },
    ParamSpec {
        name: "sigma_space",
        abbrev: "ss",
        kind: ParamKind::Float {
            min: 0.0,
            max: 500.0,
            min_exclusive: true,
        },
        format: ValueFormat::Integer,
    },
];

/// Edge-preserving weighted average over a disc of diameter `d`.
///
/// `sigma_color` is given on the 8-bit scale and rescaled to the unit
/// interval, so the same config behaves the same on 8- and 16-bit frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bilateral;

impl Denoiser for Bilateral {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Bilateral
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::UnitInterval
    }

    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        let radius = (int(params, "d")? / 2) as isize;
        let sigma_color = float(params, "sigma_color")? / 255.0;
        let sigma_space = float(params, "sigma_space")?;
        let color_coeff = -0.5 / (sigma_color * sigma_color);
        let space_coeff = -0.5 / (sigma_space * sigma_space);

        // spatial kernel over the disc, precomputed once
        let taps: Vec<(isize, isize, f64)> = (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= radius * radius)
            .map(|(dx, dy)| (dx, dy, (((dx * dx + dy * dy) as f64) * space_coeff).exp()))
            .collect();

        let mut out = Plane::filled(plane.width, plane.height, 0.0);
        for y in 0..plane.height as isize {
            for x in 0..plane.width as isize {
                let center = plane.get_reflected(x, y);
                let (mut sum, mut norm) = (0.0, 0.0);
                for &(dx, dy, ws) in &taps {
                    let v = plane.get_reflected(x + dx, y + dy);
                    let diff = v - center;
                    let w = ws * (diff * diff * color_coeff).exp();
                    sum += w * v;
                    norm += w;
                }
                out.data[y as usize * plane.width + x as usize] = sum / norm;
            }
        }
        Ok(out)
    }
}
