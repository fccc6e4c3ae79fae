//! Median filter

use super::{int, AlgorithmId, Denoiser, InputDomain};
use crate::image::Plane;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: "ksize",
    abbrev: "k",
    kind: ParamKind::Int {
        min: 3,
        max: 15,
        odd: true,
    },
    format: ValueFormat::Integer,
}];

/// Square `ksize × ksize` median with mirrored borders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Denoiser for Median {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Median
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::Native
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        let radius = (int(params, "ksize")? / 2) as isize;
        let mut window = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        let mut out = Plane::filled(plane.width, plane.height, 0.0);
        for y in 0..plane.height as isize {
            for x in 0..plane.width as isize {
                window.clear();
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        window.push(plane.get_reflected(x + dx, y + dy));
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable_by(mid, f64::total_cmp);
                out.data[y as usize * plane.width + x as usize] = *median;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::param_map;

    #[test]
    fn test_removes_isolated_impulse() {
        let mut plane = Plane::filled(5, 5, 10.0);
        plane.data[12] = 255.0;
        let out = Median.denoise(&plane, &param_map([("ksize", 3_i64)])).unwrap();
        assert!(out.data.iter().all(|&v| (v - 10.0).abs() < f64::EPSILON));
    }
}
