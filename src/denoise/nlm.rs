//! Non-local means

use super::{float, int, AlgorithmId, Denoiser, InputDomain};
use crate::image::Plane;
use crate::params::{ParamKind, ParamMap, ParamSpec, ParamValue, SchemaViolation, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "h",
        abbrev: "h",
        kind: ParamKind::Float {
            min: 0.0,
            max: 100.0,
            min_exclusive: true,
        },
        format: ValueFormat::Integer,
    },
    ParamSpec {
        name: "template_window_size",
        abbrev: "tw",
        kind: ParamKind::Int {
            min: 3,
            max: 21,
            odd: true,
        },
        format: ValueFormat::Integer,
    },
    ParamSpec {
        name: "search_window_size",
        abbrev: "sw",
        kind: ParamKind::Int {
            min: 5,
            max: 51,
            odd: true,
        },
        format: ValueFormat::Integer,
    },
];

/// Patch-similarity weighted average.
///
/// Every pixel becomes the average of the pixels in its search window,
/// weighted by `exp(-d / h²)` where `d` is the mean squared difference of the
/// two surrounding templates. `h` is on the 8-bit scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonLocalMeans;

impl Denoiser for NonLocalMeans {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Nlm
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::UnitInterval
    }

    fn check(&self, params: &ParamMap) -> Result<(), SchemaViolation> {
        match (
            params.get("template_window_size"),
            params.get("search_window_size"),
        ) {
            (Some(ParamValue::Int(tw)), Some(ParamValue::Int(sw))) if sw < tw => {
                Err(SchemaViolation {
                    parameter: "search_window_size".to_string(),
                    reason: format!("{sw} is smaller than template_window_size {tw}"),
                })
            }
            _ => Ok(()),
        }
    }

    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        let h = float(params, "h")? / 255.0;
        let t = (int(params, "template_window_size")? / 2) as isize;
        let s = (int(params, "search_window_size")? / 2) as isize;
        let inv_h2 = 1.0 / (h * h);
        let template_len = ((2 * t + 1) * (2 * t + 1)) as f64;

        let mut out = Plane::filled(plane.width, plane.height, 0.0);
        for y in 0..plane.height as isize {
            for x in 0..plane.width as isize {
                let (mut sum, mut norm) = (0.0, 0.0);
                for qy in y - s..=y + s {
                    for qx in x - s..=x + s {
                        let mut dist = 0.0;
                        for dy in -t..=t {
                            for dx in -t..=t {
                                let diff = plane.get_reflected(x + dx, y + dy)
                                    - plane.get_reflected(qx + dx, qy + dy);
                                dist += diff * diff;
                            }
                        }
                        let w = (-(dist / template_len) * inv_h2).exp();
                        sum += w * plane.get_reflected(qx, qy);
                        norm += w;
                    }
                }
                out.data[y as usize * plane.width + x as usize] = sum / norm;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{conform, param_map};

    #[test]
    fn test_search_window_must_cover_template() {
        let params = conform(
            SCHEMA,
            &param_map([
                ("h", 10.0),
                ("template_window_size", 9.0),
                ("search_window_size", 7.0),
            ]),
        )
        .unwrap();
        assert!(NonLocalMeans.check(&params).is_err());
    }

    #[test]
    fn test_flat_plane_is_fixed_point() {
        let plane = Plane::filled(9, 9, 0.4);
        let params = conform(
            SCHEMA,
            &param_map([
                ("h", 10.0),
                ("template_window_size", 3.0),
                ("search_window_size", 5.0),
            ]),
        )
        .unwrap();
        let out = NonLocalMeans.denoise(&plane, &params).unwrap();
        assert!(out.data.iter().all(|&v| (v - 0.4).abs() < 1e-12));
    }
}
