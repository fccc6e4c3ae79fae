//! Total-variation denoising (Chambolle's projection algorithm)

use super::{float, int, AlgorithmId, Denoiser, InputDomain};
use crate::image::Plane;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "weight",
        abbrev: "w",
        kind: ParamKind::Float {
            min: 0.0,
            max: 10.0,
            min_exclusive: true,
        },
        format: ValueFormat::Decimal,
    },
    ParamSpec {
        name: "max_num_iter",
        abbrev: "it",
        kind: ParamKind::Int {
            min: 1,
            max: 5000,
            odd: false,
        },
        format: ValueFormat::Integer,
    },
];

/// Relative energy change below which iteration stops early.
const EPS: f64 = 2.0e-4;
/// Dual step size, `1 / (2 * ndim)`.
const TAU: f64 = 0.25;

/// Minimizes `‖u - f‖² / 2 + weight · TV(u)`; larger `weight` smooths more.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalVariation;

impl Denoiser for TotalVariation {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Tv
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::UnitInterval
    }

    #[allow(clippy::cast_precision_loss)]
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        let weight = float(params, "weight")?;
        let max_iter = int(params, "max_num_iter")?;
        let (w, h) = (plane.width, plane.height);
        let n = w * h;

        // dual field p = (py, px), gradient g, divergence d
        let mut py = vec![0.0; n];
        let mut px = vec![0.0; n];
        let mut d = vec![0.0; n];
        let mut out = plane.data.clone();
        let mut e_init = 0.0;
        let mut e_prev = 0.0;

        for i in 0..max_iter {
            if i > 0 {
                for y in 0..h {
                    for x in 0..w {
                        let idx = y * w + x;
                        let mut div = -py[idx] - px[idx];
                        if y > 0 {
                            div += py[idx - w];
                        }
                        if x > 0 {
                            div += px[idx - 1];
                        }
                        d[idx] = div;
                        out[idx] = plane.data[idx] + div;
                    }
                }
            }

            let mut energy: f64 = d.iter().map(|v| v * v).sum();
            for y in 0..h {
                for x in 0..w {
                    let idx = y * w + x;
                    let gy = if y + 1 < h { out[idx + w] - out[idx] } else { 0.0 };
                    let gx = if x + 1 < w { out[idx + 1] - out[idx] } else { 0.0 };
                    let norm = gy.hypot(gx);
                    energy += weight * norm;
                    let scale = 1.0 + norm * TAU / weight;
                    py[idx] = (py[idx] - TAU * gy) / scale;
                    px[idx] = (px[idx] - TAU * gx) / scale;
                }
            }
            energy /= n as f64;

            if i == 0 {
                e_init = energy;
                e_prev = energy;
            } else if (e_prev - energy).abs() < EPS * e_init {
                break;
            } else {
                e_prev = energy;
            }
        }

        Ok(Plane {
            width: w,
            height: h,
            data: out,
        })
    }
}
