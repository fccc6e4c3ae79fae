//! Block-matching and 3-D filtering
//!
//! Two collaborative-filtering passes over 8×8 blocks:
//!
//! - **hard**: group similar blocks of the noisy image, transform each group
//!   with an orthonormal 3-D Walsh-Hadamard transform, zero coefficients
//!   below `2.7 σ`, invert, aggregate with weight `1 / nonzero`.
//! - **wiener**: group blocks by similarity in a pilot estimate, shrink the
//!   noisy group's coefficients by `p² / (p² + σ²)` from the pilot's spectrum,
//!   aggregate with weight `1 / (σ² Σ w²)`.
//!
//! `stage = all` runs hard then wiener with the hard result as pilot;
//! `wiener` alone uses the noisy image as its own pilot. The transform is
//! orthonormal, so `σ` in the coefficient domain equals `sigma_psd`.

use std::cmp::Ordering;

use anyhow::bail;

use super::{float, text, AlgorithmId, Denoiser, InputDomain};
use crate::image::Plane;
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "sigma_psd",
        abbrev: "s",
        kind: ParamKind::Float {
            min: 0.0,
            max: 1.0,
            min_exclusive: true,
        },
        format: ValueFormat::Decimal,
    },
    ParamSpec {
        name: "stage",
        abbrev: "st",
        kind: ParamKind::Choice(&["all", "hard", "wiener"]),
        format: ValueFormat::Word,
    },
    ParamSpec {
        name: "profile",
        abbrev: "p",
        kind: ParamKind::Choice(&["np", "lc", "high"]),
        format: ValueFormat::Word,
    },
];

const BLOCK: usize = 8;
const HARD_THRESHOLD: f64 = 2.7;

/// Search and grouping settings.
#[derive(Debug, Clone, Copy)]
struct Profile {
    step: usize,
    search_radius: usize,
    max_group: usize,
}

impl Profile {
    fn named(name: &str) -> anyhow::Result<Self> {
        Ok(match name {
            "np" => Self {
                step: 3,
                search_radius: 8,
                max_group: 16,
            },
            "lc" => Self {
                step: 6,
                search_radius: 5,
                max_group: 8,
            },
            "high" => Self {
                step: 2,
                search_radius: 10,
                max_group: 32,
            },
            other => bail!("unknown profile '{other}'"),
        })
    }
}

/// Collaborative filtering of similar 8×8 blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bm3d;

impl Denoiser for Bm3d {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Bm3d
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::UnitInterval
    }

    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        if plane.width < BLOCK || plane.height < BLOCK {
            bail!(
                "{}x{} plane is smaller than one {BLOCK}x{BLOCK} block",
                plane.width,
                plane.height
            );
        }
        let sigma = float(params, "sigma_psd")?;
        let profile = Profile::named(text(params, "profile")?)?;
        Ok(match text(params, "stage")? {
            "hard" => collaborative_pass(plane, plane, sigma, profile, Pass::Hard),
            "wiener" => collaborative_pass(plane, plane, sigma, profile, Pass::Wiener),
            "all" => {
                let basic = collaborative_pass(plane, plane, sigma, profile, Pass::Hard);
                collaborative_pass(plane, &basic, sigma, profile, Pass::Wiener)
            }
            other => bail!("unknown stage '{other}'"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Hard,
    Wiener,
}

/// Reference block positions along one axis, always including the last one.
fn grid(len: usize, step: usize) -> Vec<usize> {
    let last = len - BLOCK;
    let mut positions: Vec<usize> = (0..=last).step_by(step).collect();
    if positions.last() != Some(&last) {
        positions.push(last);
    }
    positions
}

fn block(plane: &Plane, x: usize, y: usize) -> [f64; BLOCK * BLOCK] {
    let mut out = [0.0; BLOCK * BLOCK];
    for r in 0..BLOCK {
        let row = (y + r) * plane.width + x;
        out[r * BLOCK..(r + 1) * BLOCK].copy_from_slice(&plane.data[row..row + BLOCK]);
    }
    out
}

fn distance(a: &[f64; BLOCK * BLOCK], b: &[f64; BLOCK * BLOCK]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum()
}

/// Up to `max_group` block positions most similar to the one at `(x, y)`;
/// the reference itself comes first. The count is a power of two.
fn match_blocks(pilot: &Plane, x: usize, y: usize, profile: Profile) -> Vec<(usize, usize)> {
    let reference = block(pilot, x, y);
    let x_lo = x.saturating_sub(profile.search_radius);
    let y_lo = y.saturating_sub(profile.search_radius);
    let x_hi = (x + profile.search_radius).min(pilot.width - BLOCK);
    let y_hi = (y + profile.search_radius).min(pilot.height - BLOCK);

    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for cy in y_lo..=y_hi {
        for cx in x_lo..=x_hi {
            if (cx, cy) != (x, y) {
                candidates.push((distance(&reference, &block(pilot, cx, cy)), cx, cy));
            }
        }
    }
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut group = vec![(x, y)];
    group.extend(
        candidates
            .into_iter()
            .take(profile.max_group - 1)
            .map(|(_, cx, cy)| (cx, cy)),
    );
    let keep = 1 << group.len().ilog2();
    group.truncate(keep);
    group
}

/// In-place orthonormal Walsh-Hadamard transform; `data.len()` must be a
/// power of two. The transform is its own inverse.
fn fwht(data: &mut [f64]) {
    let n = data.len();
    let mut h = 1;
    while h < n {
        for i in (0..n).step_by(h * 2) {
            for j in i..i + h {
                let (a, b) = (data[j], data[j + h]);
                data[j] = a + b;
                data[j + h] = a - b;
            }
        }
        h *= 2;
    }
    #[allow(clippy::cast_precision_loss)]
    let norm = 1.0 / (n as f64).sqrt();
    for v in data.iter_mut() {
        *v *= norm;
    }
}

/// 3-D transform of a stacked group (`k` blocks of 64 coefficients).
fn transform_group(group: &mut [f64], k: usize) {
    let mut column = [0.0; BLOCK];
    for b in 0..k {
        let blk = &mut group[b * BLOCK * BLOCK..(b + 1) * BLOCK * BLOCK];
        for r in 0..BLOCK {
            fwht(&mut blk[r * BLOCK..(r + 1) * BLOCK]);
        }
        for c in 0..BLOCK {
            for r in 0..BLOCK {
                column[r] = blk[r * BLOCK + c];
            }
            fwht(&mut column);
            for r in 0..BLOCK {
                blk[r * BLOCK + c] = column[r];
            }
        }
    }
    let mut across = vec![0.0; k];
    for i in 0..BLOCK * BLOCK {
        for b in 0..k {
            across[b] = group[b * BLOCK * BLOCK + i];
        }
        fwht(&mut across);
        for b in 0..k {
            group[b * BLOCK * BLOCK + i] = across[b];
        }
    }
}

fn stack(plane: &Plane, positions: &[(usize, usize)]) -> Vec<f64> {
    positions
        .iter()
        .flat_map(|&(x, y)| block(plane, x, y))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn collaborative_pass(
    noisy: &Plane,
    pilot: &Plane,
    sigma: f64,
    profile: Profile,
    pass: Pass,
) -> Plane {
    let mut numerator = vec![0.0; noisy.data.len()];
    let mut denominator = vec![0.0; noisy.data.len()];
    let sigma2 = sigma * sigma;

    for &y in &grid(noisy.height, profile.step) {
        for &x in &grid(noisy.width, profile.step) {
            let positions = match_blocks(pilot, x, y, profile);
            let k = positions.len();
            let mut group = stack(noisy, &positions);
            transform_group(&mut group, k);

            let weight = match pass {
                Pass::Hard => {
                    let threshold = HARD_THRESHOLD * sigma;
                    let mut nonzero = 0_usize;
                    for c in &mut group {
                        if c.abs() < threshold {
                            *c = 0.0;
                        } else {
                            nonzero += 1;
                        }
                    }
                    1.0 / nonzero.max(1) as f64
                }
                Pass::Wiener => {
                    let mut spectrum = stack(pilot, &positions);
                    transform_group(&mut spectrum, k);
                    let mut energy = 0.0;
                    for (c, p) in group.iter_mut().zip(&spectrum) {
                        let w = p * p / (p * p + sigma2);
                        *c *= w;
                        energy += w * w;
                    }
                    1.0 / (sigma2 * energy).max(1e-12)
                }
            };

            transform_group(&mut group, k);
            for (b, &(bx, by)) in positions.iter().enumerate() {
                for r in 0..BLOCK {
                    for c in 0..BLOCK {
                        let idx = (by + r) * noisy.width + bx + c;
                        numerator[idx] += weight * group[b * BLOCK * BLOCK + r * BLOCK + c];
                        denominator[idx] += weight;
                    }
                }
            }
        }
    }

    let data = numerator
        .iter()
        .zip(&denominator)
        .zip(&noisy.data)
        .map(|((&num, &den), &fallback)| if den > 0.0 { num / den } else { fallback })
        .collect();
    Plane {
        width: noisy.width,
        height: noisy.height,
        data,
    }
}
