//! Full-reference metrics: MSE, PSNR, SSIM, edge preservation.

use super::filters::{sobel_magnitude, Integral};
use crate::image::{Image, Plane};

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const WINDOW: usize = 7;

/// Mean squared error over all samples, native scale.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mse(reference: &Image, candidate: &Image) -> f64 {
    let sum: f64 = reference
        .samples()
        .iter()
        .zip(candidate.samples())
        .map(|(&a, &b)| {
            let d = f64::from(a) - f64::from(b);
            d * d
        })
        .sum();
    sum / reference.samples().len() as f64
}

/// `10 log10(MAX² / mse)`; `+∞` when `mse == 0`.
#[must_use]
pub fn psnr(mse: f64, max_value: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (max_value * max_value / mse).log10()
    }
}

/// Mean SSIM with a uniform 7×7 window (smaller for tiny images), sample
/// covariance, and `data_range = max_value`. Averaged over channels.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ssim(reference: &Image, candidate: &Image) -> f64 {
    let max = reference.max_value();
    let a = reference.to_planes(1.0);
    let b = candidate.to_planes(1.0);
    let total: f64 = a.iter().zip(&b).map(|(p, q)| ssim_plane(p, q, max)).sum();
    total / a.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn ssim_plane(a: &Plane, b: &Plane, data_range: f64) -> f64 {
    let (w, h) = (a.width, a.height);
    // largest odd window that fits
    let mut win = WINDOW.min(w).min(h);
    if win % 2 == 0 {
        win -= 1;
    }
    let n = (win * win) as f64;
    let cov_norm = if win > 1 { n / (n - 1.0) } else { 1.0 };
    let c1 = (K1 * data_range).powi(2);
    let c2 = (K2 * data_range).powi(2);

    let sa = Integral::new(a.data.iter().copied(), w, h);
    let sb = Integral::new(b.data.iter().copied(), w, h);
    let saa = Integral::new(a.data.iter().map(|v| v * v), w, h);
    let sbb = Integral::new(b.data.iter().map(|v| v * v), w, h);
    let sab = Integral::new(a.data.iter().zip(&b.data).map(|(x, y)| x * y), w, h);

    let mut total = 0.0;
    let mut count = 0_usize;
    for y0 in 0..=h - win {
        for x0 in 0..=w - win {
            let (x1, y1) = (x0 + win, y0 + win);
            let ux = sa.sum(x0, y0, x1, y1) / n;
            let uy = sb.sum(x0, y0, x1, y1) / n;
            let vx = cov_norm * (saa.sum(x0, y0, x1, y1) / n - ux * ux);
            let vy = cov_norm * (sbb.sum(x0, y0, x1, y1) / n - uy * uy);
            let vxy = cov_norm * (sab.sum(x0, y0, x1, y1) / n - ux * uy);
            total += ((2.0 * ux * uy + c1) * (2.0 * vxy + c2))
                / ((ux * ux + uy * uy + c1) * (vx + vy + c2));
            count += 1;
        }
    }
    total / count as f64
}

/// Pearson correlation of Sobel gradient magnitudes.
///
/// 1.0 when both gradient fields are flat and equal, 0.0 when exactly one is
/// flat.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn edge_preservation(reference: &Image, candidate: &Image) -> f64 {
    let ga: Vec<f64> = reference.to_planes(1.0).iter().flat_map(sobel_magnitude).collect();
    let gb: Vec<f64> = candidate.to_planes(1.0).iter().flat_map(sobel_magnitude).collect();
    let n = ga.len() as f64;
    let ma = ga.iter().sum::<f64>() / n;
    let mb = gb.iter().sum::<f64>() / n;
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in ga.iter().zip(&gb) {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    match (va == 0.0, vb == 0.0) {
        (true, true) => {
            if (ma - mb).abs() < f64::EPSILON {
                1.0
            } else {
                0.0
            }
        }
        (true, false) | (false, true) => 0.0,
        (false, false) => (cov / (va.sqrt() * vb.sqrt())).clamp(-1.0, 1.0),
    }
}
