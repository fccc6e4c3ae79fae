//! Reference-free image statistics (baseline characterization)

use serde::{Deserialize, Serialize};

use super::filters::{laplacian, mean_std, median, sobel_magnitude, Integral};
use crate::image::{Image, Plane};

/// Sobel magnitude, as a fraction of full scale, above which a sample
/// counts as an edge.
pub const EDGE_THRESHOLD_FRACTION: f64 = 30.0 / 255.0;

/// MAD → σ for normally distributed residuals.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Side of the square window used for local contrast.
pub const LOCAL_CONTRAST_WINDOW: usize = 15;

/// Reference-free quality measures of one image.
///
/// Computed on the luminance plane (channel mean for RGB) in native units
/// unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Mean sample value
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Variance of the Laplacian (sharpness)
    pub laplacian_variance: f64,
    /// Mean Sobel magnitude
    pub mean_gradient: f64,
    /// Largest Sobel magnitude
    pub max_gradient: f64,
    /// `(max - min) / (max + min)`, 0 for an all-zero image
    pub michelson_contrast: f64,
    /// Standard deviation of intensities normalized to `[0, 1]`
    pub rms_contrast: f64,
    /// Mean over pixels of `local std / local mean` in a
    /// [`LOCAL_CONTRAST_WINDOW`]-wide window
    pub mean_local_contrast: f64,
    /// Standard deviation of the same local contrast map
    pub std_local_contrast: f64,
    /// Shannon entropy in bits over 256 bins spanning the full range
    pub entropy: f64,
    /// `1.4826 · MAD` of the Laplacian
    pub estimated_noise_sigma: f64,
    /// Percentage of samples whose Sobel magnitude exceeds
    /// [`EDGE_THRESHOLD_FRACTION`] of full scale
    pub edge_density: f64,
    /// `log2(distinct values)`, 0 for a constant image
    pub effective_bit_depth: f64,
    /// `(max - min)` as a percentage of full scale
    pub histogram_spread: f64,
    /// Percentage of samples at 0
    pub saturation_low_pct: f64,
    /// Percentage of samples at full scale
    pub saturation_high_pct: f64,
    /// `saturation_low_pct + saturation_high_pct`
    pub saturation_total_pct: f64,
}

fn luminance(image: &Image) -> Plane {
    let mut planes = image.to_planes(1.0);
    if planes.len() == 1 {
        return planes.swap_remove(0);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = planes.len() as f64;
    let mut lum = Plane::filled(image.width(), image.height(), 0.0);
    for plane in &planes {
        for (l, v) in lum.data.iter_mut().zip(&plane.data) {
            *l += v / n;
        }
    }
    lum
}

/// Per-pixel `std / (mean + 1e-6)` over a centered window, clipped at the
/// border so edge pixels average only the samples inside the frame.
#[allow(clippy::cast_precision_loss)]
fn local_contrast(plane: &Plane, window: usize) -> Vec<f64> {
    let (w, h) = (plane.width, plane.height);
    let half = window / 2;
    let sums = Integral::new(plane.data.iter().copied(), w, h);
    let squares = Integral::new(plane.data.iter().map(|v| v * v), w, h);
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(w));
            let n = ((x1 - x0) * (y1 - y0)) as f64;
            let mean = sums.sum(x0, y0, x1, y1) / n;
            let var = (squares.sum(x0, y0, x1, y1) / n - mean * mean).max(0.0);
            out.push(var.sqrt() / (mean + 1e-6));
        }
    }
    out
}

fn percent(count: usize, total: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let pct = 100.0 * count as f64 / total as f64;
    pct
}

/// Compute [`StatsRecord`] for one image.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn compute_reference_free(image: &Image) -> StatsRecord {
    let full = image.max_value();
    let plane = luminance(image);
    let n = plane.data.len();

    let (mean, std) = mean_std(&plane.data);
    let min = plane.data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = plane.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let lap = laplacian(&plane);
    let (_, lap_std) = mean_std(&lap);
    let lap_median = median(&lap);
    let deviations: Vec<f64> = lap.iter().map(|v| (v - lap_median).abs()).collect();

    let grad = sobel_magnitude(&plane);
    let (mean_gradient, _) = mean_std(&grad);
    let max_gradient = grad.iter().copied().fold(0.0, f64::max);
    let edge_threshold = EDGE_THRESHOLD_FRACTION * full;

    let mut histogram = [0_usize; 256];
    for &v in &plane.data {
        let bin = ((v / (full + 1.0)) * 256.0) as usize;
        histogram[bin.min(255)] += 1;
    }
    let entropy = histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.log2()
        })
        .sum();

    let (mean_local_contrast, std_local_contrast) =
        mean_std(&local_contrast(&plane, LOCAL_CONTRAST_WINDOW));
    let saturation_low_pct = percent(plane.data.iter().filter(|&&v| v == 0.0).count(), n);
    let saturation_high_pct = percent(plane.data.iter().filter(|&&v| v >= full).count(), n);

    let mut distinct: Vec<u16> = image.samples().to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let effective_bit_depth = if distinct.len() <= 1 {
        0.0
    } else {
        (distinct.len() as f64).log2()
    };

    StatsRecord {
        mean,
        std,
        min,
        max,
        laplacian_variance: lap_std * lap_std,
        mean_gradient,
        max_gradient,
        michelson_contrast: if max + min == 0.0 {
            0.0
        } else {
            (max - min) / (max + min)
        },
        rms_contrast: std / full,
        mean_local_contrast,
        std_local_contrast,
        entropy,
        estimated_noise_sigma: MAD_TO_SIGMA * median(&deviations),
        edge_density: percent(grad.iter().filter(|&&g| g > edge_threshold).count(), n),
        effective_bit_depth,
        histogram_spread: 100.0 * (max - min) / full,
        saturation_low_pct,
        saturation_high_pct,
        saturation_total_pct: saturation_low_pct + saturation_high_pct,
    }
}

/// Aggregate of one [`StatsRecord`] field across images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    /// Mean across images
    pub mean: f64,
    /// Population standard deviation across images
    pub std: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Median value
    pub median: f64,
}

/// Per-field aggregates over a batch of [`StatsRecord`]s, keyed by field name.
///
/// Returns an empty map for an empty batch.
#[must_use]
pub fn summarize_stats(records: &[StatsRecord]) -> std::collections::BTreeMap<String, FieldSummary> {
    let mut out = std::collections::BTreeMap::new();
    if records.is_empty() {
        return out;
    }
    let fields: [(&str, fn(&StatsRecord) -> f64); 19] = [
        ("mean", |r| r.mean),
        ("std", |r| r.std),
        ("min", |r| r.min),
        ("max", |r| r.max),
        ("laplacian_variance", |r| r.laplacian_variance),
        ("mean_gradient", |r| r.mean_gradient),
        ("max_gradient", |r| r.max_gradient),
        ("michelson_contrast", |r| r.michelson_contrast),
        ("rms_contrast", |r| r.rms_contrast),
        ("mean_local_contrast", |r| r.mean_local_contrast),
        ("std_local_contrast", |r| r.std_local_contrast),
        ("entropy", |r| r.entropy),
        ("estimated_noise_sigma", |r| r.estimated_noise_sigma),
        ("edge_density", |r| r.edge_density),
        ("effective_bit_depth", |r| r.effective_bit_depth),
        ("histogram_spread", |r| r.histogram_spread),
        ("saturation_low_pct", |r| r.saturation_low_pct),
        ("saturation_high_pct", |r| r.saturation_high_pct),
        ("saturation_total_pct", |r| r.saturation_total_pct),
    ];
    for (name, get) in fields {
        let values: Vec<f64> = records.iter().map(get).collect();
        let (mean, std) = mean_std(&values);
        out.insert(
            name.to_string(),
            FieldSummary {
                mean,
                std,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                median: median(&values),
            },
        );
    }
    out
}
