//! Small convolution helpers shared by paired and reference-free metrics.
//! Borders are mirrored.

use crate::image::Plane;

/// Sobel gradient magnitude `sqrt(gx² + gy²)`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn sobel_magnitude(plane: &Plane) -> Vec<f64> {
    let mut out = Vec::with_capacity(plane.data.len());
    for y in 0..plane.height as isize {
        for x in 0..plane.width as isize {
            let p = |dx: isize, dy: isize| plane.get_reflected(x + dx, y + dy);
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            out.push(gx.hypot(gy));
        }
    }
    out
}

/// 4-neighbour Laplacian.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn laplacian(plane: &Plane) -> Vec<f64> {
    let mut out = Vec::with_capacity(plane.data.len());
    for y in 0..plane.height as isize {
        for x in 0..plane.width as isize {
            let p = |dx: isize, dy: isize| plane.get_reflected(x + dx, y + dy);
            out.push(p(1, 0) + p(-1, 0) + p(0, 1) + p(0, -1) - 4.0 * p(0, 0));
        }
    }
    out
}

/// Summed-area table with one row/column of zero padding.
pub struct Integral {
    width: usize,
    sums: Vec<f64>,
}

impl Integral {
    /// Build from row-major `values` of the given width.
    #[must_use]
    pub fn new(mut values: impl Iterator<Item = f64>, width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += values.next().unwrap_or(0.0);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self {
            width: stride,
            sums,
        }
    }

    /// Sum over `[x0, x1) × [y0, y1)`.
    #[must_use]
    pub fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = |x: usize, y: usize| self.sums[y * self.width + x];
        s(x1, y1) - s(x0, y1) - s(x1, y0) + s(x0, y0)
    }
}

/// Population mean and standard deviation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Median (average of the two middle values for even lengths).
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
