//! Wavelet shrinkage
//!
//! Periodized orthonormal 2-D DWT (up to three levels), BayesShrink
//! thresholds per detail subband, inverse DWT. The plane is mirror-padded to a
//! multiple of `2^levels` and cropped afterwards.

use anyhow::bail;

use super::{float, text, AlgorithmId, Denoiser, InputDomain};
use crate::image::{reflect, Plane};
use crate::params::{ParamKind, ParamMap, ParamSpec, ValueFormat};

pub(super) const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "wavelet",
        abbrev: "w",
        kind: ParamKind::Choice(&["haar", "db2", "db4", "sym8", "coif1"]),
        format: ValueFormat::Word,
    },
    ParamSpec {
        name: "mode",
        abbrev: "m",
        kind: ParamKind::Choice(&["soft", "hard"]),
        format: ValueFormat::Word,
    },
    ParamSpec {
        name: "sigma",
        abbrev: "s",
        kind: ParamKind::Float {
            min: 0.0,
            max: 255.0,
            min_exclusive: false,
        },
        format: ValueFormat::Integer,
    },
];

const MAX_LEVELS: u32 = 3;

// Daubechies scaling filters
const HAAR: &[f64] = &[std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];
const DB2: &[f64] = &[
    0.482_962_913_144_690_25,
    0.836_516_303_737_807_9,
    0.224_143_868_041_857_35,
    -0.129_409_522_550_921_45,
];
const DB4: &[f64] = &[
    0.230_377_813_308_855_23,
    0.714_846_570_552_541_5,
    0.630_880_767_929_590_4,
    -0.027_983_769_416_983_85,
    -0.187_034_811_718_881_14,
    0.030_841_381_835_986_965,
    0.032_883_011_666_982_945,
    -0.010_597_401_784_997_278,
];
// Symlet 8 (least asymmetric Daubechies, 16 taps)
const SYM8: &[f64] = &[
    -0.003_382_415_951_006_125_6,
    -0.000_542_132_331_791_148_1,
    0.031_695_087_811_492_98,
    0.007_607_487_324_917_605,
    -0.143_294_238_350_809_7,
    -0.061_273_359_067_658_524,
    0.481_359_651_258_372_2,
    0.777_185_751_700_523_5,
    0.364_441_894_835_331_4,
    -0.051_945_838_107_709_04,
    -0.027_219_029_917_056_003,
    0.049_137_179_673_607_506,
    0.003_808_752_013_890_615,
    -0.014_952_258_337_048_23,
    -0.000_302_920_514_721_366_8,
    0.001_889_950_332_759_460_9,
];
// Coiflet 1
const COIF1: &[f64] = &[
    -0.015_655_728_135_464_54,
    -0.072_732_619_512_853_9,
    0.384_864_846_864_202_86,
    0.852_572_020_212_255_4,
    0.337_897_662_457_809_2,
    -0.072_732_619_512_853_9,
];

/// Orthonormal analysis/synthesis filter pair.
struct FilterBank {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl FilterBank {
    fn named(name: &str) -> anyhow::Result<Self> {
        let low = match name {
            "haar" => HAAR,
            "db2" => DB2,
            "db4" => DB4,
            "sym8" => SYM8,
            "coif1" => COIF1,
            other => bail!("unknown wavelet '{other}'"),
        };
        let len = low.len();
        let high = (0..len)
            .map(|n| if n % 2 == 0 { low[len - 1 - n] } else { -low[len - 1 - n] })
            .collect();
        Ok(Self {
            low: low.to_vec(),
            high,
        })
    }

    fn analyze(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        let half = n / 2;
        let mut out = vec![0.0; n];
        for k in 0..half {
            let (mut a, mut d) = (0.0, 0.0);
            for (t, (&lo, &hi)) in self.low.iter().zip(&self.high).enumerate() {
                let v = x[(2 * k + t) % n];
                a += lo * v;
                d += hi * v;
            }
            out[k] = a;
            out[half + k] = d;
        }
        out
    }

    fn synthesize(&self, c: &[f64]) -> Vec<f64> {
        let n = c.len();
        let half = n / 2;
        let mut out = vec![0.0; n];
        for k in 0..half {
            for (t, (&lo, &hi)) in self.low.iter().zip(&self.high).enumerate() {
                out[(2 * k + t) % n] += lo * c[k] + hi * c[half + k];
            }
        }
        out
    }
}

/// Row-major coefficient buffer with a 1-D transform applied over a
/// top-left `w × h` region.
struct Coefficients {
    width: usize,
    data: Vec<f64>,
}

impl Coefficients {
    fn rows(&mut self, w: usize, h: usize, f: impl Fn(&[f64]) -> Vec<f64>) {
        for y in 0..h {
            let start = y * self.width;
            let row = f(&self.data[start..start + w]);
            self.data[start..start + w].copy_from_slice(&row);
        }
    }

    fn columns(&mut self, w: usize, h: usize, f: impl Fn(&[f64]) -> Vec<f64>) {
        let mut column = vec![0.0; h];
        for x in 0..w {
            for (y, v) in column.iter_mut().enumerate() {
                *v = self.data[y * self.width + x];
            }
            let out = f(&column);
            for (y, v) in out.into_iter().enumerate() {
                self.data[y * self.width + x] = v;
            }
        }
    }

    fn subband(&self, x0: usize, y0: usize, w: usize, h: usize) -> Vec<f64> {
        (y0..y0 + h)
            .flat_map(|y| (x0..x0 + w).map(move |x| (x, y)))
            .map(|(x, y)| self.data[y * self.width + x])
            .collect()
    }

    fn map_subband(&mut self, x0: usize, y0: usize, w: usize, h: usize, f: impl Fn(f64) -> f64) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let idx = y * self.width + x;
                self.data[idx] = f(self.data[idx]);
            }
        }
    }
}

fn levels(width: usize, height: usize, taps: usize) -> u32 {
    let mut level = 1;
    while level < MAX_LEVELS && (width.min(height) >> (level + 1)) >= taps {
        level += 1;
    }
    level
}

fn median_abs(values: &[f64]) -> f64 {
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    if abs.is_empty() {
        return 0.0;
    }
    let mid = abs.len() / 2;
    *abs.select_nth_unstable_by(mid, f64::total_cmp).1
}

#[allow(clippy::cast_precision_loss)]
fn bayes_threshold(coeffs: &[f64], sigma: f64) -> f64 {
    if coeffs.is_empty() {
        return 0.0;
    }
    let var_y = coeffs.iter().map(|c| c * c).sum::<f64>() / coeffs.len() as f64;
    let sigma_x = (var_y - sigma * sigma).max(0.0).sqrt();
    if sigma_x == 0.0 {
        coeffs.iter().fold(0.0, |m, c| c.abs().max(m))
    } else {
        sigma * sigma / sigma_x
    }
}

/// Multi-scale wavelet shrinkage. `sigma = 0` estimates the noise level from
/// the finest diagonal subband (`median(|HH|) / 0.6745`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Wavelet;

impl Denoiser for Wavelet {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::Wavelet
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::UnitInterval
    }

    #[allow(clippy::cast_possible_wrap)]
    fn denoise(&self, plane: &Plane, params: &ParamMap) -> anyhow::Result<Plane> {
        let bank = FilterBank::named(text(params, "wavelet")?)?;
        let hard = text(params, "mode")? == "hard";
        let given_sigma = float(params, "sigma")? / 255.0;

        let levels = levels(plane.width, plane.height, bank.low.len());
        let block = 1_usize << levels;
        let pw = plane.width.div_ceil(block) * block;
        let ph = plane.height.div_ceil(block) * block;
        let mut coeffs = Coefficients {
            width: pw,
            data: (0..ph)
                .flat_map(|y| (0..pw).map(move |x| (x, y)))
                .map(|(x, y)| {
                    plane.data[reflect(y as isize, plane.height) * plane.width
                        + reflect(x as isize, plane.width)]
                })
                .collect(),
        };

        for level in 0..levels {
            let (w, h) = (pw >> level, ph >> level);
            coeffs.rows(w, h, |r| bank.analyze(r));
            coeffs.columns(w, h, |c| bank.analyze(c));
        }

        let sigma = if given_sigma > 0.0 {
            given_sigma
        } else {
            let (w, h) = (pw / 2, ph / 2);
            median_abs(&coeffs.subband(w, h, w, h)) / 0.6745
        };

        for level in 0..levels {
            let (w, h) = (pw >> (level + 1), ph >> (level + 1));
            for (x0, y0) in [(w, 0), (0, h), (w, h)] {
                let t = bayes_threshold(&coeffs.subband(x0, y0, w, h), sigma);
                if hard {
                    coeffs.map_subband(x0, y0, w, h, |c| if c.abs() > t { c } else { 0.0 });
                } else {
                    coeffs.map_subband(x0, y0, w, h, |c| c.signum() * (c.abs() - t).max(0.0));
                }
            }
        }

        for level in (0..levels).rev() {
            let (w, h) = (pw >> level, ph >> level);
            coeffs.columns(w, h, |c| bank.synthesize(c));
            coeffs.rows(w, h, |r| bank.synthesize(r));
        }

        let data = (0..plane.height)
            .flat_map(|y| (0..plane.width).map(move |x| (x, y)))
            .map(|(x, y)| coeffs.data[y * pw + x])
            .collect();
        Ok(Plane {
            width: plane.width,
            height: plane.height,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_banks_reconstruct_perfectly() {
        let signal: Vec<f64> = (0..16).map(|i| f64::from(i * i % 7)).collect();
        for name in ["haar", "db2", "db4", "sym8", "coif1"] {
            let bank = FilterBank::named(name).unwrap();
            let back = bank.synthesize(&bank.analyze(&signal));
            for (a, b) in back.iter().zip(&signal) {
                assert!((a - b).abs() < 1e-9, "{name}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_levels_bounded_by_size() {
        assert_eq!(levels(8, 8, 8), 1);
        assert_eq!(levels(64, 64, 2), 3);
        assert_eq!(levels(32, 32, 8), 2);
    }

    #[test]
    fn test_threshold_falls_back_to_peak_when_signal_vanishes() {
        let t = bayes_threshold(&[0.1, -0.1, 0.1], 1.0);
        assert!((t - 0.1).abs() < 1e-12);
    }
}
