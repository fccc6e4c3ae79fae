//! Image model
//!
//! Images are immutable sample grids tagged with their bit depth and an
//! identity string. Samples are stored as `u16` regardless of depth; the
//! [`BitDepth`] tag defines the valid range `0..=max_value`.
//!
//! ## Identity
//!
//! | Origin | Identity |
//! |---|---|
//! | Loaded from disk | `file:<path>` |
//! | Synthetic generator | `synthetic:<generator id>` |
//! | Produced by an operation | `sha256:<hex>` content address |
//!
//! Content addresses cover shape, bit depth and samples, so two operations
//! that produce the same pixels produce the same identity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Bit depth / valid value range of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitDepth {
    /// 8-bit, 0..=255
    U8,
    /// 12-bit, 0..=4095
    U12,
    /// 14-bit, 0..=16383
    U14,
    /// 16-bit, 0..=65535
    U16,
}

impl BitDepth {
    /// Number of bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U12 => 12,
            Self::U14 => 14,
            Self::U16 => 16,
        }
    }

    /// Largest valid sample value.
    #[must_use]
    pub const fn max_value(self) -> u16 {
        match self {
            Self::U8 => 255,
            Self::U12 => 4095,
            Self::U14 => 16383,
            Self::U16 => u16::MAX,
        }
    }

    /// Largest valid sample value as `f64`.
    #[must_use]
    pub fn max_f64(self) -> f64 {
        f64::from(self.max_value())
    }

    /// Look up a depth by bit count.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            12 => Some(Self::U12),
            14 => Some(Self::U14),
            16 => Some(Self::U16),
            _ => None,
        }
    }

    /// Round half away from zero and saturate into the valid range.
    ///
    /// NaN maps to 0. Values never wrap.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quantize(self, value: f64) -> u16 {
        if value.is_nan() {
            return 0;
        }
        value.round().clamp(0.0, self.max_f64()) as u16
    }
}

/// Width, height and channel count of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Columns
    pub width: usize,
    /// Rows
    pub height: usize,
    /// 1 for grayscale, 3 for interleaved RGB
    pub channels: usize,
}

impl Shape {
    /// Total number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// True when the shape holds no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Immutable image with explicit bit depth and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    shape: Shape,
    depth: BitDepth,
    samples: Arc<[u16]>,
    identity: String,
}

impl Image {
    /// Build an image from raw samples (row-major, channels interleaved).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageIo`] if the sample count does not match the shape,
    /// the channel count is not 1 or 3, or a sample exceeds the depth's range.
    pub fn new(
        shape: Shape,
        depth: BitDepth,
        samples: Vec<u16>,
        identity: impl Into<String>,
    ) -> Result<Self> {
        if shape.channels != 1 && shape.channels != 3 {
            return Err(Error::ImageIo(format!(
                "unsupported channel count {} (expected 1 or 3)",
                shape.channels
            )));
        }
        if shape.is_empty() {
            return Err(Error::ImageIo(format!("empty image shape {shape}")));
        }
        if samples.len() != shape.len() {
            return Err(Error::ImageIo(format!(
                "sample buffer holds {} values, shape {shape} needs {}",
                samples.len(),
                shape.len()
            )));
        }
        let max = depth.max_value();
        if let Some(bad) = samples.iter().find(|&&s| s > max) {
            return Err(Error::ImageIo(format!(
                "sample value {bad} exceeds {}-bit range",
                depth.bits()
            )));
        }
        Ok(Self {
            shape,
            depth,
            samples: samples.into(),
            identity: identity.into(),
        })
    }

    /// Build an operation output; its identity is the content address.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Image::new`].
    pub fn derived(shape: Shape, depth: BitDepth, samples: Vec<u16>) -> Result<Self> {
        let identity = content_address(shape, depth, &samples);
        Self::new(shape, depth, samples, identity)
    }

    /// Image shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.shape.width
    }

    /// Rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.shape.height
    }

    /// Channel count (1 or 3).
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.shape.channels
    }

    /// Bit depth tag.
    #[must_use]
    pub const fn depth(&self) -> BitDepth {
        self.depth
    }

    /// Largest valid sample value as `f64`.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.depth.max_f64()
    }

    /// Raw samples, row-major, channels interleaved.
    #[must_use]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Identity string (see module docs).
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Short file-system friendly name derived from the identity.
    ///
    /// `file:/data/a/frame_001.png` → `frame_001`, `synthetic:gradient_64x64_u8`
    /// → `gradient_64x64_u8`, `sha256:abcdef…` → first 16 hex digits.
    #[must_use]
    pub fn stem(&self) -> String {
        if let Some(path) = self.identity.strip_prefix("file:") {
            return std::path::Path::new(path)
                .file_stem()
                .map_or_else(|| path.to_string(), |s| s.to_string_lossy().into_owned());
        }
        if let Some(id) = self.identity.strip_prefix("synthetic:") {
            return id.to_string();
        }
        if let Some(hex) = self.identity.strip_prefix("sha256:") {
            return hex.chars().take(16).collect();
        }
        self.identity.clone()
    }

    /// Split into per-channel floating point planes scaled by `1 / scale`.
    ///
    /// `scale = 1.0` keeps the native integer scale; `scale = max_value` maps
    /// into `[0, 1]`.
    #[must_use]
    pub fn to_planes(&self, scale: f64) -> Vec<Plane> {
        let Shape {
            width,
            height,
            channels,
        } = self.shape;
        (0..channels)
            .map(|c| Plane {
                width,
                height,
                data: self
                    .samples
                    .iter()
                    .skip(c)
                    .step_by(channels)
                    .map(|&s| f64::from(s) / scale)
                    .collect(),
            })
            .collect()
    }

    /// Reassemble planes produced by [`Image::to_planes`] into a derived image.
    ///
    /// Values are multiplied by `scale`, then rounded and saturated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageIo`] if the planes are empty or inconsistent.
    pub fn from_planes(planes: &[Plane], depth: BitDepth, scale: f64) -> Result<Self> {
        let first = planes
            .first()
            .ok_or_else(|| Error::ImageIo("no planes to assemble".to_string()))?;
        let (width, height) = (first.width, first.height);
        if planes
            .iter()
            .any(|p| p.width != width || p.height != height || p.data.len() != width * height)
        {
            return Err(Error::ImageIo("planes disagree on dimensions".to_string()));
        }
        let channels = planes.len();
        let mut samples = Vec::with_capacity(width * height * channels);
        for i in 0..width * height {
            for plane in planes {
                samples.push(depth.quantize(plane.data[i] * scale));
            }
        }
        Self::derived(
            Shape {
                width,
                height,
                channels,
            },
            depth,
            samples,
        )
    }

    /// Diagonal intensity ramp from 0 (top-left) to full scale (bottom-right).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageIo`] if `width` or `height` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn gradient(width: usize, height: usize, depth: BitDepth) -> Result<Self> {
        let span = (width + height).saturating_sub(2).max(1) as f64;
        let max = depth.max_f64();
        let samples: Vec<u16> = (0..height)
            .flat_map(|y| (0..width).map(move |x| depth.quantize((x + y) as f64 / span * max)))
            .collect();
        Self::new(
            Shape {
                width,
                height,
                channels: 1,
            },
            depth,
            samples,
            format!("synthetic:gradient_{width}x{height}_u{}", depth.bits()),
        )
    }

    /// Thermal-like scene: cool background with a few smooth hot spots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageIo`] if `width` or `height` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn hot_spots(width: usize, height: usize, depth: BitDepth) -> Result<Self> {
        let max = depth.max_f64();
        let (w, h) = (width as f64, height as f64);
        // (center x, center y, radius, peak) as fractions of the frame
        let spots = [
            (0.30, 0.35, 0.12, 0.85),
            (0.70, 0.60, 0.08, 0.65),
            (0.50, 0.80, 0.15, 0.45),
        ];
        let samples: Vec<u16> = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    let (fx, fy) = (x as f64, y as f64);
                    let mut v = 0.15 + 0.05 * fy / h.max(1.0);
                    for (cx, cy, r, peak) in spots {
                        let dx = fx - cx * w;
                        let dy = fy - cy * h;
                        let sigma = r * w.min(h);
                        v += peak * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                    }
                    depth.quantize(v.min(1.0) * max)
                })
            })
            .collect();
        Self::new(
            Shape {
                width,
                height,
                channels: 1,
            },
            depth,
            samples,
            format!("synthetic:hotspots_{width}x{height}_u{}", depth.bits()),
        )
    }
}

/// Content address of a sample buffer: `sha256:<hex>` over shape, depth and
/// little-endian samples.
#[must_use]
pub fn content_address(shape: Shape, depth: BitDepth, samples: &[u16]) -> String {
    let mut hasher = Sha256::new();
    for dim in [shape.width, shape.height, shape.channels] {
        hasher.update((dim as u64).to_le_bytes());
    }
    hasher.update([depth.bits()]);
    for s in samples {
        hasher.update(s.to_le_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

/// Single-channel floating point working buffer handed to algorithms.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Columns
    pub width: usize,
    /// Rows
    pub height: usize,
    /// Row-major values
    pub data: Vec<f64>,
}

impl Plane {
    /// New plane filled with `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Value at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Value at signed coordinates with edge replication.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn get_clamped(&self, x: isize, y: isize) -> f64 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Value at signed coordinates with symmetric (mirror) reflection.
    #[must_use]
    pub fn get_reflected(&self, x: isize, y: isize) -> f64 {
        self.data[reflect(y, self.height) * self.width + reflect(x, self.width)]
    }
}

/// Mirror an index into `0..len` (`-1 → 0`, `len → len - 1`).
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub fn reflect(idx: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}
