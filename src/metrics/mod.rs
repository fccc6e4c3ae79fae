//! Metrics Engine
//!
//! Paired (full-reference) metrics between two images of identical shape and
//! bit depth, and reference-free statistics of a single image.
//!
//! ## PSNR sentinel
//!
//! PSNR is `10·log10(MAX² / MSE)` with `MAX` the bit depth's full scale. When
//! the images are pixel-identical `MSE == 0` and PSNR is [`f64::INFINITY`]
//! rather than an error. JSON has no infinity, so the value serializes as
//! the string `"inf"` and parses back to infinity.

mod filters;
mod paired;
mod stats;

use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use paired::{edge_preservation, mse, psnr, ssim};
pub use stats::{compute_reference_free, summarize_stats, FieldSummary, StatsRecord, EDGE_THRESHOLD_FRACTION};

use crate::image::Image;
use crate::{Error, Result};

/// Which two images of a cell a record compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectPair {
    /// Ground truth vs noisy
    TruthVsNoisy,
    /// Ground truth vs denoised
    TruthVsDenoised,
    /// Noisy vs denoised
    NoisyVsDenoised,
}

/// Paired quality metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Compared pair, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_pair: Option<SubjectPair>,
    /// Peak signal-to-noise ratio in dB (`+∞` for identical images)
    #[serde(with = "psnr_serde")]
    pub psnr: f64,
    /// Mean structural similarity
    pub ssim: f64,
    /// Mean squared error, native scale
    pub mse: f64,
    /// Correlation of Sobel gradient magnitudes
    pub edge_preservation: f64,
    /// Wall time of the operation that produced the candidate, or of the
    /// metric computation itself when there is none
    pub processing_time_ms: f64,
}

impl MetricsRecord {
    /// Tag the record with the pair it compares.
    #[must_use]
    pub fn with_pair(mut self, pair: SubjectPair) -> Self {
        self.subject_pair = Some(pair);
        self
    }

    /// Override the processing time.
    #[must_use]
    pub fn with_processing_time_ms(mut self, ms: f64) -> Self {
        self.processing_time_ms = ms;
        self
    }
}

fn check_compatible(reference: &Image, candidate: &Image) -> Result<()> {
    if reference.shape() != candidate.shape() {
        return Err(Error::ShapeMismatch(format!(
            "{} vs {}",
            reference.shape(),
            candidate.shape()
        )));
    }
    if reference.depth() != candidate.depth() {
        return Err(Error::ShapeMismatch(format!(
            "{}-bit vs {}-bit",
            reference.depth().bits(),
            candidate.depth().bits()
        )));
    }
    Ok(())
}

/// Compare `candidate` against `reference`.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] unless both images have the same width,
/// height, channel count and bit depth.
pub fn compute(reference: &Image, candidate: &Image) -> Result<MetricsRecord> {
    check_compatible(reference, candidate)?;
    let start = Instant::now();

    let record = if reference.samples() == candidate.samples() {
        MetricsRecord {
            subject_pair: None,
            psnr: f64::INFINITY,
            ssim: 1.0,
            mse: 0.0,
            edge_preservation: 1.0,
            processing_time_ms: 0.0,
        }
    } else {
        let mse = paired::mse(reference, candidate);
        MetricsRecord {
            subject_pair: None,
            psnr: paired::psnr(mse, reference.max_value()),
            ssim: paired::ssim(reference, candidate),
            mse,
            edge_preservation: paired::edge_preservation(reference, candidate),
            processing_time_ms: 0.0,
        }
    };
    Ok(record.with_processing_time_ms(start.elapsed().as_secs_f64() * 1000.0))
}

mod psnr_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) if s == "inf" => Ok(f64::INFINITY),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"inf\", found \"{s}\""
            ))),
        }
    }
}
