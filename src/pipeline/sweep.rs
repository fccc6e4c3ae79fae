//! Sweep plans and their summaries

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellReport, FailedCell};
use crate::config::DenoiseStudyConfig;
use crate::denoise::{recommend, AlgorithmId, DenoiseConfig};
use crate::image::Image;
use crate::noise::{NoiseConfig, NoiseType};

/// Which denoisers run against each noise config.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DenoisePlan {
    /// The same configs for every noise config
    Explicit(Vec<DenoiseConfig>),
    /// Configs tuned to each noise config. A mapping in the study config
    /// replaces the built-in table for the noise types it names.
    #[default]
    Recommended,
    /// [`DenoisePlan::Recommended`] with a study-config mapping override
    RecommendedWith(DenoiseStudyConfig),
    /// Every registered algorithm with its configured variations, or its
    /// defaults when the study config has none
    AllAlgorithms(DenoiseStudyConfig),
}

/// The Cartesian product `images × noise configs × denoise configs`.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    images: Vec<Image>,
    noise: Vec<NoiseConfig>,
    plan: DenoisePlan,
}

/// Noise level on the 8-bit scale the recommendation table is written in.
fn table_level(noise: &NoiseConfig, image: &Image) -> f64 {
    let level = noise.level().unwrap_or(f64::NAN);
    match noise.noise_type {
        NoiseType::Gaussian => level * 255.0 / image.max_value(),
        _ => level,
    }
}

impl SweepSpec {
    /// Describe a sweep.
    #[must_use]
    pub const fn new(images: Vec<Image>, noise: Vec<NoiseConfig>, plan: DenoisePlan) -> Self {
        Self {
            images,
            noise,
            plan,
        }
    }

    /// Ground-truth images.
    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Noise configs.
    #[must_use]
    pub fn noise(&self) -> &[NoiseConfig] {
        &self.noise
    }

    /// Denoise plan.
    #[must_use]
    pub const fn plan(&self) -> &DenoisePlan {
        &self.plan
    }

    /// Denoise configs for one `(image, noise)` pair. `registered` lists
    /// the algorithms [`DenoisePlan::AllAlgorithms`] expands to.
    #[must_use]
    pub fn denoise_configs(
        &self,
        image: &Image,
        noise: &NoiseConfig,
        registered: &[AlgorithmId],
    ) -> Vec<DenoiseConfig> {
        match &self.plan {
            DenoisePlan::Explicit(configs) => configs.clone(),
            DenoisePlan::Recommended => recommend(noise.noise_type, table_level(noise, image)),
            DenoisePlan::RecommendedWith(study) => study
                .mapping_for(noise.noise_type)
                .map_or_else(
                    || recommend(noise.noise_type, table_level(noise, image)),
                    <[DenoiseConfig]>::to_vec,
                ),
            DenoisePlan::AllAlgorithms(study) => registered
                .iter()
                .flat_map(|&id| study.configs_for(id))
                .collect(),
        }
    }

    /// Cells in image-major, then noise, then denoise order, produced lazily.
    pub fn cells<'a>(&'a self, registered: &'a [AlgorithmId]) -> impl Iterator<Item = Cell<'a>> + 'a {
        self.images.iter().flat_map(move |image| {
            self.noise.iter().flat_map(move |noise| {
                self.denoise_configs(image, noise, registered)
                    .into_iter()
                    .map(move |denoise| Cell::new(image, noise, denoise))
            })
        })
    }
}

/// Totals of a finished sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Cells attempted
    pub total: usize,
    /// Cells that reached `Done`
    pub succeeded: usize,
    /// Cells that failed, in sweep order
    pub failed: Vec<FailedCell>,
}

impl SweepSummary {
    /// Tally cell reports.
    #[must_use]
    pub fn from_reports(reports: &[CellReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.push(report);
        }
        summary
    }

    pub(crate) fn push(&mut self, report: &CellReport) {
        self.total += 1;
        if report.succeeded() {
            self.succeeded += 1;
        } else if let Some(failure) = &report.failure {
            self.failed.push(failure.clone());
        }
    }

    /// Whether every cell finished.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.succeeded == self.total
    }
}

impl std::fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cells: {} succeeded, {} failed",
            self.total,
            self.succeeded,
            self.failed.len()
        )
    }
}
