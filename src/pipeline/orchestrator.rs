//! Pipeline orchestrator
//!
//! Drives cells through noise → denoise → metrics, records every step in the
//! ledger and, when a storage root is set, writes images and metadata under
//!
//! ```text
//! <root>/<noise name>/<stem>.png                                  noisy
//! <root>/<noise name>/<stem>.noise_metadata.json
//! <root>/<noise name>/<denoise name>/<stem>.png                   denoised
//! <root>/<noise name>/<denoise name>/<stem>.denoise_metadata.json
//! ```
//!
//! Files are written through a temporary name and renamed into place, so
//! parallel cells sharing a noisy output never tear each other's files.
//!
//! Cell errors are recorded as `cell_failed` events and the sweep moves on.
//! Only a ledger write failure ends a sweep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellReport, CellState, FailedCell};
use super::sweep::{SweepSpec, SweepSummary};
use crate::denoise::{DenoiseConfig, DenoiseRegistry};
use crate::image::Image;
use crate::image_io;
use crate::ledger::{
    CanonicalName, EventPayload, ExperimentEvent, ExperimentEventBuilder, Ledger, OperationMetadata,
};
use crate::metrics::{self, FieldSummary, StatsRecord, SubjectPair};
use crate::noise::{NoiseConfig, NoiseRegistry};
use crate::Result;

/// Reference-free statistics of a set of clean images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    /// `(image identity, stats)` in input order
    pub images: Vec<(String, StatsRecord)>,
    /// Per-field aggregates across images
    pub summary: BTreeMap<String, FieldSummary>,
}

/// Runs experiment cells against a pair of registries and a ledger.
#[derive(Debug)]
pub struct Orchestrator {
    noise: NoiseRegistry,
    denoise: DenoiseRegistry,
    ledger: Ledger,
    storage_root: Option<PathBuf>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl Orchestrator {
    /// Orchestrator with the built-in registries and no persistence.
    #[must_use]
    pub fn new(ledger: Ledger) -> Self {
        Self {
            noise: NoiseRegistry::with_defaults(),
            denoise: DenoiseRegistry::with_defaults(),
            ledger,
            storage_root: None,
        }
    }

    /// Replace the noise registry.
    #[must_use]
    pub fn with_noise_registry(mut self, registry: NoiseRegistry) -> Self {
        self.noise = registry;
        self
    }

    /// Replace the denoise registry.
    #[must_use]
    pub fn with_denoise_registry(mut self, registry: DenoiseRegistry) -> Self {
        self.denoise = registry;
        self
    }

    /// Persist images and metadata under `root`.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// The ledger every operation is recorded in.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The noise registry.
    #[must_use]
    pub const fn noise_registry(&self) -> &NoiseRegistry {
        &self.noise
    }

    /// The denoise registry.
    #[must_use]
    pub const fn denoise_registry(&self) -> &DenoiseRegistry {
        &self.denoise
    }

    /// Where the denoised output of `cell` is stored, if persistence is on.
    #[must_use]
    pub fn output_path(&self, cell: &Cell<'_>) -> Option<PathBuf> {
        self.storage_root.as_ref().map(|root| {
            root.join(cell.noise.canonical_name())
                .join(cell.denoise.canonical_name())
                .join(format!("{}.png", cell.image.stem()))
        })
    }

    /// Run one cell to `Done` or `Failed`.
    ///
    /// # Errors
    ///
    /// Only [`crate::Error::LedgerIo`]; every other error is recorded as a
    /// `cell_failed` event and reported in the returned [`CellReport`].
    pub fn run_cell(&self, cell: &Cell<'_>) -> Result<CellReport> {
        let mut report = CellReport::new(cell.id());
        let span = tracing::info_span!("cell", id = %report.cell_id);
        let _entered = span.enter();

        match self.drive(cell, &mut report) {
            Ok(()) => {
                report.advance();
                tracing::debug!("cell done");
                Ok(report)
            }
            Err(e) if e.is_fatal_to_sweep() => Err(e),
            Err(e) => {
                let stage = report.state;
                tracing::warn!(%stage, error = %e, "cell failed");
                self.ledger.record(
                    ExperimentEvent::builder(
                        report.cell_id.clone(),
                        EventPayload::Failure {
                            stage,
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    )
                    .seed(cell.noise.seed)
                    .input(cell.image.identity())
                    .build(),
                )?;
                report.failure = Some(FailedCell {
                    cell_id: report.cell_id.clone(),
                    stage,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                report.state = CellState::Failed;
                Ok(report)
            }
        }
    }

    fn drive(&self, cell: &Cell<'_>, report: &mut CellReport) -> Result<()> {
        let truth = cell.image;

        let (noisy, noise_ms) = self.noise_step(&report.cell_id, truth, cell.noise)?;
        report.noisy_identity = Some(noisy.identity().to_string());
        report.advance();

        let start = Instant::now();
        let config = self.denoise.validate(&cell.denoise)?;
        let denoised = self.denoise.apply_denoise(&noisy, &config)?;
        let denoise_ms = elapsed_ms(start);
        self.ledger.record(
            ExperimentEvent::builder(
                report.cell_id.clone(),
                EventPayload::Denoise {
                    canonical_name: config.canonical_name(),
                    config: config.clone(),
                    elapsed_ms: denoise_ms,
                },
            )
            .input(noisy.identity())
            .output(denoised.identity())
            .build(),
        )?;
        if let Some(path) = self.output_path(cell) {
            Self::persist_denoised(&config, &noisy, &denoised, &path)?;
        }
        report.denoised_identity = Some(denoised.identity().to_string());
        report.advance();

        let records = vec![
            metrics::compute(truth, &noisy)?
                .with_pair(SubjectPair::TruthVsNoisy)
                .with_processing_time_ms(noise_ms),
            metrics::compute(truth, &denoised)?
                .with_pair(SubjectPair::TruthVsDenoised)
                .with_processing_time_ms(denoise_ms),
            metrics::compute(&noisy, &denoised)?
                .with_pair(SubjectPair::NoisyVsDenoised)
                .with_processing_time_ms(denoise_ms),
        ];
        self.ledger.record(
            ExperimentEvent::builder(
                report.cell_id.clone(),
                EventPayload::Metrics {
                    records: records.clone(),
                },
            )
            .input(truth.identity())
            .input(noisy.identity())
            .input(denoised.identity())
            .output(format!("metrics:{}", report.cell_id))
            .build(),
        )?;
        report.metrics = records;
        report.advance();
        Ok(())
    }

    /// Apply, record and optionally persist one noise config.
    fn noise_step(&self, cell_id: &str, truth: &Image, noise: &NoiseConfig) -> Result<(Image, f64)> {
        let start = Instant::now();
        let params = self.noise.validate(noise, truth.depth())?;
        let config = NoiseConfig::new(noise.noise_type, params, noise.seed);
        let (noisy, stream) = self.noise.apply_noise(truth, &config)?;
        let noise_ms = elapsed_ms(start);

        self.ledger.record(
            ExperimentEventBuilder::new(
                cell_id,
                EventPayload::Noise {
                    canonical_name: config.canonical_name(),
                    config: config.clone(),
                    stream,
                },
            )
            .seed(config.seed)
            .input(truth.identity())
            .output(noisy.identity())
            .build(),
        )?;
        if let Some(root) = &self.storage_root {
            let path = root
                .join(config.canonical_name())
                .join(format!("{}.png", truth.stem()));
            image_io::save(&noisy, &path)?;
            OperationMetadata::for_noise(&config, truth.identity(), noisy.identity())
                .save_beside(&path)?;
        }
        Ok((noisy, noise_ms))
    }

    fn persist_denoised(
        config: &DenoiseConfig,
        noisy: &Image,
        denoised: &Image,
        path: &Path,
    ) -> Result<()> {
        image_io::save(denoised, path)?;
        OperationMetadata::for_denoise(config, noisy.identity(), denoised.identity())
            .save_beside(path)?;
        Ok(())
    }

    /// Run every cell of `spec` in order.
    ///
    /// # Errors
    ///
    /// [`crate::Error::LedgerIo`] aborts the sweep; cells already recorded stay
    /// recorded.
    pub fn run_sweep(&self, spec: &SweepSpec) -> Result<SweepSummary> {
        let registered = self.denoise.ids();
        let mut summary = SweepSummary::default();
        for cell in spec.cells(&registered) {
            summary.push(&self.run_cell(&cell)?);
        }
        Self::log_summary(&summary);
        Ok(summary)
    }

    /// Run every cell of `spec` on the rayon pool.
    ///
    /// Each cell derives its own random stream, so reports and ledger
    /// payloads match [`Orchestrator::run_sweep`]; only the interleaving of
    /// ledger sequence numbers differs.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run_sweep`].
    #[cfg(feature = "parallel")]
    pub fn run_sweep_parallel(&self, spec: &SweepSpec) -> Result<SweepSummary> {
        use rayon::prelude::*;

        let registered = self.denoise.ids();
        let cells: Vec<Cell<'_>> = spec.cells(&registered).collect();
        let reports = cells
            .par_iter()
            .map(|cell| self.run_cell(cell))
            .collect::<Result<Vec<_>>>()?;
        let summary = SweepSummary::from_reports(&reports);
        Self::log_summary(&summary);
        Ok(summary)
    }

    /// Apply each noise config to each image without denoising.
    ///
    /// Cell ids are `<image stem>/<noise name>`.
    ///
    /// # Errors
    ///
    /// Only [`crate::Error::LedgerIo`].
    pub fn run_noise_suite(&self, images: &[Image], noise: &[NoiseConfig]) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        for image in images {
            for config in noise {
                let cell_id = format!("{}/{}", image.stem(), config.canonical_name());
                let mut report = CellReport::new(cell_id.clone());
                match self.noise_step(&cell_id, image, config) {
                    Ok((noisy, _)) => {
                        report.noisy_identity = Some(noisy.identity().to_string());
                        report.state = CellState::Done;
                    }
                    Err(e) if e.is_fatal_to_sweep() => return Err(e),
                    Err(e) => {
                        tracing::warn!(cell = %cell_id, error = %e, "noise failed");
                        self.ledger.record(
                            ExperimentEvent::builder(
                                cell_id.clone(),
                                EventPayload::Failure {
                                    stage: CellState::Pending,
                                    kind: e.kind(),
                                    message: e.to_string(),
                                },
                            )
                            .seed(config.seed)
                            .input(image.identity())
                            .build(),
                        )?;
                        report.failure = Some(FailedCell {
                            cell_id,
                            stage: CellState::Pending,
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                        report.state = CellState::Failed;
                    }
                }
                summary.push(&report);
            }
        }
        Self::log_summary(&summary);
        Ok(summary)
    }

    /// Reference-free statistics of clean images. Nothing is recorded.
    #[must_use]
    pub fn measure_baseline(&self, images: &[Image]) -> BaselineReport {
        let stats: Vec<(String, StatsRecord)> = images
            .iter()
            .map(|image| (image.identity().to_string(), metrics::compute_reference_free(image)))
            .collect();
        let records: Vec<StatsRecord> = stats.iter().map(|(_, s)| s.clone()).collect();
        BaselineReport {
            summary: metrics::summarize_stats(&records),
            images: stats,
        }
    }

    fn log_summary(summary: &SweepSummary) {
        if summary.failed.is_empty() {
            tracing::info!(total = summary.total, "sweep finished");
        } else {
            tracing::warn!(
                total = summary.total,
                failed = summary.failed.len(),
                "sweep finished with failures"
            );
        }
    }
}

impl From<Ledger> for Orchestrator {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
