//! Experiment cells
//!
//! A cell is one `(image, noise config, denoise config)` combination. It moves
//! through a fixed sequence of states:
//!
//! ```text
//! Pending ─► NoiseApplied ─► Denoised ─► Scored ─► Done
//!    │            │             │          │
//!    └────────────┴─────────────┴──────────┴──► Failed
//! ```

use serde::{Deserialize, Serialize};

use crate::denoise::DenoiseConfig;
use crate::error::ErrorKind;
use crate::image::Image;
use crate::ledger::CanonicalName;
use crate::metrics::MetricsRecord;
use crate::noise::NoiseConfig;

/// Lifecycle state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    /// Nothing done yet
    Pending,
    /// Noisy image produced and recorded
    NoiseApplied,
    /// Denoised image produced and recorded
    Denoised,
    /// Metrics computed and recorded
    Scored,
    /// Finished successfully
    Done,
    /// Stopped on an error
    Failed,
}

impl CellState {
    /// Whether the cell can make no further progress.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The state after a successful step, or `None` for terminal states.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::NoiseApplied),
            Self::NoiseApplied => Some(Self::Denoised),
            Self::Denoised => Some(Self::Scored),
            Self::Scored => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::NoiseApplied => "noise_applied",
            Self::Denoised => "denoised",
            Self::Scored => "scored",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// One unit of work in a sweep.
#[derive(Debug, Clone)]
pub struct Cell<'a> {
    /// Ground truth
    pub image: &'a Image,
    /// Noise to inject
    pub noise: &'a NoiseConfig,
    /// Denoiser to apply
    pub denoise: DenoiseConfig,
}

impl<'a> Cell<'a> {
    /// Bundle the three inputs of a cell.
    #[must_use]
    pub const fn new(image: &'a Image, noise: &'a NoiseConfig, denoise: DenoiseConfig) -> Self {
        Self {
            image,
            noise,
            denoise,
        }
    }

    /// `<image stem>/<noise name>/<denoise name>`.
    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.image.stem(),
            self.noise.canonical_name(),
            self.denoise.canonical_name()
        )
    }
}

/// A cell that did not reach [`CellState::Done`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCell {
    /// Cell identifier
    pub cell_id: String,
    /// State the cell was in when it failed
    pub stage: CellState,
    /// Error classification
    pub kind: ErrorKind,
    /// Rendered error
    pub message: String,
}

/// Outcome of running one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellReport {
    /// Cell identifier
    pub cell_id: String,
    /// Final state (`Done` or `Failed`)
    pub state: CellState,
    /// Identity of the noisy image, once produced
    pub noisy_identity: Option<String>,
    /// Identity of the denoised image, once produced
    pub denoised_identity: Option<String>,
    /// truth vs noisy, truth vs denoised, noisy vs denoised
    pub metrics: Vec<MetricsRecord>,
    /// Failure details when `state == Failed`
    pub failure: Option<FailedCell>,
}

impl CellReport {
    pub(crate) const fn new(cell_id: String) -> Self {
        Self {
            cell_id,
            state: CellState::Pending,
            noisy_identity: None,
            denoised_identity: None,
            metrics: Vec::new(),
            failure: None,
        }
    }

    /// Whether the cell finished.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == CellState::Done
    }

    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_walk_to_done() {
        let mut state = CellState::Pending;
        let mut steps = 0;
        while let Some(next) = state.next() {
            state = next;
            steps += 1;
        }
        assert_eq!(state, CellState::Done);
        assert_eq!(steps, 4);
        assert!(CellState::Failed.is_terminal());
        assert_eq!(CellState::Failed.next(), None);
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(
            serde_json::to_string(&CellState::NoiseApplied).unwrap(),
            "\"noise_applied\""
        );
        assert_eq!(CellState::Denoised.to_string(), "denoised");
    }
}
