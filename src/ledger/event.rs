//! Experiment Event - one immutable ledger entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::denoise::DenoiseConfig;
use crate::error::ErrorKind;
use crate::metrics::MetricsRecord;
use crate::noise::NoiseConfig;
use crate::pipeline::CellState;
use crate::rng::{Seed, StreamState};

/// Kind of operation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A noise model produced a noisy image
    NoiseApplied,
    /// A denoiser produced a denoised image
    DenoiseApplied,
    /// A cell's three paired metrics were computed
    MetricsComputed,
    /// A cell stopped before completing
    CellFailed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoiseApplied => "noise_applied",
            Self::DenoiseApplied => "denoise_applied",
            Self::MetricsComputed => "metrics_computed",
            Self::CellFailed => "cell_failed",
        })
    }
}

/// Operation-specific content of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum EventPayload {
    /// Noise parameters and the stream that realized them
    Noise {
        /// Canonical noise config
        config: NoiseConfig,
        /// Canonical name of the config
        canonical_name: String,
        /// Final stream state
        stream: StreamState,
    },
    /// Denoise parameters
    Denoise {
        /// Canonical denoise config
        config: DenoiseConfig,
        /// Canonical name of the config
        canonical_name: String,
        /// Wall time of the denoiser
        elapsed_ms: f64,
    },
    /// Paired metrics of the cell
    Metrics {
        /// truth vs noisy, truth vs denoised, noisy vs denoised
        records: Vec<MetricsRecord>,
    },
    /// Why a cell stopped
    Failure {
        /// State the cell was in when it failed
        stage: CellState,
        /// Error classification
        kind: ErrorKind,
        /// Rendered error
        message: String,
    },
}

impl EventPayload {
    /// Event type implied by this payload.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Noise { .. } => EventType::NoiseApplied,
            Self::Denoise { .. } => EventType::DenoiseApplied,
            Self::Metrics { .. } => EventType::MetricsComputed,
            Self::Failure { .. } => EventType::CellFailed,
        }
    }
}

/// An immutable ledger entry.
///
/// Built with [`ExperimentEvent::builder`]; the ledger assigns `sequence`
/// and `timestamp` when the event is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEvent {
    sequence: u64,
    event_type: EventType,
    cell_id: String,
    payload: EventPayload,
    seed: Option<Seed>,
    timestamp: DateTime<Utc>,
    input_identities: Vec<String>,
    output_identity: Option<String>,
}

impl ExperimentEvent {
    /// Start building an event for `cell_id`.
    #[must_use]
    pub fn builder(cell_id: impl Into<String>, payload: EventPayload) -> ExperimentEventBuilder {
        ExperimentEventBuilder::new(cell_id, payload)
    }

    /// Position in the ledger (0-based, gap-free).
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Kind of operation.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Cell this event belongs to.
    #[must_use]
    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }

    /// Operation-specific content.
    #[must_use]
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Seed in effect, if the operation was seeded.
    #[must_use]
    pub const fn seed(&self) -> Option<Seed> {
        self.seed
    }

    /// When the event was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Identities of the images the operation read.
    #[must_use]
    pub fn input_identities(&self) -> &[String] {
        &self.input_identities
    }

    /// Identity of what the operation produced.
    #[must_use]
    pub fn output_identity(&self) -> Option<&str> {
        self.output_identity.as_deref()
    }

    pub(super) fn stamp(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self.timestamp = Utc::now();
        self
    }
}

/// Builder for [`ExperimentEvent`].
#[derive(Debug)]
pub struct ExperimentEventBuilder {
    cell_id: String,
    payload: EventPayload,
    seed: Option<Seed>,
    input_identities: Vec<String>,
    output_identity: Option<String>,
}

impl ExperimentEventBuilder {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn new(cell_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            cell_id: cell_id.into(),
            payload,
            seed: None,
            input_identities: Vec::new(),
            output_identity: None,
        }
    }

    /// Record the seed in effect.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Append an input identity.
    #[must_use]
    pub fn input(mut self, identity: impl Into<String>) -> Self {
        self.input_identities.push(identity.into());
        self
    }

    /// Set the output identity.
    #[must_use]
    pub fn output(mut self, identity: impl Into<String>) -> Self {
        self.output_identity = Some(identity.into());
        self
    }

    /// Build the event (sequence 0, timestamp now).
    #[must_use]
    pub fn build(self) -> ExperimentEvent {
        ExperimentEvent {
            sequence: 0,
            event_type: self.payload.event_type(),
            cell_id: self.cell_id,
            payload: self.payload,
            seed: self.seed,
            timestamp: Utc::now(),
            input_identities: self.input_identities,
            output_identity: self.output_identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> EventPayload {
        EventPayload::Failure {
            stage: CellState::Pending,
            kind: ErrorKind::InvalidParameter,
            message: "density".to_string(),
        }
    }

    #[test]
    fn test_event_type_follows_payload() {
        let event = ExperimentEvent::builder("cell", failure()).build();
        assert_eq!(event.event_type(), EventType::CellFailed);
        assert_eq!(event.sequence(), 0);
        assert!(event.output_identity().is_none());
    }

    #[test]
    fn test_builder_collects_identities() {
        let event = ExperimentEvent::builder("cell", failure())
            .seed(Seed::new(3))
            .input("a")
            .input("b")
            .output("c")
            .build();
        assert_eq!(event.input_identities(), ["a".to_string(), "b".to_string()]);
        assert_eq!(event.output_identity(), Some("c"));
        assert_eq!(event.seed(), Some(Seed::new(3)));
    }

    #[test]
    fn test_every_payload_survives_json() {
        use crate::denoise::{default_config, AlgorithmId};
        use crate::image::{BitDepth, Image};
        use crate::noise::{NoiseConfig, NoiseRegistry};

        let image = Image::gradient(16, 16, BitDepth::U12).unwrap();
        let config = NoiseConfig::gaussian(40.0, Seed::new(11));
        let (noisy, stream) = NoiseRegistry::with_defaults()
            .apply_noise(&image, &config)
            .unwrap();
        assert!(stream.word_pos > 0);

        let payloads = [
            EventPayload::Noise {
                canonical_name: "gaussian_sigma40".to_string(),
                config,
                stream,
            },
            EventPayload::Denoise {
                config: default_config(AlgorithmId::Bm3d),
                canonical_name: "bm3d_s0p039_stall_pnp".to_string(),
                elapsed_ms: 1.5,
            },
            EventPayload::Metrics {
                records: vec![crate::metrics::compute(&image, &noisy).unwrap()],
            },
            failure(),
        ];
        for payload in payloads {
            let event = ExperimentEvent::builder("cell", payload).seed(Seed::new(11)).build();
            let line = serde_json::to_string(&event).unwrap();
            let back: ExperimentEvent = serde_json::from_str(&line).unwrap();
            assert_eq!(back, event, "{line}");
        }
    }

    #[test]
    fn test_failure_line_keeps_error_kind() {
        let line = serde_json::to_string(&failure()).unwrap();
        assert!(line.contains("\"operation\":\"failure\""), "{line}");
        assert!(line.contains("\"kind\":\"invalid_parameter\""), "{line}");
    }
}
