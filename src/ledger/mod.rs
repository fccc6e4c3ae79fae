//! Experiment Ledger
//!
//! Append-only record of every operation an experiment performs: which
//! parameters, which seed, which inputs, which output. Together with the
//! canonical names and the per-output metadata files, the ledger is what
//! makes a sweep replayable.
//!
//! ## Layout
//!
//! - `event`: the immutable [`ExperimentEvent`] and its payloads
//! - `store`: the mutex-serialized [`Ledger`] with its JSON-lines sink
//! - `naming`: canonical names and their inverse
//! - `metadata`: `noise_metadata.json` / `denoise_metadata.json`

mod event;
mod metadata;
mod naming;
mod store;

pub use event::{EventPayload, EventType, ExperimentEvent, ExperimentEventBuilder};
pub use metadata::{OperationConfig, OperationMetadata, RUNTIME_VERSION};
pub use naming::{canonical_name, parse_denoise_name, parse_noise_name, CanonicalName};
pub use store::{read_events, EventFilter, Ledger};
