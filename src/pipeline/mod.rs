//! Pipeline Orchestrator
//!
//! The only component that knows the Cartesian structure of a study. A
//! [`SweepSpec`] names images, noise configs and a [`DenoisePlan`]; the
//! [`Orchestrator`] turns it into [`Cell`]s, runs each one through the noise
//! and denoise registries, scores it and records every step in the ledger.
//!
//! ## Example
//!
//! ```rust
//! use denoise_lab::denoise::{default_config, AlgorithmId};
//! use denoise_lab::image::{BitDepth, Image};
//! use denoise_lab::ledger::Ledger;
//! use denoise_lab::noise::NoiseConfig;
//! use denoise_lab::pipeline::{DenoisePlan, Orchestrator, SweepSpec};
//! use denoise_lab::rng::Seed;
//!
//! let spec = SweepSpec::new(
//!     vec![Image::gradient(32, 32, BitDepth::U8)?],
//!     vec![NoiseConfig::salt_pepper(0.05, Seed::new(42))],
//!     DenoisePlan::Explicit(vec![default_config(AlgorithmId::Median)]),
//! );
//! let orchestrator = Orchestrator::new(Ledger::in_memory());
//! let summary = orchestrator.run_sweep(&spec)?;
//! assert!(summary.all_succeeded());
//! assert_eq!(orchestrator.ledger().len()?, 3);
//! # Ok::<(), denoise_lab::Error>(())
//! ```

mod cell;
mod orchestrator;
mod sweep;

pub use cell::{Cell, CellReport, CellState, FailedCell};
pub use orchestrator::{BaselineReport, Orchestrator};
pub use sweep::{DenoisePlan, SweepSpec, SweepSummary};
