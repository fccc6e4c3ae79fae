//! # denoise-lab: Reproducible Noise/Denoise Experiments
//!
//! **Version**: 0.1.0
//!
//! denoise-lab injects known statistical noise into thermal images, runs a
//! registry of denoising algorithms over the result and scores every output
//! against ground truth. Every operation is recorded with its parameters,
//! seed, inputs and output, so a whole sweep can be replayed bit for bit.
//!
//! ## Design Principles
//!
//! - **Determinism**: every random draw comes from a stream derived from the
//!   run seed and the operation's own identity, never from global state
//! - **Decoupling**: noise, denoise and metrics never call each other; only
//!   the [`pipeline`] knows how they combine
//! - **Traceability**: canonical names map parameters to folders and back,
//!   and the [`ledger`] answers "what produced this file"
//! - **Isolation**: a failing cell is recorded and skipped; only a ledger
//!   failure stops a sweep
//!
//! ## Example Usage
//!
//! ```rust
//! use denoise_lab::denoise::{default_config, AlgorithmId, DenoiseRegistry};
//! use denoise_lab::image::{BitDepth, Image};
//! use denoise_lab::metrics;
//! use denoise_lab::noise::{NoiseConfig, NoiseRegistry};
//! use denoise_lab::rng::Seed;
//!
//! let truth = Image::gradient(64, 64, BitDepth::U8)?;
//! let (noisy, _) = NoiseRegistry::with_defaults()
//!     .apply_noise(&truth, &NoiseConfig::gaussian(10.0, Seed::new(42)))?;
//! let denoised = DenoiseRegistry::with_defaults()
//!     .apply_denoise(&noisy, &default_config(AlgorithmId::Median))?;
//!
//! let before = metrics::compute(&truth, &noisy)?;
//! let after = metrics::compute(&truth, &denoised)?;
//! println!("PSNR {:.2} dB -> {:.2} dB", before.psnr, after.psnr);
//! # Ok::<(), denoise_lab::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod denoise;
pub mod error;
pub mod image;
pub mod image_io;
pub mod ledger;
pub mod metrics;
pub mod noise;
pub mod params;
pub mod pipeline;
pub mod rng;

pub use error::{Error, Result};
