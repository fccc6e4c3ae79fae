//! Error types for denoise-lab
//!
//! Every component surfaces its failures to the orchestrator through this
//! enum. Only [`Error::LedgerIo`] is fatal to a whole sweep; everything else
//! fails a single cell.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// denoise-lab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range configuration file
    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    /// Seed is not a non-negative integer representable as u64
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Noise parameter violates the noise model's schema
    #[error("Invalid parameter '{parameter}' for {model}: {reason}")]
    InvalidParameter {
        /// Noise model identifier
        model: String,
        /// Offending parameter name
        parameter: String,
        /// What is wrong with it
        reason: String,
    },

    /// Denoise parameter violates the algorithm's schema
    #[error("Parameter '{parameter}' out of range for {algorithm}: {reason}")]
    ParameterOutOfRange {
        /// Algorithm identifier
        algorithm: String,
        /// Offending parameter name
        parameter: String,
        /// What is wrong with it
        reason: String,
    },

    /// Noise type not present in the registry
    #[error("Unknown noise type: {0}")]
    UnknownNoiseType(String),

    /// Algorithm not present in the registry
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Paired metrics on images of different shape or value range
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The denoising strategy itself failed (error or panic)
    #[error("Algorithm '{algorithm}' failed: {source}")]
    AlgorithmRuntime {
        /// Algorithm identifier
        algorithm: String,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// Ledger storage failure (retryable, never silently dropped)
    #[error("Ledger IO error: {0}\nThe event was not recorded; retry or buffer it before continuing.")]
    LedgerIo(#[source] std::io::Error),

    /// Canonical name could not be parsed back into a config
    #[error("Invalid canonical name: {0}")]
    InvalidName(String),

    /// Image decode/encode failure
    #[error("Image IO error: {0}")]
    ImageIo(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable classification of an [`Error`], used in sweep summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::ConfigValidation`]
    ConfigValidation,
    /// See [`Error::InvalidSeed`]
    InvalidSeed,
    /// See [`Error::InvalidParameter`]
    InvalidParameter,
    /// See [`Error::ParameterOutOfRange`]
    ParameterOutOfRange,
    /// See [`Error::UnknownNoiseType`]
    UnknownNoiseType,
    /// See [`Error::UnknownAlgorithm`]
    UnknownAlgorithm,
    /// See [`Error::ShapeMismatch`]
    ShapeMismatch,
    /// See [`Error::AlgorithmRuntime`]
    AlgorithmRuntime,
    /// See [`Error::LedgerIo`]
    LedgerIo,
    /// See [`Error::InvalidName`]
    InvalidName,
    /// See [`Error::ImageIo`]
    ImageIo,
    /// See [`Error::Io`]
    Io,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigValidation(_) => ErrorKind::ConfigValidation,
            Self::InvalidSeed(_) => ErrorKind::InvalidSeed,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::ParameterOutOfRange { .. } => ErrorKind::ParameterOutOfRange,
            Self::UnknownNoiseType(_) => ErrorKind::UnknownNoiseType,
            Self::UnknownAlgorithm(_) => ErrorKind::UnknownAlgorithm,
            Self::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            Self::AlgorithmRuntime { .. } => ErrorKind::AlgorithmRuntime,
            Self::LedgerIo(_) => ErrorKind::LedgerIo,
            Self::InvalidName(_) => ErrorKind::InvalidName,
            Self::ImageIo(_) => ErrorKind::ImageIo,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error must abort the whole sweep.
    ///
    /// Losing a ledger event breaks traceability for the entire run, so
    /// ledger failures are the only sweep-fatal errors.
    #[must_use]
    pub const fn is_fatal_to_sweep(&self) -> bool {
        matches!(self, Self::LedgerIo(_))
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConfigValidation => "ConfigValidationError",
            Self::InvalidSeed => "InvalidSeed",
            Self::InvalidParameter => "InvalidParameter",
            Self::ParameterOutOfRange => "ParameterOutOfRange",
            Self::UnknownNoiseType => "UnknownNoiseType",
            Self::UnknownAlgorithm => "UnknownAlgorithm",
            Self::ShapeMismatch => "ShapeMismatch",
            Self::AlgorithmRuntime => "AlgorithmRuntimeError",
            Self::LedgerIo => "LedgerIOError",
            Self::InvalidName => "InvalidName",
            Self::ImageIo => "ImageIOError",
            Self::Io => "IOError",
        };
        f.write_str(name)
    }
}
