//! Per-output metadata written next to generated images

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::naming::CanonicalName;
use crate::denoise::DenoiseConfig;
use crate::image_io;
use crate::noise::NoiseConfig;
use crate::rng::Seed;
use crate::{Error, Result};

/// Runtime identifier stamped on every metadata record.
pub const RUNTIME_VERSION: &str = concat!("denoise-lab/", env!("CARGO_PKG_VERSION"));

/// The operation a metadata record describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "parameters", rename_all = "snake_case")]
pub enum OperationConfig {
    /// A noise application
    Noise(NoiseConfig),
    /// A denoise application
    Denoise(DenoiseConfig),
}

impl OperationConfig {
    /// File name the record is persisted under.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Noise(_) => "noise_metadata.json",
            Self::Denoise(_) => "denoise_metadata.json",
        }
    }

    fn canonical_name(&self) -> String {
        match self {
            Self::Noise(c) => c.canonical_name(),
            Self::Denoise(c) => c.canonical_name(),
        }
    }
}

/// Everything needed to reproduce one output image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetadata {
    timestamp: DateTime<Utc>,
    config: OperationConfig,
    canonical_name: String,
    seed: Option<Seed>,
    runtime_version: String,
    source_identity: String,
    output_identity: String,
}

impl OperationMetadata {
    /// Metadata for a noise application.
    #[must_use]
    pub fn for_noise(
        config: &NoiseConfig,
        source_identity: impl Into<String>,
        output_identity: impl Into<String>,
    ) -> Self {
        Self::new(
            OperationConfig::Noise(config.clone()),
            Some(config.seed),
            source_identity.into(),
            output_identity.into(),
        )
    }

    /// Metadata for a denoise application.
    #[must_use]
    pub fn for_denoise(
        config: &DenoiseConfig,
        source_identity: impl Into<String>,
        output_identity: impl Into<String>,
    ) -> Self {
        Self::new(
            OperationConfig::Denoise(config.clone()),
            None,
            source_identity.into(),
            output_identity.into(),
        )
    }

    fn new(
        config: OperationConfig,
        seed: Option<Seed>,
        source_identity: String,
        output_identity: String,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            canonical_name: config.canonical_name(),
            config,
            seed,
            runtime_version: RUNTIME_VERSION.to_string(),
            source_identity,
            output_identity,
        }
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The operation's config.
    #[must_use]
    pub const fn config(&self) -> &OperationConfig {
        &self.config
    }

    /// Canonical name of the config.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Seed of the operation, for noise.
    #[must_use]
    pub const fn seed(&self) -> Option<Seed> {
        self.seed
    }

    /// Version string of the producing runtime.
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Identity of the input image.
    #[must_use]
    pub fn source_identity(&self) -> &str {
        &self.source_identity
    }

    /// Identity of the output image.
    #[must_use]
    pub fn output_identity(&self) -> &str {
        &self.output_identity
    }

    /// Sidecar path for the image at `output`:
    /// `<dir>/<stem>.noise_metadata.json` or `<dir>/<stem>.denoise_metadata.json`.
    #[must_use]
    pub fn sidecar_path(&self, output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map_or_else(|| "output".into(), |s| s.to_string_lossy());
        output.with_file_name(format!("{stem}.{}", self.config.file_name()))
    }

    /// Write the record next to the image at `output`, returning the
    /// sidecar path.
    ///
    /// The file is written to a temporary name in the same directory and
    /// renamed into place, so concurrent writers never leave a torn file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written.
    pub fn save_beside(&self, output: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.sidecar_path(output.as_ref());
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        image_io::write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Read a record written by [`OperationMetadata::save_beside`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::ConfigValidation`] if it is not a metadata record.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::ConfigValidation(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::{default_config, AlgorithmId};

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = NoiseConfig::gaussian(10.0, Seed::new(7));
        let meta = OperationMetadata::for_noise(&config, "synthetic:x", "sha256:abc");
        let path = meta.save_beside(dir.path().join("frame.png")).unwrap();
        assert_eq!(path, dir.path().join("frame.noise_metadata.json"));

        let loaded = OperationMetadata::load(&path).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.canonical_name(), "gaussian_sigma10");
        assert_eq!(loaded.seed(), Some(Seed::new(7)));
        assert!(loaded.runtime_version().starts_with("denoise-lab/"));
    }

    #[test]
    fn test_denoise_file_name() {
        let meta = OperationMetadata::for_denoise(&default_config(AlgorithmId::Median), "a", "b");
        assert_eq!(meta.config().file_name(), "denoise_metadata.json");
        assert_eq!(
            meta.sidecar_path(Path::new("out/gaussian_sigma10/median_k5/a.png")),
            Path::new("out/gaussian_sigma10/median_k5/a.denoise_metadata.json")
        );
        assert_eq!(meta.seed(), None);
        assert_eq!(meta.canonical_name(), "median_k5");
    }
}
