//! Canonical names
//!
//! A canonical name is a pure function of a config's parameters, stable
//! across runs and reversible:
//!
//! ```text
//! noise   := <token> "_" <abbrev><value>
//! denoise := <algo> ("_" <abbrev><value>)+        parameters in schema order
//! ```
//!
//! | Config | Name |
//! |---|---|
//! | gaussian σ = 10 | `gaussian_sigma10` |
//! | salt & pepper density = 0.01 | `saltpepper_d001` |
//! | speckle variance = 0.1 | `speckle_var010` |
//! | bilateral 9 / 75 / 75 | `bilateral_d9_sc75_ss75` |
//! | bm3d 0.039 / all / np | `bm3d_s0p039_stall_pnp` |
//!
//! Seeds and tuning provenance are not part of the name.

use crate::denoise::{AlgorithmId, DenoiseConfig};
use crate::noise::{NoiseConfig, NoiseType};
use crate::params::{conform, ParamMap, ParamSpec};
use crate::rng::Seed;
use crate::{Error, Result};

/// Types with a canonical, reversible name.
pub trait CanonicalName {
    /// The canonical name.
    fn canonical_name(&self) -> String;
}

fn join(head: &str, schema: &[ParamSpec], params: &ParamMap) -> String {
    let mut name = head.to_string();
    for spec in schema {
        if let Some(value) = params.get(spec.name) {
            name.push('_');
            name.push_str(spec.abbrev);
            name.push_str(&spec.format_value(value));
        }
    }
    name
}

impl CanonicalName for NoiseConfig {
    fn canonical_name(&self) -> String {
        join(self.noise_type.token(), self.noise_type.schema(), &self.params)
    }
}

impl CanonicalName for DenoiseConfig {
    fn canonical_name(&self) -> String {
        join(self.algorithm.as_str(), self.algorithm.schema(), &self.params)
    }
}

/// Canonical name of any config.
#[must_use]
pub fn canonical_name<C: CanonicalName + ?Sized>(config: &C) -> String {
    config.canonical_name()
}

/// Split `name` into its head and a parameter map following `schema`.
fn split_params<'a>(name: &'a str, schema: &[ParamSpec]) -> Result<(&'a str, ParamMap)> {
    let invalid = |why: String| Error::InvalidName(format!("'{name}': {why}"));
    let mut segments = name.split('_');
    let head = segments
        .next()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("empty name".to_string()))?;
    let mut params = ParamMap::new();
    for spec in schema {
        let segment = segments
            .next()
            .ok_or_else(|| invalid(format!("missing '{}'", spec.name)))?;
        let text = segment
            .strip_prefix(spec.abbrev)
            .ok_or_else(|| invalid(format!("expected '{}' prefix in '{segment}'", spec.abbrev)))?;
        let value = spec
            .parse_value(text)
            .ok_or_else(|| invalid(format!("bad value '{text}' for '{}'", spec.name)))?;
        params.insert(spec.name.to_string(), value);
    }
    if let Some(extra) = segments.next() {
        return Err(invalid(format!("unexpected trailing segment '{extra}'")));
    }
    Ok((head, params))
}

fn conform_named(name: &str, schema: &[ParamSpec], params: &ParamMap) -> Result<ParamMap> {
    conform(schema, params)
        .map_err(|v| Error::InvalidName(format!("'{name}': {} {}", v.parameter, v.reason)))
}

/// Parse a canonical noise name back into a config with the given seed.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] for anything `canonical_name` would not
/// have produced.
pub fn parse_noise_name(name: &str, seed: Seed) -> Result<NoiseConfig> {
    let head = name.split('_').next().unwrap_or_default();
    let noise_type = NoiseType::ALL
        .into_iter()
        .find(|t| t.token() == head)
        .ok_or_else(|| Error::InvalidName(format!("'{name}': unknown noise token '{head}'")))?;
    let (_, params) = split_params(name, noise_type.schema())?;
    let params = conform_named(name, noise_type.schema(), &params)?;
    let config = NoiseConfig::new(noise_type, params, seed);
    ensure_canonical(name, &config)?;
    Ok(config)
}

/// Parse a canonical denoise name back into a config (without provenance).
///
/// # Errors
///
/// Returns [`Error::InvalidName`] for anything `canonical_name` would not
/// have produced.
pub fn parse_denoise_name(name: &str) -> Result<DenoiseConfig> {
    let head = name.split('_').next().unwrap_or_default();
    let algorithm = AlgorithmId::ALL
        .into_iter()
        .find(|a| a.as_str() == head)
        .ok_or_else(|| Error::InvalidName(format!("'{name}': unknown algorithm '{head}'")))?;
    let (_, params) = split_params(name, algorithm.schema())?;
    let params = conform_named(name, algorithm.schema(), &params)?;
    let config = DenoiseConfig::new(algorithm, params);
    ensure_canonical(name, &config)?;
    Ok(config)
}

/// Reject spellings that parse but are not the canonical form (`sigma010`).
fn ensure_canonical<C: CanonicalName>(name: &str, config: &C) -> Result<()> {
    let canonical = config.canonical_name();
    if canonical == name {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "'{name}' is not canonical (expected '{canonical}')"
        )))
    }
}
