//! Deterministic RNG provider
//!
//! Every noise realization comes from its own stream, derived from the run
//! seed plus a tuple of stable discriminators (image identity, noise type,
//! canonical parameter string). No stream depends on what ran before it, so a
//! cell re-run on its own, or on another thread, reproduces the exact noise it
//! got inside a full sweep.
//!
//! ## Derivation
//!
//! ```text
//! sub_seed = SHA-256( seed.to_le_bytes()
//!                     ‖ for each discriminator: len(d).to_le_bytes() ‖ d )
//! stream   = ChaCha8Rng::from_seed(sub_seed)
//! ```
//!
//! Length prefixes keep `("ab", "c")` and `("a", "bc")` apart. `ChaCha8Rng` is
//! specified by its algorithm, so streams are identical across platforms and
//! crate upgrades, unlike `StdRng`.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Run-level random seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(u64);

impl Seed {
    /// Wrap a raw seed.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw seed value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Parse a seed from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSeed`] unless the value is a non-negative integer
    /// that fits in a `u64`. Floats are rejected even when integral (`42.0`),
    /// since they may have already lost precision.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().map(Self).ok_or_else(|| {
                Error::InvalidSeed(format!("{n} is not a non-negative 64-bit integer"))
            }),
            other => Err(Error::InvalidSeed(format!(
                "expected an integer, found {other}"
            ))),
        }
    }

    /// Parse a seed from text (CLI flags, canonical strings).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSeed`] if the text is not a `u64`.
    pub fn parse(text: &str) -> Result<Self> {
        text.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| Error::InvalidSeed(format!("'{text}': {e}")))
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self(42)
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Derive an independent stream for `(seed, discriminators)`.
#[must_use]
pub fn derive<S: AsRef<str>>(seed: Seed, discriminators: &[S]) -> RandomStream {
    let mut hasher = Sha256::new();
    hasher.update(seed.0.to_le_bytes());
    for d in discriminators {
        let bytes = d.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    let sub_seed: [u8; 32] = hasher.finalize().into();
    RandomStream {
        sub_seed,
        rng: ChaCha8Rng::from_seed(sub_seed),
    }
}

/// Reproducible pseudo-random stream handed to noise models.
#[derive(Debug, Clone)]
pub struct RandomStream {
    sub_seed: [u8; 32],
    rng: ChaCha8Rng,
}

impl RandomStream {
    /// Snapshot of where this stream started and how far it has advanced.
    #[must_use]
    pub fn state(&self) -> StreamState {
        StreamState {
            sub_seed: hex(&self.sub_seed),
            word_pos: u64::try_from(self.rng.get_word_pos()).unwrap_or(u64::MAX),
        }
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst);
    }
}

/// Serializable stream position, recorded alongside noise outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Hex-encoded 32-byte sub-seed
    pub sub_seed: String,
    /// 32-bit words consumed so far (saturates at `u64::MAX`)
    pub word_pos: u64,
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
