//! Entropy capability.
//!
//! Anything that generates key material takes an explicit [`Entropy`]
//! reference instead of reaching for a global RNG. Production code
//! injects [`SystemEntropy`]; the test harness injects a seeded source
//! so key generation is reproducible.
//!
//! # Security
//!
//! Production implementations MUST draw from a cryptographically secure
//! source (the OS entropy pool). Failure to produce entropy is an error,
//! not a degraded fill: a predictable prekey is worse than no prekey.

use thiserror::Error;

/// The entropy source could not produce random bytes.
#[derive(Debug, Error)]
#[error("entropy source unavailable: {reason}")]
pub struct EntropyError {
    /// Description of the failure.
    pub reason: String,
}

/// Source of cryptographically secure randomness.
pub trait Entropy: Send + Sync {
    /// Fill `buf` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError`] when the underlying source is
    /// unavailable. Callers must propagate this; there is no safe
    /// fallback fill.
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError>;

    /// Draw a 32-byte seed.
    fn seed32(&self) -> Result<[u8; 32], EntropyError> {
        let mut seed = [0u8; 32];
        self.fill(&mut seed)?;
        Ok(seed)
    }
}

/// Production entropy backed by the OS pool via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl SystemEntropy {
    /// Create a new system entropy source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Entropy for SystemEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buf).map_err(|e| EntropyError { reason: e.to_string() })
    }
}
