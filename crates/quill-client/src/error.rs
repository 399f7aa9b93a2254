//! Client error types.

use quill_core::{EntropyError, StoreError};
use quill_proto::DecodeError;
use thiserror::Error;

/// Errors from client operations.
///
/// Note the asymmetry between the two message paths: encrypt-side
/// failures never surface here — the fan-out engine converts them to
/// per-device sentinel results — while decrypt-side failures always do,
/// because there is no safe placeholder plaintext.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Inbound envelope carried no ciphertext. Raised before any
    /// decoding is attempted.
    #[error("ciphertext is missing")]
    MissingCiphertext,

    /// Transport decoding failed outside the fan-out path.
    #[error("transport decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The session store refused an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The entropy source could not produce key material.
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// Deriving the signaling keys failed.
    #[error("signaling key derivation failed: {reason}")]
    KeyDerivation {
        /// Description of the failure.
        reason: String,
    },

    /// The standard prekey id sequence ran into the reserved last-resort
    /// id. The device must re-register before issuing more prekeys.
    #[error("prekey id space exhausted at {next}")]
    PrekeyIdsExhausted {
        /// Next id the counter would have issued.
        next: u32,
    },
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors indicate corrupted session state or an unusable key
    /// source; retrying the operation cannot help. Transient errors are
    /// per-input: skip the offending envelope or event and continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Per-envelope input problems; the client keeps running.
            Self::MissingCiphertext | Self::Decode(_) => false,

            // Delegate to the store's classification.
            Self::Store(e) => e.is_fatal(),

            // No entropy and no id space mean no more key material.
            Self::Entropy(_) | Self::KeyDerivation { .. } | Self::PrekeyIdsExhausted { .. } => {
                true
            },
        }
    }
}
