//! Cryptographic session store boundary.
//!
//! The store is the single owner of all ratchet state: nothing else in
//! the SDK mutates cryptographic material directly. Every method is a
//! suspension point; implementations may hit disk, IPC, or a hardware
//! keystore.
//!
//! # Concurrency
//!
//! Implementations must tolerate concurrent calls for distinct session
//! identifiers without interference, and must serialize calls for the
//! same identifier internally: ratchet state advances monotonically and
//! is not safe for concurrent mutation. The fan-out engine relies on
//! this when it encrypts for many devices at once.

use async_trait::async_trait;
use thiserror::Error;

use crate::session_id::SessionId;

/// Errors from the cryptographic session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session establishment from a prekey bundle failed (bundle
    /// rejected by the session library, store unavailable).
    #[error("establish failed for {session}: {reason}")]
    Establish {
        /// Session being established.
        session: SessionId,
        /// Description of the failure.
        reason: String,
    },

    /// Encryption under an established session failed.
    #[error("encrypt failed for {session}: {reason}")]
    Encrypt {
        /// Session the plaintext was encrypted under.
        session: SessionId,
        /// Description of the failure.
        reason: String,
    },

    /// Decryption of an inbound ciphertext failed: unknown session, bad
    /// ratchet state, or authentication failure.
    #[error("decrypt failed for {session}: {reason}")]
    Decrypt {
        /// Session the ciphertext was addressed to.
        session: SessionId,
        /// Description of the failure.
        reason: String,
    },

    /// Prekey generation failed: entropy source unavailable or store not
    /// initialized. There is no safe default prekey.
    #[error("prekey generation failed: {reason}")]
    PrekeyGeneration {
        /// Description of the failure.
        reason: String,
    },
}

impl StoreError {
    /// True when the error must fail its enclosing operation.
    ///
    /// Establish and encrypt failures are recovered per device inside
    /// the fan-out batch (a sentinel payload takes the ciphertext's
    /// place). Decrypt and prekey-generation failures always propagate:
    /// there is no safe sentinel plaintext and no safe default prekey.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Establish { .. } | Self::Encrypt { .. } => false,
            Self::Decrypt { .. } | Self::PrekeyGeneration { .. } => true,
        }
    }
}

/// Notification pushed by the session store when its one-time prekey
/// pool drops below the replenishment watermark.
///
/// Delivery is push-style over a channel handed out at store
/// construction; the prekey lifecycle manager holds the receiving end
/// for the lifetime of the store and never polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowPrekeyNotice {
    /// One-time prekeys still available in the pool.
    pub remaining: usize,
    /// Highest standard prekey id the store has issued so far. A
    /// replenishment batch continues the id sequence after this value.
    pub max_issued_id: u16,
}

/// Durable mapping from session identifier to ratchet state.
///
/// `quill-box` provides an in-memory implementation for tests and local
/// development; production deployments adapt a vetted ratchet library
/// behind this trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Establish a session for `session` from a decoded prekey bundle.
    ///
    /// A no-op if the session already exists: establishment is
    /// first-write-wins, matching the one-time nature of the claimed
    /// prekey.
    async fn establish(&self, session: &SessionId, bundle: &[u8]) -> Result<(), StoreError>;

    /// Encrypt `plaintext` for `session`, establishing the session from
    /// `bundle` first when it does not exist yet.
    async fn encrypt(
        &self,
        session: &SessionId,
        bundle: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, StoreError>;

    /// Decrypt an inbound ciphertext under an existing session.
    ///
    /// Ciphertexts for the same session must be submitted in arrival
    /// order; the ratchet advances monotonically and an out-of-order
    /// ciphertext is rejected, not reordered.
    async fn decrypt(&self, session: &SessionId, ciphertext: &[u8])
    -> Result<Vec<u8>, StoreError>;

    /// Whether ratchet state exists for `session`.
    async fn has_session(&self, session: &SessionId) -> bool;

    /// Generate a fresh one-time prekey under `id` and return its
    /// serialized public material, ready for transport encoding.
    async fn new_prekey(&self, id: u16) -> Result<Vec<u8>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establish_failure_is_recoverable() {
        let err = StoreError::Establish {
            session: SessionId::for_device("alice", "dev1"),
            reason: "bundle rejected".to_string(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn encrypt_failure_is_recoverable() {
        let err = StoreError::Encrypt {
            session: SessionId::for_device("alice", "dev1"),
            reason: "ratchet stepped out".to_string(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn decrypt_failure_is_fatal() {
        let err = StoreError::Decrypt {
            session: SessionId::for_device("alice", "dev1"),
            reason: "unknown session".to_string(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn prekey_generation_failure_is_fatal() {
        let err = StoreError::PrekeyGeneration { reason: "entropy unavailable".to_string() };
        assert!(err.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = StoreError::Decrypt {
            session: SessionId::for_device("alice", "dev1"),
            reason: "bad mac".to_string(),
        };
        assert_eq!(err.to_string(), "decrypt failed for alice@dev1: bad mac");
    }
}
