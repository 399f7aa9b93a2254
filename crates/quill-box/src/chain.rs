//! Symmetric message chains.
//!
//! Each session holds two chains seeded from the same prekey material:
//! one for sending, one for receiving. A chain derives one message key
//! per generation and advances by HMAC, deleting the old chain key, so
//! a captured state cannot recover earlier message keys.
//!
//! Messages are AEAD-sealed with XChaCha20-Poly1305 under
//! caller-supplied associated data, framed as
//! `generation ‖ nonce ‖ ciphertext`.
//!
//! # Invariants
//!
//! - The receive cursor only moves forward. A ciphertext ahead of the
//!   cursor fast-forwards it, discarding the skipped message keys; a
//!   ciphertext behind the cursor is rejected. Skipped keys are never
//!   buffered, so a message processed out of arrival order is lost for
//!   good.
//! - A message key is used exactly once and dropped after use.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Chain and message key size in bytes.
pub const KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Minimum sealed message length: generation word, nonce, AEAD tag.
const MIN_MESSAGE_LEN: usize = 4 + NONCE_SIZE + 16;

/// Upper bound on how far a single ciphertext may fast-forward the
/// receive cursor. Bounds the work an attacker can force with a forged
/// generation word.
const FAST_FORWARD_LIMIT: u32 = 1024;

/// Domain separation for deriving the initial chain key from a seed.
const CHAIN_INFO: &[u8] = b"quill box chain v1";

/// HMAC input yielding the message key for the current generation.
const MESSAGE_KEY_BYTE: [u8; 1] = [0x01];

/// HMAC input yielding the next chain key.
const CHAIN_KEY_BYTE: [u8; 1] = [0x02];

/// Failures inside a session chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Sealed message shorter than the fixed framing.
    #[error("sealed message truncated: {len} bytes")]
    Truncated {
        /// Observed message length.
        len: usize,
    },

    /// Ciphertext generation is behind the receive cursor: its message
    /// key was already used or discarded.
    #[error("chain desync: cursor at generation {expected}, got {got}")]
    Desync {
        /// Next generation the receive chain accepts.
        expected: u32,
        /// Generation carried by the ciphertext.
        got: u32,
    },

    /// Ciphertext generation is implausibly far ahead of the cursor.
    #[error("generation {got} exceeds fast-forward limit from {expected}")]
    SkipLimit {
        /// Next generation the receive chain accepts.
        expected: u32,
        /// Generation carried by the ciphertext.
        got: u32,
    },

    /// AEAD open failed: tampered ciphertext or wrong key.
    #[error("authentication failure")]
    Authentication,

    /// Key derivation produced no output (wrong digest parameters).
    #[error("key derivation failure")]
    Kdf,
}

/// One direction of a session chain.
#[derive(Clone)]
struct Cursor {
    chain_key: [u8; KEY_SIZE],
    generation: u32,
}

impl Cursor {
    /// Derive the message key for the current generation and advance,
    /// dropping the old chain key.
    fn step(&mut self) -> Result<(u32, [u8; KEY_SIZE]), ChainError> {
        let message_key = hmac_derive(&self.chain_key, &MESSAGE_KEY_BYTE)?;
        let next = hmac_derive(&self.chain_key, &CHAIN_KEY_BYTE)?;

        let generation = self.generation;
        self.chain_key = next;
        self.generation = self.generation.wrapping_add(1);

        Ok((generation, message_key))
    }
}

/// Ratchet state for one session.
///
/// Both peers derive identical initial state from the prekey seed; the
/// sender's send cursor mirrors the receiver's receive cursor.
pub struct Chain {
    send: Cursor,
    recv: Cursor,
}

impl Chain {
    /// Initialize a chain from prekey seed material.
    pub fn from_seed(seed: &[u8]) -> Result<Self, ChainError> {
        let hk = Hkdf::<Sha256>::new(None, seed);
        let mut chain_key = [0u8; KEY_SIZE];
        hk.expand(CHAIN_INFO, &mut chain_key).map_err(|_| ChainError::Kdf)?;

        let cursor = Cursor { chain_key, generation: 0 };
        Ok(Self { send: cursor.clone(), recv: cursor })
    }

    /// Seal `plaintext` under the next send generation.
    ///
    /// `nonce` must be fresh random bytes; `aad` binds the ciphertext to
    /// its session.
    pub fn seal(
        &mut self,
        plaintext: &[u8],
        nonce: [u8; NONCE_SIZE],
        aad: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let (generation, message_key) = self.send.step()?;

        let cipher =
            XChaCha20Poly1305::new_from_slice(&message_key).map_err(|_| ChainError::Kdf)?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| ChainError::Authentication)?;

        let mut sealed = Vec::with_capacity(4 + NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&generation.to_be_bytes());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a sealed message at or ahead of the receive cursor.
    pub fn open(&mut self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, ChainError> {
        if sealed.len() < MIN_MESSAGE_LEN {
            return Err(ChainError::Truncated { len: sealed.len() });
        }

        let generation = u32::from_be_bytes(
            sealed[0..4].try_into().map_err(|_| ChainError::Truncated { len: sealed.len() })?,
        );
        let expected = self.recv.generation;
        if generation < expected {
            return Err(ChainError::Desync { expected, got: generation });
        }
        if generation - expected > FAST_FORWARD_LIMIT {
            return Err(ChainError::SkipLimit { expected, got: generation });
        }

        let nonce = &sealed[4..4 + NONCE_SIZE];
        let ciphertext = &sealed[4 + NONCE_SIZE..];

        // Advance a scratch cursor; commit only after the AEAD check
        // passes, so a forged generation word cannot burn real state.
        let mut scratch = self.recv.clone();
        let mut message_key = scratch.step()?.1;
        while scratch.generation <= generation {
            message_key = scratch.step()?.1;
        }

        let cipher =
            XChaCha20Poly1305::new_from_slice(&message_key).map_err(|_| ChainError::Kdf)?;
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| ChainError::Authentication)?;

        self.recv = scratch;
        Ok(plaintext)
    }
}

fn hmac_derive(key: &[u8; KEY_SIZE], input: &[u8]) -> Result<[u8; KEY_SIZE], ChainError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| ChainError::Kdf)?;
    mac.update(input);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&digest);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const AAD: &[u8] = b"prekey-0";

    fn pair() -> (Chain, Chain) {
        let seed = [7u8; 32];
        (Chain::from_seed(&seed).unwrap(), Chain::from_seed(&seed).unwrap())
    }

    #[test]
    fn seal_open_round_trip() {
        let (mut sender, mut receiver) = pair();

        let sealed = sender.seal(b"hi", [1u8; NONCE_SIZE], AAD).unwrap();
        let plaintext = receiver.open(&sealed, AAD).unwrap();

        assert_eq!(plaintext, b"hi");
    }

    #[test]
    fn in_order_messages_open() {
        let (mut sender, mut receiver) = pair();

        let first = sender.seal(b"one", [1u8; NONCE_SIZE], AAD).unwrap();
        let second = sender.seal(b"two", [2u8; NONCE_SIZE], AAD).unwrap();

        assert_eq!(receiver.open(&first, AAD).unwrap(), b"one");
        assert_eq!(receiver.open(&second, AAD).unwrap(), b"two");
    }

    #[test]
    fn swapped_order_loses_the_earlier_message() {
        let (mut sender, mut receiver) = pair();

        let first = sender.seal(b"one", [1u8; NONCE_SIZE], AAD).unwrap();
        let second = sender.seal(b"two", [2u8; NONCE_SIZE], AAD).unwrap();

        // Processing the later message first fast-forwards the cursor…
        assert_eq!(receiver.open(&second, AAD).unwrap(), b"two");

        // …so the earlier message's key is gone.
        let err = receiver.open(&first, AAD).unwrap_err();
        assert_eq!(err, ChainError::Desync { expected: 2, got: 0 });
    }

    #[test]
    fn forged_generation_beyond_limit_rejected() {
        let (mut sender, mut receiver) = pair();

        let mut sealed = sender.seal(b"hi", [1u8; NONCE_SIZE], AAD).unwrap();
        sealed[0..4].copy_from_slice(&u32::MAX.to_be_bytes());

        let err = receiver.open(&sealed, AAD).unwrap_err();
        assert_eq!(err, ChainError::SkipLimit { expected: 0, got: u32::MAX });
    }

    #[test]
    fn tampered_ciphertext_rejected_without_burning_generation() {
        let (mut sender, mut receiver) = pair();

        let mut sealed = sender.seal(b"hi", [1u8; NONCE_SIZE], AAD).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert_eq!(receiver.open(&sealed, AAD).unwrap_err(), ChainError::Authentication);

        sealed[last] ^= 0xff;
        assert_eq!(receiver.open(&sealed, AAD).unwrap(), b"hi");
    }

    #[test]
    fn wrong_aad_rejected() {
        let (mut sender, mut receiver) = pair();

        let sealed = sender.seal(b"hi", [1u8; NONCE_SIZE], AAD).unwrap();
        let err = receiver.open(&sealed, b"prekey-9").unwrap_err();
        assert_eq!(err, ChainError::Authentication);
    }

    #[test]
    fn truncated_message_rejected() {
        let (_, mut receiver) = pair();
        let err = receiver.open(&[0u8; 10], AAD).unwrap_err();
        assert_eq!(err, ChainError::Truncated { len: 10 });
    }

    #[test]
    fn distinct_seeds_do_not_interoperate() {
        let mut sender = Chain::from_seed(&[1u8; 32]).unwrap();
        let mut receiver = Chain::from_seed(&[2u8; 32]).unwrap();

        let sealed = sender.seal(b"hi", [1u8; NONCE_SIZE], AAD).unwrap();
        assert_eq!(receiver.open(&sealed, AAD).unwrap_err(), ChainError::Authentication);
    }
}
