//! Test harness for the Quill SDK.
//!
//! Provides deterministic entropy and builders that mint valid (and
//! deliberately corrupt) device directories against the in-memory
//! session store, so integration tests exercise the full path from
//! claimed prekey to sealed ciphertext without a network.

use std::sync::Mutex;

use quill_box::MemoryBox;
use quill_core::{Entropy, EntropyError, SessionStore, StoreError};
use quill_proto::{DeviceDirectory, Prekey};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Deterministic entropy for reproducible tests.
///
/// Given the same seed, every draw produces the same byte sequence. Log
/// the seed when a failure needs reproducing.
pub struct SeededEntropy {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededEntropy {
    /// Create a seeded source.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)) }
    }
}

impl Entropy for SeededEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| EntropyError { reason: format!("rng lock poisoned: {e}") })?;
        rng.fill_bytes(buf);
        Ok(())
    }
}

/// Mint a directory of valid claimed prekeys, one per device, with ids
/// assigned sequentially from `start_id`.
///
/// The prekeys are generated by `minter`, so any box can later establish
/// a matching inbound session from the same material.
///
/// # Errors
///
/// Propagates prekey generation failure from the minting store.
pub async fn claim_directory<E: Entropy + 'static>(
    minter: &MemoryBox<E>,
    users: &[(&str, &[&str])],
    start_id: u16,
) -> Result<DeviceDirectory, StoreError> {
    let mut directory = DeviceDirectory::new();
    let mut id = start_id;
    for (user, devices) in users {
        for device in *devices {
            let material = minter.new_prekey(id).await?;
            directory.insert(*user, *device, Prekey::from_material(id, &material));
            id += 1;
        }
    }
    Ok(directory)
}

/// A prekey whose key field is not valid transport text.
#[must_use]
pub fn corrupt_prekey(id: u16) -> Prekey {
    Prekey { id, key: "¬ not transport text ¬".to_string() }
}
