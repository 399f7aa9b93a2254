//! Fan-out encryption engine.
//!
//! One logical message becomes an independent ciphertext per recipient
//! device. The engine resolves a session identifier per (user, device)
//! entry, asks the session store to establish-or-reuse the session from
//! the entry's claimed prekey, encrypts, and aggregates the results.
//!
//! # Isolation invariant
//!
//! One device's failure never prevents encryption for any other device
//! and never fails the overall call. A malformed prekey or a store
//! refusal yields a [`DevicePayload::Failed`] entry for that device; the
//! batch always completes with exactly one result per device entry.
//! The recipient of a sentinel payload will itself fail to decrypt it —
//! availability is traded for per-device delivery, deliberately, instead
//! of failing the whole send.
//!
//! # Concurrency
//!
//! Devices are independent, so per-device encryption runs as separately
//! spawned tasks joined into the aggregate. Same-identifier ordering is
//! the store's responsibility; the directory's inner keying already
//! deduplicates devices, so one batch never carries the same identifier
//! twice.
//!
//! There is no partial-cancellation contract: once invoked, the call
//! runs every entry to completion. An incomplete result set is incorrect
//! by definition.

use std::sync::Arc;

use quill_core::{SessionId, SessionStore};
use quill_proto::{DeviceDirectory, codec};
use tokio::task::JoinSet;

/// Well-known placeholder payload delivered when encryption for a
/// device fails.
///
/// The marker is wire-compatible with what remote clients already
/// expect; internally results stay typed and this string only appears
/// when rendering the transport form.
pub const FAILURE_SENTINEL: &str = "\u{1f4a3}";

/// Outcome of encrypting one message for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePayload {
    /// Transport-encoded ciphertext.
    Ciphertext(String),
    /// Encryption failed for this device; the sentinel goes out in the
    /// ciphertext's place.
    Failed,
}

impl DevicePayload {
    /// Render the payload in its transport form.
    pub fn as_transport_str(&self) -> &str {
        match self {
            Self::Ciphertext(text) => text,
            Self::Failed => FAILURE_SENTINEL,
        }
    }

    /// True when this payload is the failure sentinel.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Per-device result of a fan-out call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    /// Session the payload was (or would have been) encrypted under.
    pub session_id: SessionId,
    /// Ciphertext or failure sentinel.
    pub payload: DevicePayload,
}

/// Stateless fan-out over a device directory.
///
/// Owns no session state; it is a transformation over the immutable
/// directory and the store behind it.
pub struct FanoutEngine<S> {
    store: Arc<S>,
}

impl<S: SessionStore + 'static> FanoutEngine<S> {
    /// Create an engine over the given session store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Encrypt `plaintext` once per device entry in `directory`.
    ///
    /// Never fails at the batch level; the result count always equals
    /// the total number of device entries across all users. Per-device
    /// failures are logged and surface as [`DevicePayload::Failed`].
    pub async fn encrypt_for_devices(
        &self,
        plaintext: &[u8],
        directory: &DeviceDirectory,
    ) -> Vec<EncryptionResult> {
        let plaintext: Arc<[u8]> = Arc::from(plaintext);

        let mut tasks = JoinSet::new();
        for (user, device, prekey) in directory.iter_devices() {
            let session_id = SessionId::for_device(user, device);
            let store = Arc::clone(&self.store);
            let key = prekey.key.clone();
            let plaintext = Arc::clone(&plaintext);

            tasks.spawn(async move {
                let payload = encrypt_device(store.as_ref(), &session_id, &key, &plaintext).await;
                EncryptionResult { session_id, payload }
            });
        }

        let expected = directory.device_count();
        let mut results = Vec::with_capacity(expected);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // A panicked task would break the one-result-per-device
                // contract; encrypt_device is total, so this only fires
                // on runtime shutdown. Nothing sensible to attribute it
                // to, so it is logged and the batch continues.
                Err(e) => tracing::error!(error = %e, "fan-out task failed to join"),
            }
        }

        debug_assert_eq!(results.len(), expected);
        results
    }
}

/// Encrypt for a single device. Total: every failure path becomes
/// [`DevicePayload::Failed`].
async fn encrypt_device<S: SessionStore>(
    store: &S,
    session_id: &SessionId,
    encoded_key: &str,
    plaintext: &[u8],
) -> DevicePayload {
    let bundle = match codec::decode(encoded_key) {
        Ok(bundle) => bundle,
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "prekey decode failed");
            return DevicePayload::Failed;
        },
    };

    match store.encrypt(session_id, &bundle, plaintext).await {
        Ok(ciphertext) => DevicePayload::Ciphertext(codec::encode(&ciphertext)),
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "device encryption failed");
            DevicePayload::Failed
        },
    }
}
