//! Client registration payload.
//!
//! A device registers once per login: signaling keys, the last-resort
//! prekey, the standard prekey batch, and device metadata are bundled
//! into one record, submitted to the external registration collaborator,
//! and held immutable for the session's lifetime.

use hmac::{Hmac, Mac};
use quill_core::{Entropy, SessionStore};
use quill_proto::{Prekey, codec};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::ClientError, prekeys::PrekeyLifecycle};

/// Symmetric keys for encrypted push notifications.
///
/// Both fields carry the same derived value; the backend accepts that
/// and remote peers depend on it, so it is preserved rather than fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingKeys {
    /// Transport-encoded encryption key.
    pub enckey: String,
    /// Transport-encoded MAC key.
    pub mackey: String,
}

/// Derive fresh signaling keys from the given entropy source.
///
/// HMAC-SHA256 over 32 fresh random bytes, keyed with SHA-256("salt").
///
/// # Errors
///
/// Propagates entropy failure; predictable signaling keys are not an
/// acceptable fallback.
pub fn generate_signaling_keys(entropy: &dyn Entropy) -> Result<SignalingKeys, ClientError> {
    let random = entropy.seed32()?;
    let salt = Sha256::digest(b"salt");

    let mut mac = Hmac::<Sha256>::new_from_slice(&salt)
        .map_err(|e| ClientError::KeyDerivation { reason: e.to_string() })?;
    mac.update(&random);
    let derived = mac.finalize().into_bytes();

    let key = codec::encode(&derived);
    Ok(SignalingKeys { enckey: key.clone(), mackey: key })
}

/// Descriptive device metadata submitted at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// Device class (`desktop`, `phone`, …).
    pub class: String,
    /// Human-readable device label.
    pub label: String,
    /// Device model string.
    pub model: String,
    /// Registration type (`temporary` or `permanent`).
    #[serde(rename = "type")]
    pub device_type: String,
    /// Cookie identifying this registration to the backend.
    pub cookie: String,
}

impl DeviceMetadata {
    /// Metadata for a headless bot-style client.
    pub fn bot(cookie: impl Into<String>) -> Self {
        Self {
            class: "desktop".to_string(),
            label: "bot".to_string(),
            model: "quill".to_string(),
            device_type: "temporary".to_string(),
            cookie: cookie.into(),
        }
    }
}

/// Everything the registration collaborator needs to register this
/// device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRegistrationInfo {
    /// The non-expiring fallback prekey.
    #[serde(rename = "lastkey")]
    pub last_resort: Prekey,
    /// Standard one-time prekeys.
    pub prekeys: Vec<Prekey>,
    /// Push notification keys.
    #[serde(rename = "sigkeys")]
    pub signaling_keys: SignalingKeys,
    /// Device description.
    #[serde(flatten)]
    pub metadata: DeviceMetadata,
}

/// Assemble a registration record: signaling keys, last-resort prekey,
/// and a standard batch of `batch_size` prekeys.
///
/// # Errors
///
/// Any generation failure is fatal to the registration and propagates;
/// a partially keyed registration must never be submitted.
pub async fn build_registration_info<S: SessionStore>(
    lifecycle: &PrekeyLifecycle<S>,
    entropy: &dyn Entropy,
    metadata: DeviceMetadata,
    batch_size: u16,
) -> Result<ClientRegistrationInfo, ClientError> {
    tracing::debug!("creating signaling keys");
    let signaling_keys = generate_signaling_keys(entropy)?;

    let last_resort = lifecycle.create_last_resort().await?;
    tracing::info!(id = last_resort.id, "created last-resort prekey");

    let prekeys = lifecycle.create_batch(batch_size).await?;
    tracing::info!(count = prekeys.len(), "created standard prekeys");

    Ok(ClientRegistrationInfo { last_resort, prekeys, signaling_keys, metadata })
}
