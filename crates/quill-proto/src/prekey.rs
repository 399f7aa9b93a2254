//! Prekey transport form.
//!
//! A prekey is a one-time-use public key bundle a device publishes so
//! that peers can establish a session with it without interaction. On
//! the wire it is a `{id, key}` JSON object; the `key` field is the
//! base64 transport encoding of the serialized public material.

use serde::{Deserialize, Serialize};

use crate::codec::{self, DecodeError};

/// Reserved id of the last-resort prekey.
///
/// The last-resort key is a non-expiring fallback served when a device's
/// one-time prekey pool is exhausted. It always occupies the maximum
/// representable id; standard prekeys never use it.
pub const LAST_RESORT_PREKEY_ID: u16 = u16::MAX;

/// A prekey in transport form.
///
/// The same shape travels in both directions: uploaded to the backend
/// directory after local generation, and claimed from it inside a
/// [`DeviceDirectory`](crate::DeviceDirectory) entry when preparing a
/// send. Immutable once issued; a superseded prekey is replaced, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prekey {
    /// Numeric prekey identifier (0–65535).
    pub id: u16,
    /// Transport-encoded public key material.
    pub key: String,
}

impl Prekey {
    /// Wrap freshly generated key material into transport form.
    pub fn from_material(id: u16, material: &[u8]) -> Self {
        Self { id, key: codec::encode(material) }
    }

    /// Decode the key material back into the binary form the session
    /// store expects.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the entry is malformed. Callers in
    /// the fan-out path recover from this per device; everyone else
    /// treats it as a hard failure.
    pub fn decode_key(&self) -> Result<Vec<u8>, DecodeError> {
        codec::decode(&self.key)
    }

    /// Whether this is the reserved last-resort prekey.
    pub fn is_last_resort(&self) -> bool {
        self.id == LAST_RESORT_PREKEY_ID
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn from_material_round_trips() {
        let prekey = Prekey::from_material(7, b"public material");
        assert_eq!(prekey.id, 7);
        assert_eq!(prekey.decode_key().unwrap(), b"public material");
    }

    #[test]
    fn last_resort_id_is_max() {
        let prekey = Prekey::from_material(LAST_RESORT_PREKEY_ID, b"fallback");
        assert!(prekey.is_last_resort());
        assert_eq!(prekey.id, 65535);
    }

    #[test]
    fn standard_prekey_is_not_last_resort() {
        assert!(!Prekey::from_material(0, b"k").is_last_resort());
    }

    #[test]
    fn corrupt_key_fails_decode() {
        let prekey = Prekey { id: 3, key: "not base64 at all!".to_string() };
        assert!(prekey.decode_key().is_err());
    }

    #[test]
    fn wire_shape() {
        let prekey = Prekey::from_material(1, b"Hello");
        let json = serde_json::to_string(&prekey).unwrap();
        assert_eq!(json, r#"{"id":1,"key":"SGVsbG8="}"#);

        let parsed: Prekey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, prekey);
    }
}
