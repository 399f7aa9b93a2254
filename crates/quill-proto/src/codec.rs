//! Transport text codec.
//!
//! Binary material crosses the backend's JSON APIs as standard base64
//! (with padding). Decoding is fallible and the error is typed so that
//! callers can decide locally whether a malformed entry is fatal: the
//! fan-out engine recovers per device, every other caller propagates.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

/// Failure decoding transport-encoded binary material.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The text is not valid base64.
    #[error("malformed transport encoding: {0}")]
    Malformed(#[from] base64::DecodeError),
}

/// Encode binary material into its transport text form.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode transport text back into binary material.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when `text` is not valid base64.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encode_known_vector() {
        assert_eq!(encode(b"Hello"), "SGVsbG8=");
    }

    #[test]
    fn decode_known_vector() {
        assert_eq!(decode("SGVsbG8=").unwrap(), b"Hello");
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode("this is not base64!!!");
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_empty_is_empty() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    proptest! {
        #[test]
        fn round_trip(material in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode(&material);
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, material);
        }
    }
}
