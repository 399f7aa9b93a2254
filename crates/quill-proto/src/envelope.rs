//! Inbound message envelope.
//!
//! The realtime transport delivers encrypted message events with the
//! wire shape `{"from": <user>, "data": {"sender": <device>, "text":
//! <ciphertext>}}`. The `text` field may be absent; the decryption
//! resolver validates its presence before attempting any decoding.

use serde::{Deserialize, Serialize};

use crate::directory::{DeviceId, UserId};

/// Payload half of an inbound message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeData {
    /// Device id of the sending client.
    pub sender: DeviceId,
    /// Transport-encoded ciphertext. Absent when the event carries no
    /// message body.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
}

/// An inbound encrypted message event.
///
/// `(from, data.sender)` identifies the originating device and therefore
/// the cryptographic session the ciphertext belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// User id of the sender.
    pub from: UserId,
    /// Sender device and ciphertext.
    pub data: EnvelopeData,
}

impl InboundEnvelope {
    /// Build an envelope from its parts.
    pub fn new(
        from: impl Into<UserId>,
        sender: impl Into<DeviceId>,
        text: Option<String>,
    ) -> Self {
        Self { from: from.into(), data: EnvelopeData { sender: sender.into(), text } }
    }

    /// The transport-encoded ciphertext, if the event carries one.
    pub fn ciphertext(&self) -> Option<&str> {
        self.data.text.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_event() {
        let json = r#"{"from":"alice","data":{"sender":"dev1","text":"b2s="}}"#;
        let envelope: InboundEnvelope = serde_json::from_str(json).unwrap();

        assert_eq!(envelope.from, "alice");
        assert_eq!(envelope.data.sender, "dev1");
        assert_eq!(envelope.ciphertext(), Some("b2s="));
    }

    #[test]
    fn missing_text_parses_as_none() {
        let json = r#"{"from":"alice","data":{"sender":"dev1"}}"#;
        let envelope: InboundEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.ciphertext(), None);
    }

    #[test]
    fn none_text_is_omitted_on_serialize() {
        let envelope = InboundEnvelope::new("alice", "dev1", None);
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"from":"alice","data":{"sender":"dev1"}}"#);
    }
}
