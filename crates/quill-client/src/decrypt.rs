//! Decryption resolver for inbound envelopes.
//!
//! The mirror of the fan-out path with the opposite failure policy:
//! encrypt degrades gracefully per device, decrypt fails loudly. There
//! is no sentinel plaintext — a ciphertext that cannot be decrypted is
//! an error the caller must see.
//!
//! Envelopes for the same session must be resolved in arrival order;
//! the ratchet advances monotonically and an out-of-order ciphertext is
//! rejected by the store. Distinct sessions are independent and may be
//! resolved in parallel.

use std::sync::Arc;

use quill_core::{SessionId, SessionStore};
use quill_proto::{InboundEnvelope, codec};

use crate::error::ClientError;

/// Resolves inbound envelopes to plaintext via the session store.
pub struct DecryptionResolver<S> {
    store: Arc<S>,
}

impl<S: SessionStore> DecryptionResolver<S> {
    /// Create a resolver over the given session store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Decrypt the ciphertext carried by `envelope`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::MissingCiphertext`] when the envelope has no
    ///   `text` field; checked before any decoding is attempted.
    /// - [`ClientError::Decode`] when the ciphertext is not valid
    ///   transport text.
    /// - [`ClientError::Store`] when the store rejects the ciphertext
    ///   (unknown session, ratchet desync, authentication failure).
    pub async fn decrypt_envelope(
        &self,
        envelope: &InboundEnvelope,
    ) -> Result<Vec<u8>, ClientError> {
        let Some(ciphertext) = envelope.ciphertext() else {
            return Err(ClientError::MissingCiphertext);
        };

        let message = codec::decode(ciphertext)?;
        let session_id = SessionId::for_device(&envelope.from, &envelope.data.sender);

        tracing::debug!(session = %session_id, "decrypting inbound envelope");
        Ok(self.store.decrypt(&session_id, &message).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use quill_core::StoreError;

    use super::*;

    /// Test double: upper-cases "plaintext" and counts decrypt calls so
    /// tests can assert the store was never reached.
    struct TestStore {
        calls: AtomicUsize,
    }

    impl TestStore {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SessionStore for TestStore {
        async fn establish(&self, _session: &SessionId, _bundle: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn encrypt(
            &self,
            _session: &SessionId,
            _bundle: &[u8],
            plaintext: &[u8],
        ) -> Result<Vec<u8>, StoreError> {
            Ok(plaintext.to_vec())
        }

        async fn decrypt(
            &self,
            session: &SessionId,
            ciphertext: &[u8],
        ) -> Result<Vec<u8>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ciphertext == b"poison" {
                return Err(StoreError::Decrypt {
                    session: session.clone(),
                    reason: "authentication failure".to_string(),
                });
            }
            Ok(ciphertext.to_ascii_uppercase())
        }

        async fn has_session(&self, _session: &SessionId) -> bool {
            true
        }

        async fn new_prekey(&self, _id: u16) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::PrekeyGeneration { reason: "not supported".to_string() })
        }
    }

    #[tokio::test]
    async fn resolves_session_and_decrypts() {
        let resolver = DecryptionResolver::new(Arc::new(TestStore::new()));
        let envelope = InboundEnvelope::new("alice", "dev1", Some(codec::encode(b"hello")));

        let plaintext = resolver.decrypt_envelope(&envelope).await.unwrap();
        assert_eq!(plaintext, b"HELLO");
    }

    #[tokio::test]
    async fn missing_ciphertext_fails_before_store() {
        let store = Arc::new(TestStore::new());
        let resolver = DecryptionResolver::new(Arc::clone(&store));
        let envelope = InboundEnvelope::new("alice", "dev1", None);

        let err = resolver.decrypt_envelope(&envelope).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingCiphertext));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0, "store must not be reached");
    }

    #[tokio::test]
    async fn malformed_ciphertext_fails_before_store() {
        let store = Arc::new(TestStore::new());
        let resolver = DecryptionResolver::new(Arc::clone(&store));
        let envelope = InboundEnvelope::new("alice", "dev1", Some("¬base64¬".to_string()));

        let err = resolver.decrypt_envelope(&envelope).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let resolver = DecryptionResolver::new(Arc::new(TestStore::new()));
        let envelope = InboundEnvelope::new("alice", "dev1", Some(codec::encode(b"poison")));

        let err = resolver.decrypt_envelope(&envelope).await.unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Decrypt { .. })));
        assert!(err.is_fatal());
    }
}
