//! In-memory cryptographic session store.
//!
//! [`MemoryBox`] implements the [`SessionStore`] boundary for tests and
//! local development. Sessions are symmetric chains derived
//! deterministically from prekey seed material — both peers of a session
//! derive identical state from the same bundle, so there is no real key
//! agreement here. Production deployments adapt a vetted ratchet library
//! behind the same trait; this box exists so the engine above it can be
//! exercised without one.
//!
//! What the box does model faithfully:
//!
//! - establish-or-reuse semantics keyed by session identifier
//! - strict per-session ordering (out-of-order decrypt fails like a
//!   desynced ratchet)
//! - per-session mutual exclusion with full concurrency across distinct
//!   sessions
//! - a one-time-prekey pool that shrinks as inbound sessions are
//!   established and pushes a [`LowPrekeyNotice`] when it crosses the
//!   low watermark

mod chain;

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use quill_core::{Entropy, LowPrekeyNotice, SessionId, SessionStore, StoreError};
use quill_proto::LAST_RESORT_PREKEY_ID;
use tokio::sync::{Mutex, mpsc};

pub use crate::chain::{Chain, ChainError, KEY_SIZE, NONCE_SIZE};

/// Serialized prekey material layout: id word followed by the seed.
const PREKEY_MATERIAL_LEN: usize = 2 + KEY_SIZE;

/// Tuning for the in-memory box.
#[derive(Debug, Clone, Copy)]
pub struct BoxConfig {
    /// Pool size below which a [`LowPrekeyNotice`] is pushed.
    pub low_watermark: usize,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self { low_watermark: 5 }
    }
}

/// Per-session state: the chain plus the associated data that binds
/// ciphertexts to the originating prekey. The prekey id is the one name
/// both peers share (each side sees the session under its own
/// identifier).
struct SessionState {
    chain: chain::Chain,
    aad: [u8; 2],
}

/// One-time-prekey pool bookkeeping.
struct PoolState {
    /// Ids published and not yet consumed by an inbound establishment.
    outstanding: BTreeSet<u16>,
    /// Highest standard prekey id issued so far.
    max_issued: u16,
    /// Latch so one watermark crossing produces one notice.
    notified: bool,
}

/// In-memory [`SessionStore`] implementation.
pub struct MemoryBox<E: Entropy> {
    entropy: E,
    low_watermark: usize,
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<SessionState>>>>,
    pool: Mutex<PoolState>,
    notices: mpsc::UnboundedSender<LowPrekeyNotice>,
}

impl<E: Entropy> MemoryBox<E> {
    /// Create a box with default tuning.
    ///
    /// Returns the box together with the receiving end of its low-prekey
    /// notice channel; hand the receiver to the prekey lifecycle manager
    /// at construction time.
    pub fn new(entropy: E) -> (Self, mpsc::UnboundedReceiver<LowPrekeyNotice>) {
        Self::with_config(entropy, BoxConfig::default())
    }

    /// Create a box with explicit tuning.
    pub fn with_config(
        entropy: E,
        config: BoxConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LowPrekeyNotice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let store = Self {
            entropy,
            low_watermark: config.low_watermark,
            sessions: Mutex::new(HashMap::new()),
            pool: Mutex::new(PoolState {
                outstanding: BTreeSet::new(),
                max_issued: 0,
                notified: false,
            }),
            notices,
        };
        (store, receiver)
    }

    /// Number of published one-time prekeys not yet consumed.
    pub async fn outstanding_prekeys(&self) -> usize {
        self.pool.lock().await.outstanding.len()
    }

    /// Number of established sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Parse serialized prekey material into its id and seed.
    fn parse_bundle(
        session: &SessionId,
        bundle: &[u8],
    ) -> Result<(u16, [u8; KEY_SIZE]), StoreError> {
        if bundle.len() != PREKEY_MATERIAL_LEN {
            return Err(StoreError::Establish {
                session: session.clone(),
                reason: format!("malformed prekey bundle: {} bytes", bundle.len()),
            });
        }

        let id = u16::from_be_bytes([bundle[0], bundle[1]]);
        let mut seed = [0u8; KEY_SIZE];
        seed.copy_from_slice(&bundle[2..]);
        Ok((id, seed))
    }

    /// Fetch the session state, establishing it from `bundle` on first
    /// use.
    async fn establish_or_fetch(
        &self,
        session: &SessionId,
        bundle: &[u8],
    ) -> Result<Arc<Mutex<SessionState>>, StoreError> {
        {
            let sessions = self.sessions.lock().await;
            if let Some(state) = sessions.get(session) {
                return Ok(Arc::clone(state));
            }
        }

        let (prekey_id, seed) = Self::parse_bundle(session, bundle)?;
        let chain = chain::Chain::from_seed(&seed).map_err(|e| StoreError::Establish {
            session: session.clone(),
            reason: e.to_string(),
        })?;
        let state = SessionState { chain, aad: prekey_id.to_be_bytes() };

        let state = {
            let mut sessions = self.sessions.lock().await;
            // Establishment raced with another caller: first write wins,
            // matching the one-time nature of the claimed prekey.
            sessions
                .entry(session.clone())
                .or_insert_with(|| Arc::new(Mutex::new(state)))
                .clone()
        };

        self.consume_prekey(prekey_id).await;
        tracing::debug!(%session, prekey_id, "session established");
        Ok(state)
    }

    /// Remove a consumed prekey from the pool and push a notice when the
    /// pool crosses the low watermark.
    async fn consume_prekey(&self, prekey_id: u16) {
        if prekey_id == LAST_RESORT_PREKEY_ID {
            return;
        }

        let mut pool = self.pool.lock().await;
        if !pool.outstanding.remove(&prekey_id) {
            // A peer's prekey, not one of ours.
            return;
        }

        let remaining = pool.outstanding.len();
        if remaining < self.low_watermark && !pool.notified {
            pool.notified = true;
            let notice = LowPrekeyNotice { remaining, max_issued_id: pool.max_issued };
            if self.notices.send(notice).is_err() {
                tracing::debug!("low-prekey notice dropped: no subscriber");
            }
        }
    }
}

#[async_trait::async_trait]
impl<E: Entropy + 'static> SessionStore for MemoryBox<E> {
    async fn establish(&self, session: &SessionId, bundle: &[u8]) -> Result<(), StoreError> {
        self.establish_or_fetch(session, bundle).await.map(|_| ())
    }

    async fn encrypt(
        &self,
        session: &SessionId,
        bundle: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, StoreError> {
        let state = self.establish_or_fetch(session, bundle).await?;

        let mut nonce = [0u8; NONCE_SIZE];
        self.entropy.fill(&mut nonce).map_err(|e| StoreError::Encrypt {
            session: session.clone(),
            reason: e.to_string(),
        })?;

        let mut state = state.lock().await;
        let aad = state.aad;
        state.chain.seal(plaintext, nonce, &aad).map_err(|e| StoreError::Encrypt {
            session: session.clone(),
            reason: e.to_string(),
        })
    }

    async fn decrypt(
        &self,
        session: &SessionId,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, StoreError> {
        let state = {
            let sessions = self.sessions.lock().await;
            sessions.get(session).map(Arc::clone)
        };
        let Some(state) = state else {
            return Err(StoreError::Decrypt {
                session: session.clone(),
                reason: "unknown session".to_string(),
            });
        };

        let mut state = state.lock().await;
        let aad = state.aad;
        state.chain.open(ciphertext, &aad).map_err(|e| StoreError::Decrypt {
            session: session.clone(),
            reason: e.to_string(),
        })
    }

    async fn has_session(&self, session: &SessionId) -> bool {
        self.sessions.lock().await.contains_key(session)
    }

    async fn new_prekey(&self, id: u16) -> Result<Vec<u8>, StoreError> {
        let seed = self
            .entropy
            .seed32()
            .map_err(|e| StoreError::PrekeyGeneration { reason: e.to_string() })?;

        let mut material = Vec::with_capacity(PREKEY_MATERIAL_LEN);
        material.extend_from_slice(&id.to_be_bytes());
        material.extend_from_slice(&seed);

        if id != LAST_RESORT_PREKEY_ID {
            let mut pool = self.pool.lock().await;
            pool.outstanding.insert(id);
            pool.max_issued = pool.max_issued.max(id);
            if pool.outstanding.len() >= self.low_watermark {
                pool.notified = false;
            }
        }

        tracing::debug!(id, "prekey generated");
        Ok(material)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quill_core::SystemEntropy;

    use super::*;

    fn session() -> SessionId {
        SessionId::for_device("alice", "dev1")
    }

    #[tokio::test]
    async fn encrypt_establishes_session_on_first_use() {
        let (store, _notices) = MemoryBox::new(SystemEntropy::new());
        let bundle = store.new_prekey(0).await.unwrap();

        assert!(!store.has_session(&session()).await);
        store.encrypt(&session(), &bundle, b"hi").await.unwrap();
        assert!(store.has_session(&session()).await);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn encrypt_reuses_established_session() {
        let (store, _notices) = MemoryBox::new(SystemEntropy::new());
        let bundle = store.new_prekey(0).await.unwrap();

        store.encrypt(&session(), &bundle, b"one").await.unwrap();
        store.encrypt(&session(), &bundle, b"two").await.unwrap();

        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn cross_box_round_trip() {
        let (alice, _a) = MemoryBox::new(SystemEntropy::new());
        let (bob, _b) = MemoryBox::new(SystemEntropy::new());

        // Bob publishes a prekey; Alice claims it for bob@dev1.
        let bundle = bob.new_prekey(0).await.unwrap();
        let outbound = SessionId::for_device("bob", "dev1");
        let ciphertext = alice.encrypt(&outbound, &bundle, b"hi bob").await.unwrap();

        // Bob establishes the inbound session from his own material.
        let inbound = SessionId::for_device("alice", "dev1");
        bob.establish(&inbound, &bundle).await.unwrap();

        assert_eq!(bob.decrypt(&inbound, &ciphertext).await.unwrap(), b"hi bob");
    }

    #[tokio::test]
    async fn decrypt_unknown_session_fails() {
        let (store, _notices) = MemoryBox::new(SystemEntropy::new());

        let err = store.decrypt(&session(), b"anything").await.unwrap_err();
        assert!(matches!(err, StoreError::Decrypt { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn malformed_bundle_fails_establishment() {
        let (store, _notices) = MemoryBox::new(SystemEntropy::new());

        let err = store.encrypt(&session(), b"short", b"hi").await.unwrap_err();
        assert!(matches!(err, StoreError::Establish { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn low_watermark_pushes_one_notice() {
        let (store, mut notices) =
            MemoryBox::with_config(SystemEntropy::new(), BoxConfig { low_watermark: 2 });

        let bundles: Vec<_> = {
            let mut out = Vec::new();
            for id in 0..3 {
                out.push(store.new_prekey(id).await.unwrap());
            }
            out
        };

        // Consuming down to 2 stays at the watermark: no notice yet.
        let peer_a = SessionId::for_device("peer-a", "dev1");
        store.establish(&peer_a, &bundles[0]).await.unwrap();
        assert!(notices.try_recv().is_err());

        // Dropping below the watermark pushes exactly one notice.
        let peer_b = SessionId::for_device("peer-b", "dev1");
        store.establish(&peer_b, &bundles[1]).await.unwrap();
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice, LowPrekeyNotice { remaining: 1, max_issued_id: 2 });

        // Further consumption does not repeat the notice.
        let peer_c = SessionId::for_device("peer-c", "dev1");
        store.establish(&peer_c, &bundles[2]).await.unwrap();
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn replenishment_rearms_the_watermark() {
        let (store, mut notices) =
            MemoryBox::with_config(SystemEntropy::new(), BoxConfig { low_watermark: 2 });

        let first = store.new_prekey(0).await.unwrap();
        let second = store.new_prekey(1).await.unwrap();

        let peer_a = SessionId::for_device("peer-a", "dev1");
        store.establish(&peer_a, &first).await.unwrap();
        assert!(notices.try_recv().is_ok());

        // Refill to the watermark, then drain below it again: a fresh
        // notice fires with the continued id sequence.
        store.new_prekey(2).await.unwrap();
        let peer_b = SessionId::for_device("peer-b", "dev1");
        store.establish(&peer_b, &second).await.unwrap();

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice, LowPrekeyNotice { remaining: 1, max_issued_id: 2 });
    }

    #[tokio::test]
    async fn last_resort_prekey_is_not_pooled() {
        let (store, _notices) = MemoryBox::new(SystemEntropy::new());

        store.new_prekey(LAST_RESORT_PREKEY_ID).await.unwrap();
        assert_eq!(store.outstanding_prekeys().await, 0);

        store.new_prekey(0).await.unwrap();
        assert_eq!(store.outstanding_prekeys().await, 1);
    }
}
