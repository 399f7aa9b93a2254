//! Core abstractions for the Quill messaging SDK.
//!
//! This crate owns the boundary between the SDK's encryption engine and
//! the cryptographic session library that actually holds ratchet state:
//!
//! - [`SessionId`]: the deterministic identity of one per-device session
//! - [`SessionStore`]: the pluggable store the ratchet library sits
//!   behind
//! - [`LowPrekeyNotice`]: the push signal that drives prekey
//!   replenishment
//! - [`Entropy`]: the randomness capability injected into anything that
//!   generates key material
//!
//! No cryptography is implemented here. The store trait is consumed by
//! the client crate and implemented by `quill-box` (in-memory, for tests
//! and development) or by an adapter over a vetted ratchet library in
//! production.

pub mod entropy;
pub mod session_id;
pub mod store;

pub use entropy::{Entropy, EntropyError, SystemEntropy};
pub use session_id::{SESSION_ID_SEPARATOR, SessionId};
pub use store::{LowPrekeyNotice, SessionStore, StoreError};
