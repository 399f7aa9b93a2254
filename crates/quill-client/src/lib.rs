//! Quill client SDK core.
//!
//! The engine between plaintext application messages and the wire-level
//! ciphertext payloads of a multi-device, multi-user conversation:
//!
//! - [`FanoutEngine`]: encrypts one message independently for every
//!   recipient device, tolerating per-device failure without aborting
//!   the batch
//! - [`DecryptionResolver`]: resolves inbound envelopes to plaintext,
//!   failing loudly — there is no safe sentinel plaintext
//! - [`PrekeyLifecycle`]: registration-time prekey generation and
//!   push-driven replenishment
//! - [`registration`]: the one-shot record submitted when a device
//!   registers
//! - [`connect`]: auto-acceptance of pending connection requests
//!
//! HTTP clients, the realtime transport, and message dispatch are
//! external collaborators; this crate only speaks their boundary types
//! (`quill-proto`) and the session store trait (`quill-core`).

pub mod connect;
pub mod decrypt;
pub mod error;
pub mod fanout;
pub mod prekeys;
pub mod registration;

pub use connect::{ConnectionEvent, ConnectionStatus, ConnectionUpdate, reconcile};
pub use decrypt::DecryptionResolver;
pub use error::ClientError;
pub use fanout::{DevicePayload, EncryptionResult, FAILURE_SENTINEL, FanoutEngine};
pub use prekeys::{PrekeyLifecycle, PrekeyPublisher, PublishError, REPLENISH_BATCH_SIZE};
pub use registration::{
    ClientRegistrationInfo, DeviceMetadata, SignalingKeys, build_registration_info,
    generate_signaling_keys,
};
