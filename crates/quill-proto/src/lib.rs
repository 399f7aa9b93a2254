//! Transport payload types for the Quill messaging SDK.
//!
//! The backend speaks JSON over its directory, delivery, and realtime
//! APIs; binary material (prekey public keys, ciphertext) travels inside
//! that JSON as base64 text. This crate owns the typed forms of those
//! payloads and the text codec between binary and wire representation.
//!
//! Nothing here touches cryptographic state: these are the shapes that
//! cross the process boundary, shared by the client engine and any
//! transport glue layered on top of it.

pub mod codec;
pub mod directory;
pub mod envelope;
pub mod prekey;

pub use codec::DecodeError;
pub use directory::{DeviceDirectory, DeviceId, UserId};
pub use envelope::{EnvelopeData, InboundEnvelope};
pub use prekey::{LAST_RESORT_PREKEY_ID, Prekey};
