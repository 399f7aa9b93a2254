//! Session identity resolution.
//!
//! Every cryptographic session is keyed by the (user, device) pair it
//! encrypts for. The resolver derives a stable composite identifier from
//! that pair; both the encrypt and decrypt paths go through it, which is
//! what lets the session store treat the identifier as a plain lookup
//! key.
//!
//! # Invariants
//!
//! - Determinism: the same (user, device) pair always yields the same
//!   identifier.
//! - Injectivity: distinct pairs yield distinct identifiers, provided
//!   neither component contains [`SESSION_ID_SEPARATOR`]. That
//!   precondition is on whoever mints user and device ids (the backend
//!   does not use `@` in either); it is asserted in debug builds and
//!   never silently repaired.

use std::fmt;

/// Separator between the user and device components of a session id.
pub const SESSION_ID_SEPARATOR: char = '@';

/// Stable identifier of one per-device cryptographic session.
///
/// Created on the first encrypt or decrypt attempt for a device and used
/// as the session store's lookup key from then on. Renders as
/// `user@device`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Resolve the session identifier for a (user, device) pair.
    ///
    /// Pure and total: there is no error case. See the module docs for
    /// the separator precondition.
    pub fn for_device(user_id: &str, device_id: &str) -> Self {
        debug_assert!(
            !user_id.contains(SESSION_ID_SEPARATOR),
            "user id must not contain the session id separator"
        );
        debug_assert!(
            !device_id.contains(SESSION_ID_SEPARATOR),
            "device id must not contain the session id separator"
        );
        Self(format!("{user_id}{SESSION_ID_SEPARATOR}{device_id}"))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
