//! Recipient device directory.
//!
//! A send fans out to every device of every recipient user. The backend
//! answers a prekey-claim request with a two-level JSON object keyed by
//! user id and then device id; this module gives that response a typed
//! shape instead of two levels of untyped maps.
//!
//! The directory is built externally per send, consumed once by the
//! fan-out engine, and not retained. Iteration order is irrelevant: the
//! aggregate result is an unordered set keyed by session id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::prekey::Prekey;

/// User identifier as issued by the backend.
pub type UserId = String;

/// Device (client) identifier as issued by the backend.
pub type DeviceId = String;

/// Mapping from user id to device id to the prekey claimed for that
/// device.
///
/// The inner keying already deduplicates by device id, so one directory
/// never contains the same (user, device) pair twice. An individual
/// prekey entry may still be malformed; consumers must not let one bad
/// entry abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDirectory {
    users: HashMap<UserId, HashMap<DeviceId, Prekey>>,
}

impl DeviceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claimed prekey for `(user, device)`, replacing any previous
    /// entry for that device.
    pub fn insert(
        &mut self,
        user: impl Into<UserId>,
        device: impl Into<DeviceId>,
        prekey: Prekey,
    ) {
        self.users.entry(user.into()).or_default().insert(device.into(), prekey);
    }

    /// Total number of device entries across all users.
    pub fn device_count(&self) -> usize {
        self.users.values().map(HashMap::len).sum()
    }

    /// True when the directory holds no devices.
    pub fn is_empty(&self) -> bool {
        self.device_count() == 0
    }

    /// Iterate every (user, device, prekey) triple exactly once, in no
    /// particular order.
    pub fn iter_devices(&self) -> impl Iterator<Item = (&str, &str, &Prekey)> {
        self.users.iter().flat_map(|(user, devices)| {
            devices.iter().map(move |(device, prekey)| {
                (user.as_str(), device.as_str(), prekey)
            })
        })
    }
}
