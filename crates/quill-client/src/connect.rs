//! Connection-request reconciliation.
//!
//! The realtime transport delivers `user.connection` events whenever a
//! connection between two users changes state. A bot-style client
//! accepts pending requests automatically; the decision is a pure
//! function here, and the resulting update is submitted by the external
//! connection API client.

use quill_proto::UserId;
use serde::{Deserialize, Serialize};

/// Connection lifecycle states reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Incoming request awaiting a decision.
    Pending,
    /// Connection established.
    Accepted,
    /// Other party blocked.
    Blocked,
    /// Incoming request dismissed without an answer.
    Ignored,
    /// Outgoing request awaiting the other party.
    Sent,
    /// Outgoing request withdrawn.
    Cancelled,
}

/// A `user.connection` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// User who initiated the connection.
    pub from: UserId,
    /// User on the receiving end.
    pub to: UserId,
    /// Current state of the connection.
    pub status: ConnectionStatus,
}

/// Status update to submit to the connection API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    /// The user whose connection to update.
    pub other_user: UserId,
    /// The status to set.
    pub status: ConnectionStatus,
}

/// Decide how to reconcile a connection event.
///
/// A pending connection involving `self_user` yields an accept update
/// for the other party; any other event — already decided, or not
/// involving this user at all — yields nothing.
pub fn reconcile(event: &ConnectionEvent, self_user: &str) -> Option<ConnectionUpdate> {
    if event.status != ConnectionStatus::Pending {
        return None;
    }

    let other_user = if event.from == self_user {
        &event.to
    } else if event.to == self_user {
        &event.from
    } else {
        return None;
    };

    Some(ConnectionUpdate { other_user: other_user.clone(), status: ConnectionStatus::Accepted })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(from: &str, to: &str, status: ConnectionStatus) -> ConnectionEvent {
        ConnectionEvent { from: from.to_string(), to: to.to_string(), status }
    }

    #[test]
    fn pending_request_to_us_is_accepted() {
        let update = reconcile(&event("alice", "bot", ConnectionStatus::Pending), "bot");
        assert_eq!(
            update,
            Some(ConnectionUpdate {
                other_user: "alice".to_string(),
                status: ConnectionStatus::Accepted,
            })
        );
    }

    #[test]
    fn pending_request_from_us_targets_the_other_party() {
        let update = reconcile(&event("bot", "alice", ConnectionStatus::Pending), "bot");
        assert_eq!(update.map(|u| u.other_user), Some("alice".to_string()));
    }

    #[test]
    fn decided_connection_is_left_alone() {
        assert_eq!(reconcile(&event("alice", "bot", ConnectionStatus::Accepted), "bot"), None);
        assert_eq!(reconcile(&event("alice", "bot", ConnectionStatus::Blocked), "bot"), None);
    }

    #[test]
    fn unrelated_event_is_ignored() {
        assert_eq!(reconcile(&event("alice", "carol", ConnectionStatus::Pending), "bot"), None);
    }
}
