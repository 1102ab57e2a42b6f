//! Presence notifier: system-authored join/leave messages.
//!
//! Notifications are constructed, broadcast, and forgotten; nothing is
//! stored. The timestamp is rendered in Dhaka local time with a
//! 12-hour clock, matching what clients display verbatim.

use std::sync::Arc;

use crate::common::time::{Clock, format_dhaka_timestamp};

use super::domain::Username;

/// Fixed author marker carried by every presence notification
pub const SYSTEM_AUTHOR: &str = "System";

/// A server-authored message reporting a presence event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    /// Human-readable description of who joined or left
    pub message: String,
    /// Formatted Dhaka-local timestamp, e.g. `01/01/2023, 06:00 AM`
    pub time: String,
}

/// Synthesizes presence notifications.
///
/// Usernames are caller-supplied and accepted verbatim; there is no
/// cross-check against the auth boundary.
pub struct PresenceNotifier {
    clock: Arc<dyn Clock>,
}

impl PresenceNotifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Notification for a connection that just joined a room.
    ///
    /// Must be built only after the membership mutation took effect, so
    /// the joining connection receives its own join notification as a
    /// room member.
    pub fn join_notification(&self, username: &Username) -> SystemNotification {
        SystemNotification {
            message: format!("{} has joined the room.", username),
            time: format_dhaka_timestamp(self.clock.now_millis()),
        }
    }

    /// Notification for a connection that left a room, by explicit
    /// leave_room or by disconnect.
    pub fn leave_notification(&self, username: &Username) -> SystemNotification {
        SystemNotification {
            message: format!("{} has left the room.", username),
            time: format_dhaka_timestamp(self.clock.now_millis()),
        }
    }
}
