//! Wire-contract event DTOs.
//!
//! Every frame on the WebSocket is a JSON envelope tagged by `event`
//! with the payload under `data`. Event names and payload shapes are
//! the wire contract; payload field names are camelCase.
//!
//! Inbound frames that fail to deserialize are dropped at the boundary
//! with a warning, never deserialized speculatively.

use serde::{Deserialize, Serialize};

use crate::relay::presence::{SYSTEM_AUTHOR, SystemNotification};

/// Events a client may send to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a named room
    JoinRoom(RoomPresence),
    /// Send a message to a room
    SendMessage(GroupMessage),
    /// Leave a named room
    LeaveRoom(RoomPresence),
}

/// Events the server fans out to a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Presence notification: someone joined
    JoiningMessage(SystemMessage),
    /// Broadcast of a user-authored message
    ReceiveGroupMessage(GroupMessage),
    /// Presence notification: someone left
    LeaveMessage(SystemMessage),
}

/// Payload of `join_room` and `leave_room`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    pub room_id: String,
    pub username: String,
}

/// Payload of `send_message` and `receive_group_message`.
///
/// The broadcast payload is the inbound payload verbatim; the author
/// string is client-supplied and unverified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub author: String,
    pub room_id: String,
    pub message: String,
}

/// Payload of `joining_message` and `leave_message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    pub author: String,
    pub message: String,
    pub time: String,
}

impl From<SystemNotification> for SystemMessage {
    fn from(notification: SystemNotification) -> Self {
        Self {
            author: SYSTEM_AUTHOR.to_string(),
            message: notification.message,
            time: notification.time,
        }
    }
}
