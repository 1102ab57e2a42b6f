//! Message router: fans a server event out to a room's current members.

use std::sync::Arc;

use crate::protocol::ServerEvent;

use super::{domain::RoomId, pusher::MessagePusher, rooms::RoomTable};

/// Routes serialized events to every current member of a room,
/// including the sender when the sender is itself a member.
///
/// The membership snapshot is taken under the room table's lock; actual
/// delivery happens through non-blocking channel sends afterwards, so a
/// slow recipient can never stall routing or membership operations.
pub struct MessageRouter {
    rooms: Arc<RoomTable>,
    pusher: Arc<dyn MessagePusher>,
}

impl MessageRouter {
    pub fn new(rooms: Arc<RoomTable>, pusher: Arc<dyn MessagePusher>) -> Self {
        Self { rooms, pusher }
    }

    /// Deliver an event to every member of `room` at the moment of
    /// routing. Routing to an empty or unknown room is a no-op, and
    /// per-recipient delivery failures are isolated.
    pub async fn route(&self, room: &RoomId, event: &ServerEvent) {
        let members = self.rooms.members_of(room).await;
        if members.is_empty() {
            tracing::debug!("no members in room '{}', dropping event", room);
            return;
        }

        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize event for room '{}': {}", room, e);
                return;
            }
        };

        tracing::debug!("routing event to {} member(s) of room '{}'", members.len(), room);
        self.pusher.broadcast(members, &payload).await;
    }
}
