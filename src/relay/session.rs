//! Session lifecycle manager.
//!
//! Orchestrates the relay services on each connection's state
//! transitions: connect, join(s), send(s), leave(s), disconnect. Every
//! transition is a local mutation plus fan-out; none is retried, and
//! none can fail in a way that blocks the transition. A failure in one
//! connection's handling never takes down the shared registry or other
//! connections' sessions.
//!
//! Presence policy: join and leave both emit notifications, and both
//! join_room and leave_room require a username; events missing one are
//! dropped as malformed (see DESIGN.md).

use std::sync::Arc;

use crate::protocol::{ClientEvent, GroupMessage, RoomPresence, ServerEvent};

use super::{
    domain::{ConnectionId, RoomId, Username},
    presence::PresenceNotifier,
    pusher::{MessagePusher, PusherChannel},
    registry::ConnectionRegistry,
    rooms::RoomTable,
    router::MessageRouter,
};

/// Orchestrates registry, membership table, presence notifier and
/// router for every connection's lifecycle.
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTable>,
    pusher: Arc<dyn MessagePusher>,
    presence: PresenceNotifier,
    router: MessageRouter,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomTable>,
        pusher: Arc<dyn MessagePusher>,
        presence: PresenceNotifier,
    ) -> Self {
        let router = MessageRouter::new(rooms.clone(), pusher.clone());
        Self {
            registry,
            rooms,
            pusher,
            presence,
            router,
        }
    }

    /// Handle connection establishment: allocate an identifier and wire
    /// up the outbound delivery channel. The connection enters the
    /// `Connected` state (no rooms joined).
    pub async fn connect(&self, sender: PusherChannel) -> ConnectionId {
        let id = self.registry.register().await;
        self.pusher.register(id.clone(), sender).await;
        tracing::info!("connection '{}' established", id);
        id
    }

    /// Dispatch one inbound client event. Events for connections
    /// mid-teardown and malformed payloads are dropped silently.
    pub async fn handle_event(&self, id: &ConnectionId, event: ClientEvent) {
        if !self.registry.exists(id).await {
            tracing::warn!("dropping event for unknown connection '{}'", id);
            return;
        }
        match event {
            ClientEvent::JoinRoom(payload) => self.join_room(id, payload).await,
            ClientEvent::SendMessage(payload) => self.send_message(id, payload).await,
            ClientEvent::LeaveRoom(payload) => self.leave_room(id, payload).await,
        }
    }

    /// `join_room`: add the connection to the room's member set and
    /// notify the room. Re-joining an already-joined room is a no-op
    /// and emits no duplicate notification.
    async fn join_room(&self, id: &ConnectionId, payload: RoomPresence) {
        let Some((room, username)) = validate_presence(payload) else {
            tracing::warn!("dropping malformed join_room from '{}'", id);
            return;
        };

        let newly_joined = self.rooms.join(id.clone(), room.clone()).await;
        self.registry.record_username(id, username.clone()).await;

        // The liveness guard in handle_event and the insert above are
        // two separate lock acquisitions; a disconnect can land between
        // them, purge before the insert exists, and leave a dead member
        // behind. Re-check now that the insert is visible and roll it
        // back if the connection is gone (disconnect's post-unregister
        // sweep covers the remaining interleavings).
        if !self.registry.exists(id).await {
            self.rooms.leave(id, &room).await;
            tracing::debug!("'{}' disconnected during join of '{}', rolled back", id, room);
            return;
        }

        if !newly_joined {
            tracing::debug!("'{}' re-joined room '{}', ignoring", id, room);
            return;
        }
        tracing::info!("'{}' joined room '{}' as '{}'", id, room, username);

        // Membership mutation happened first, so the joiner receives
        // its own join notification.
        let notification = self.presence.join_notification(&username);
        self.router
            .route(&room, &ServerEvent::JoiningMessage(notification.into()))
            .await;
    }

    /// `send_message`: fan the payload out verbatim to every current
    /// member of the target room, the sender included if it is one.
    async fn send_message(&self, id: &ConnectionId, payload: GroupMessage) {
        let Ok(room) = RoomId::new(payload.room_id.clone()) else {
            tracing::warn!("dropping send_message without room id from '{}'", id);
            return;
        };

        self.router
            .route(&room, &ServerEvent::ReceiveGroupMessage(payload))
            .await;
    }

    /// `leave_room`: remove the connection from the room's member set
    /// and notify the remaining members. Leaving a room never joined is
    /// a no-op, never an error.
    async fn leave_room(&self, id: &ConnectionId, payload: RoomPresence) {
        let Some((room, username)) = validate_presence(payload) else {
            tracing::warn!("dropping malformed leave_room from '{}'", id);
            return;
        };

        let was_member = self.rooms.leave(id, &room).await;
        if !was_member {
            tracing::debug!("'{}' left room '{}' it was not in, ignoring", id, room);
            return;
        }
        tracing::info!("'{}' left room '{}'", id, room);

        // Removal happened first, so the leaver is not a recipient.
        let notification = self.presence.leave_notification(&username);
        self.router
            .route(&room, &ServerEvent::LeaveMessage(notification.into()))
            .await;
    }

    /// Transport-driven disconnect: purge the connection from every
    /// room, notify those rooms, and drop all connection state.
    /// Idempotent and terminal; no further events are processed for
    /// this identifier.
    pub async fn disconnect(&self, id: &ConnectionId) {
        let mut purged_rooms = self.rooms.purge_connection(id).await;
        let username = self.registry.username_of(id).await;
        self.pusher.unregister(id).await;
        self.registry.unregister(id).await;

        // A join racing this teardown can insert a membership after the
        // purge above but before the registry entry disappeared. Sweep
        // once more now that exists() is false: any insert landing
        // after this sweep re-checks liveness itself and rolls back.
        let swept = self.rooms.purge_connection(id).await;
        if !swept.is_empty() {
            tracing::debug!(
                "swept {} room(s) joined by '{}' during teardown",
                swept.len(),
                id
            );
            purged_rooms.extend(swept);
        }

        if purged_rooms.is_empty() {
            tracing::info!("connection '{}' closed", id);
            return;
        }
        tracing::info!(
            "connection '{}' closed, purged from {} room(s)",
            id,
            purged_rooms.len()
        );

        // A connection that never joined with a username has nothing to
        // announce.
        let Some(username) = username else {
            return;
        };
        for room in purged_rooms {
            let notification = self.presence.leave_notification(&username);
            self.router
                .route(&room, &ServerEvent::LeaveMessage(notification.into()))
                .await;
        }
    }
}

/// Validate a presence payload, rejecting empty room ids and usernames
fn validate_presence(payload: RoomPresence) -> Option<(RoomId, Username)> {
    let room = RoomId::new(payload.room_id).ok()?;
    let username = Username::new(payload.username).ok()?;
    Some((room, username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::relay::pusher::ChannelMessagePusher;
    use tokio::sync::mpsc;

    // 2023-01-01 00:00:00 UTC == 01/01/2023, 06:00 AM in Dhaka
    const FIXED_MILLIS: i64 = 1672531200000;

    fn manager() -> SessionManager {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomTable::new());
        let pusher = Arc::new(ChannelMessagePusher::new());
        let presence = PresenceNotifier::new(Arc::new(FixedClock::new(FIXED_MILLIS)));
        SessionManager::new(registry, rooms, pusher, presence)
    }

    async fn connect(manager: &SessionManager) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.connect(tx).await;
        (id, rx)
    }

    fn join(room: &str, username: &str) -> ClientEvent {
        ClientEvent::JoinRoom(RoomPresence {
            room_id: room.to_string(),
            username: username.to_string(),
        })
    }

    fn leave(room: &str, username: &str) -> ClientEvent {
        ClientEvent::LeaveRoom(RoomPresence {
            room_id: room.to_string(),
            username: username.to_string(),
        })
    }

    fn send(author: &str, room: &str, message: &str) -> ClientEvent {
        ClientEvent::SendMessage(GroupMessage {
            author: author.to_string(),
            room_id: room.to_string(),
            message: message.to_string(),
        })
    }

    /// Drain everything currently queued on a delivery channel
    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            events.push(serde_json::from_str(&payload).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_joiner_receives_own_join_notification() {
        // given:
        let manager = manager();
        let (alice, mut rx) = connect(&manager).await;

        // when:
        manager.handle_event(&alice, join("lobby", "alice")).await;

        // then:
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::JoiningMessage(msg) => {
                assert_eq!(msg.author, "System");
                assert_eq!(msg.message, "alice has joined the room.");
                assert_eq!(msg.time, "01/01/2023, 06:00 AM");
            }
            other => panic!("expected joining_message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_message_fans_out_to_all_members_including_sender() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        // when:
        manager.handle_event(&alice, send("alice", "lobby", "hi")).await;

        // then: both members received the exact payload
        let expected = ServerEvent::ReceiveGroupMessage(GroupMessage {
            author: "alice".to_string(),
            room_id: "lobby".to_string(),
            message: "hi".to_string(),
        });
        assert_eq!(drain(&mut rx_alice), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_bob), vec![expected]);
    }

    #[tokio::test]
    async fn test_non_members_receive_nothing() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (carol, mut rx_carol) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&carol, join("games", "carol")).await;
        drain(&mut rx_alice);
        drain(&mut rx_carol);

        // when:
        manager.handle_event(&alice, send("alice", "lobby", "hi")).await;

        // then:
        assert_eq!(drain(&mut rx_alice).len(), 1);
        assert!(drain(&mut rx_carol).is_empty());
    }

    #[tokio::test]
    async fn test_rejoin_emits_no_duplicate_notification() {
        // given:
        let manager = manager();
        let (alice, mut rx) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        drain(&mut rx);

        // when:
        manager.handle_event(&alice, join("lobby", "alice")).await;

        // then: no second joining_message
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_rejoin_delivers_messages_exactly_once() {
        // given:
        let manager = manager();
        let (alice, mut rx) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        drain(&mut rx);

        // when:
        manager.handle_event(&alice, send("alice", "lobby", "once")).await;

        // then:
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_members_only() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        // when:
        manager.handle_event(&bob, leave("lobby", "bob")).await;

        // then: alice hears it, the leaver does not
        let events = drain(&mut rx_alice);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::LeaveMessage(msg) => {
                assert_eq!(msg.message, "bob has left the room.");
            }
            other => panic!("expected leave_message, got {:?}", other),
        }
        assert!(drain(&mut rx_bob).is_empty());
    }

    #[tokio::test]
    async fn test_leave_never_joined_room_is_silent_noop() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        drain(&mut rx_alice);

        // when: bob leaves a room he never joined
        manager.handle_event(&bob, leave("lobby", "bob")).await;

        // then: no notification anywhere
        assert!(drain(&mut rx_alice).is_empty());
        assert!(drain(&mut rx_bob).is_empty());
    }

    #[tokio::test]
    async fn test_send_to_unknown_room_is_silent_noop() {
        // given:
        let manager = manager();
        let (alice, mut rx) = connect(&manager).await;

        // when:
        manager.handle_event(&alice, send("alice", "void", "hello?")).await;

        // then:
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_join_is_dropped() {
        // given:
        let manager = manager();
        let (alice, mut rx) = connect(&manager).await;

        // when: empty room id and empty username
        manager.handle_event(&alice, join("", "alice")).await;
        manager.handle_event(&alice, join("lobby", "")).await;

        // then: no membership, no notification
        assert!(drain(&mut rx).is_empty());
        manager.handle_event(&alice, send("alice", "lobby", "hi")).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_purges_and_notifies_each_room() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&alice, join("games", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        manager.handle_event(&bob, join("games", "bob")).await;
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        // when:
        manager.disconnect(&alice).await;

        // then: bob got a leave_message per shared room
        let events = drain(&mut rx_bob);
        assert_eq!(events.len(), 2);
        for event in events {
            match event {
                ServerEvent::LeaveMessage(msg) => {
                    assert_eq!(msg.message, "alice has left the room.");
                }
                other => panic!("expected leave_message, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_disconnected_connection_receives_no_further_broadcasts() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        manager.disconnect(&bob).await;
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        // when:
        manager.handle_event(&alice, send("alice", "lobby", "anyone?")).await;

        // then: only alice receives it
        assert_eq!(drain(&mut rx_alice).len(), 1);
        assert!(drain(&mut rx_bob).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_disconnect_is_idempotent() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        manager.disconnect(&bob).await;
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        // when: the transport signals disconnect twice
        manager.disconnect(&bob).await;

        // then: no second round of leave notifications
        assert!(drain(&mut rx_alice).is_empty());
    }

    #[tokio::test]
    async fn test_events_after_disconnect_are_dropped() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, _rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.disconnect(&bob).await;
        drain(&mut rx_alice);

        // when: a stale event arrives for the disconnected id
        manager.handle_event(&bob, join("lobby", "bob")).await;

        // then: nothing happened
        assert!(drain(&mut rx_alice).is_empty());
    }

    #[tokio::test]
    async fn test_messages_from_one_origin_arrive_in_order() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;
        drain(&mut rx_bob);

        // when:
        for i in 0..5 {
            manager
                .handle_event(&alice, send("alice", "lobby", &format!("msg-{i}")))
                .await;
        }

        // then:
        let received: Vec<String> = drain(&mut rx_bob)
            .into_iter()
            .map(|event| match event {
                ServerEvent::ReceiveGroupMessage(msg) => msg.message,
                other => panic!("expected receive_group_message, got {:?}", other),
            })
            .collect();
        assert_eq!(received, vec!["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);
        drain(&mut rx_alice);
    }

    #[tokio::test]
    async fn test_no_backlog_for_late_joiner() {
        // given:
        let manager = manager();
        let (alice, mut rx_alice) = connect(&manager).await;
        manager.handle_event(&alice, join("lobby", "alice")).await;
        manager.handle_event(&alice, send("alice", "lobby", "early")).await;
        drain(&mut rx_alice);

        // when: bob joins after the message was routed
        let (bob, mut rx_bob) = connect(&manager).await;
        manager.handle_event(&bob, join("lobby", "bob")).await;

        // then: bob sees only his own join notification
        let events = drain(&mut rx_bob);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::JoiningMessage(_)));
    }
}
