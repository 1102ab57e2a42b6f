//! Room membership table: many-to-many index between rooms and connections.
//!
//! The table maintains bidirectional mappings, room -> members (for
//! broadcast) and connection -> rooms (for disconnect cleanup), so both
//! directions are O(1) lookups. Rooms are ephemeral: an entry
//! materializes on first join and is dropped as soon as its member set
//! becomes empty, which keeps emptiness observably equal to
//! non-existence.
//!
//! The membership logic lives in a pure inner struct so it can be unit
//! tested without a runtime; the async wrapper serializes all mutations
//! and snapshot reads on one mutex, which is what makes `purge` atomic
//! with respect to concurrent joins and leaves.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use super::domain::{ConnectionId, RoomId};

#[derive(Debug, Default)]
struct RoomTableInner {
    /// Room id -> member connection ids
    members: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Connection id -> joined room ids
    joined: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomTableInner {
    /// Add a connection to a room. Returns `false` when the connection
    /// was already a member (idempotent join).
    fn join(&mut self, connection: ConnectionId, room: RoomId) -> bool {
        let newly_joined = self
            .members
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
        self.joined.entry(connection).or_default().insert(room);
        newly_joined
    }

    /// Remove a connection from a room. Returns `false` when the
    /// connection was not a member (no-op leave, never an error).
    fn leave(&mut self, connection: &ConnectionId, room: &RoomId) -> bool {
        let Some(member_set) = self.members.get_mut(room) else {
            return false;
        };
        let was_member = member_set.remove(connection);
        if member_set.is_empty() {
            self.members.remove(room);
        }
        if let Some(joined_set) = self.joined.get_mut(connection) {
            joined_set.remove(room);
            if joined_set.is_empty() {
                self.joined.remove(connection);
            }
        }
        was_member
    }

    /// Point-in-time snapshot of a room's members; empty if the room is
    /// unknown.
    fn members_of(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.members
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Point-in-time snapshot of the rooms a connection has joined
    fn rooms_of(&self, connection: &ConnectionId) -> Vec<RoomId> {
        self.joined
            .get(connection)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a connection from every room it belongs to, returning the
    /// rooms it was purged from.
    fn purge(&mut self, connection: &ConnectionId) -> Vec<RoomId> {
        let rooms = self.joined.remove(connection).unwrap_or_default();
        for room in &rooms {
            if let Some(member_set) = self.members.get_mut(room) {
                member_set.remove(connection);
                if member_set.is_empty() {
                    self.members.remove(room);
                }
            }
        }
        rooms.into_iter().collect()
    }

    /// Number of rooms with at least one member
    fn room_count(&self) -> usize {
        self.members.len()
    }
}

/// Concurrency-safe room membership table
#[derive(Default)]
pub struct RoomTable {
    inner: Mutex<RoomTableInner>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room (idempotent). Returns `true` only on
    /// a first-time join, so callers can suppress duplicate presence
    /// notifications.
    pub async fn join(&self, connection: ConnectionId, room: RoomId) -> bool {
        let mut inner = self.inner.lock().await;
        inner.join(connection, room)
    }

    /// Remove a connection from a room. Returns `true` when it actually
    /// was a member.
    pub async fn leave(&self, connection: &ConnectionId, room: &RoomId) -> bool {
        let mut inner = self.inner.lock().await;
        inner.leave(connection, room)
    }

    /// Snapshot of a room's current members
    pub async fn members_of(&self, room: &RoomId) -> Vec<ConnectionId> {
        let inner = self.inner.lock().await;
        inner.members_of(room)
    }

    /// Snapshot of the rooms a connection has joined
    pub async fn rooms_of(&self, connection: &ConnectionId) -> Vec<RoomId> {
        let inner = self.inner.lock().await;
        inner.rooms_of(connection)
    }

    /// Atomically remove a connection from every room it belongs to.
    /// The read and the removals happen under one lock acquisition, so
    /// no room the connection is a member of at call time can be
    /// missed by an in-flight join or leave.
    pub async fn purge_connection(&self, connection: &ConnectionId) -> Vec<RoomId> {
        let mut inner = self.inner.lock().await;
        inner.purge(connection)
    }

    /// Number of rooms with at least one member
    pub async fn room_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.room_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionId {
        ConnectionId::generate()
    }

    fn room(name: &str) -> RoomId {
        RoomId::new(name.to_string()).unwrap()
    }

    #[test]
    fn test_join_creates_room_on_first_member() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();

        // when:
        let newly_joined = table.join(alice.clone(), room("lobby"));

        // then:
        assert!(newly_joined);
        assert_eq!(table.members_of(&room("lobby")), vec![alice.clone()]);
        assert_eq!(table.rooms_of(&alice), vec![room("lobby")]);
        assert_eq!(table.room_count(), 1);
    }

    #[test]
    fn test_join_is_idempotent() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();
        table.join(alice.clone(), room("lobby"));

        // when: the same connection joins the same room again
        let newly_joined = table.join(alice.clone(), room("lobby"));

        // then: exactly one membership entry
        assert!(!newly_joined);
        assert_eq!(table.members_of(&room("lobby")).len(), 1);
        assert_eq!(table.rooms_of(&alice).len(), 1);
    }

    #[test]
    fn test_connection_can_join_multiple_rooms() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();

        // when:
        table.join(alice.clone(), room("lobby"));
        table.join(alice.clone(), room("games"));

        // then:
        let mut rooms = table.rooms_of(&alice);
        rooms.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(rooms, vec![room("games"), room("lobby")]);
    }

    #[test]
    fn test_leave_removes_membership() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();
        let bob = conn();
        table.join(alice.clone(), room("lobby"));
        table.join(bob.clone(), room("lobby"));

        // when:
        let was_member = table.leave(&alice, &room("lobby"));

        // then: alice is gone, bob is untouched
        assert!(was_member);
        assert_eq!(table.members_of(&room("lobby")), vec![bob]);
        assert!(table.rooms_of(&alice).is_empty());
    }

    #[test]
    fn test_leave_never_joined_room_is_noop() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();
        let bob = conn();
        table.join(bob.clone(), room("lobby"));

        // when: alice leaves a room she never joined
        let was_member = table.leave(&alice, &room("lobby"));

        // then: no error, other members unaffected
        assert!(!was_member);
        assert_eq!(table.members_of(&room("lobby")), vec![bob]);
    }

    #[test]
    fn test_leave_unknown_room_is_noop() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();

        // when:
        let was_member = table.leave(&alice, &room("nowhere"));

        // then:
        assert!(!was_member);
    }

    #[test]
    fn test_empty_room_has_no_representation() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();
        table.join(alice.clone(), room("lobby"));

        // when: the last member leaves
        table.leave(&alice, &room("lobby"));

        // then: the room entry is gone, a later join is a fresh room
        assert_eq!(table.room_count(), 0);
        assert!(table.members_of(&room("lobby")).is_empty());
        assert!(table.join(conn(), room("lobby")));
    }

    #[test]
    fn test_members_of_unknown_room_is_empty() {
        // given:
        let table = RoomTableInner::default();

        // when:
        let members = table.members_of(&room("nowhere"));

        // then:
        assert!(members.is_empty());
    }

    #[test]
    fn test_purge_removes_connection_from_every_room() {
        // given:
        let mut table = RoomTableInner::default();
        let alice = conn();
        let bob = conn();
        table.join(alice.clone(), room("lobby"));
        table.join(alice.clone(), room("games"));
        table.join(bob.clone(), room("lobby"));

        // when:
        let mut purged = table.purge(&alice);

        // then:
        purged.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(purged, vec![room("games"), room("lobby")]);
        assert!(table.rooms_of(&alice).is_empty());
        assert_eq!(table.members_of(&room("lobby")), vec![bob]);
        // "games" became empty and was dropped
        assert_eq!(table.room_count(), 1);
    }

    #[test]
    fn test_purge_unknown_connection_is_noop() {
        // given:
        let mut table = RoomTableInner::default();
        let bob = conn();
        table.join(bob.clone(), room("lobby"));

        // when:
        let purged = table.purge(&conn());

        // then:
        assert!(purged.is_empty());
        assert_eq!(table.members_of(&room("lobby")), vec![bob]);
    }

    #[tokio::test]
    async fn test_concurrent_joins_both_land() {
        // given:
        let table = std::sync::Arc::new(RoomTable::new());
        let alice = conn();
        let bob = conn();

        // when: two connections join the same room concurrently
        let t1 = tokio::spawn({
            let table = table.clone();
            let alice = alice.clone();
            async move { table.join(alice, room("lobby")).await }
        });
        let t2 = tokio::spawn({
            let table = table.clone();
            let bob = bob.clone();
            async move { table.join(bob, room("lobby")).await }
        });
        t1.await.unwrap();
        t2.await.unwrap();

        // then: no lost update
        let members = table.members_of(&room("lobby")).await;
        assert_eq!(members.len(), 2);
        assert!(members.contains(&alice));
        assert!(members.contains(&bob));
    }
}
