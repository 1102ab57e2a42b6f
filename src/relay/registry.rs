//! Connection registry: the single source of truth for live connections.
//!
//! Each live connection gets an entry keyed by its [`ConnectionId`].
//! The entry tracks when the connection was established and the display
//! name last supplied on a `join_room` event; the name is what the
//! disconnect path uses to synthesize leave notifications.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::common::time::get_timestamp;

use super::domain::{ConnectionId, Username};

/// State tracked for one live connection
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Display name learned from the most recent join_room event
    pub username: Option<Username>,
    /// Unix timestamp when the connection was established (milliseconds)
    pub connected_at: i64,
}

/// Registry of live connections.
///
/// Exclusively owns connection state; the room membership table refers
/// to connections by identifier only.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection identifier and create its entry.
    /// Never fails.
    pub async fn register(&self) -> ConnectionId {
        let id = ConnectionId::generate();
        let entry = ConnectionEntry {
            username: None,
            connected_at: get_timestamp(),
        };
        let mut connections = self.connections.lock().await;
        connections.insert(id.clone(), entry);
        tracing::debug!("connection '{}' registered", id);
        id
    }

    /// Remove a connection's entry. Idempotent: unknown ids and repeat
    /// calls are a no-op, since transports may signal disconnect more
    /// than once.
    pub async fn unregister(&self, id: &ConnectionId) {
        let mut connections = self.connections.lock().await;
        if connections.remove(id).is_some() {
            tracing::debug!("connection '{}' unregistered", id);
        }
    }

    /// Whether the connection is still alive. Used to guard against
    /// operating on a connection mid-teardown.
    pub async fn exists(&self, id: &ConnectionId) -> bool {
        let connections = self.connections.lock().await;
        connections.contains_key(id)
    }

    /// Record the display name a connection identified itself with.
    /// No-op if the connection is already gone.
    pub async fn record_username(&self, id: &ConnectionId, username: Username) {
        let mut connections = self.connections.lock().await;
        if let Some(entry) = connections.get_mut(id) {
            entry.username = Some(username);
        }
    }

    /// The display name last recorded for a connection, if any
    pub async fn username_of(&self, id: &ConnectionId) -> Option<Username> {
        let connections = self.connections.lock().await;
        connections.get(id).and_then(|entry| entry.username.clone())
    }

    /// Number of live connections
    pub async fn count(&self) -> usize {
        let connections = self.connections.lock().await;
        connections.len()
    }
}
