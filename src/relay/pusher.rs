//! Outbound delivery seam.
//!
//! The relay engine never writes to a socket directly: every connection
//! owns an unbounded channel whose receiving end is drained by that
//! connection's WebSocket writer task. Fan-out therefore reduces to
//! channel sends, which never block, so no network I/O happens while
//! membership state is being read.

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use super::domain::ConnectionId;

/// Sending half of a connection's outbound delivery channel
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Errors surfaced by targeted pushes. Broadcast fan-out never surfaces
/// per-recipient failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// No delivery channel is registered for the connection
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    /// The channel exists but the receiving side is gone
    #[error("push failed: {0}")]
    PushFailed(String),
}

/// Abstraction over outbound message delivery.
///
/// The engine depends on this trait; the channel-backed implementation
/// below is the production one, and tests substitute mocks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register a connection's delivery channel
    async fn register(&self, id: ConnectionId, sender: PusherChannel);

    /// Remove a connection's delivery channel. Idempotent.
    async fn unregister(&self, id: &ConnectionId);

    /// Deliver a payload to a single connection
    async fn push_to(&self, id: &ConnectionId, payload: &str) -> Result<(), PushError>;

    /// Deliver a payload to every target independently. A failure for
    /// one recipient is logged and skipped; it never aborts delivery to
    /// the others and is never reported to the caller.
    async fn broadcast(&self, targets: Vec<ConnectionId>, payload: &str);
}

/// Channel-backed [`MessagePusher`] implementation
#[derive(Default)]
pub struct ChannelMessagePusher {
    /// Connection id -> outbound delivery channel
    channels: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl ChannelMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for ChannelMessagePusher {
    async fn register(&self, id: ConnectionId, sender: PusherChannel) {
        let mut channels = self.channels.lock().await;
        channels.insert(id.clone(), sender);
        tracing::debug!("delivery channel registered for '{}'", id);
    }

    async fn unregister(&self, id: &ConnectionId) {
        let mut channels = self.channels.lock().await;
        if channels.remove(id).is_some() {
            tracing::debug!("delivery channel removed for '{}'", id);
        }
    }

    async fn push_to(&self, id: &ConnectionId, payload: &str) -> Result<(), PushError> {
        let channels = self.channels.lock().await;
        let sender = channels
            .get(id)
            .ok_or_else(|| PushError::ConnectionNotFound(id.as_str().to_string()))?;
        sender
            .send(payload.to_string())
            .map_err(|e| PushError::PushFailed(e.to_string()))?;
        Ok(())
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, payload: &str) {
        let channels = self.channels.lock().await;
        for target in targets {
            match channels.get(&target) {
                Some(sender) => {
                    if let Err(e) = sender.send(payload.to_string()) {
                        tracing::warn!("failed to push message to '{}': {}", target, e);
                    }
                }
                None => {
                    tracing::warn!("connection '{}' not found during broadcast, skipping", target);
                }
            }
        }
    }
}
