//! Value objects and errors for the relay engine.
//!
//! Identifiers travel through the engine as validated newtypes so that
//! handlers can't accidentally swap a room id for a connection id, and
//! so that malformed (empty) identifiers are rejected once, at the
//! boundary, instead of deep inside the fan-out path.

use thiserror::Error;
use uuid::Uuid;

/// Validation errors for relay value objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Room identifier was empty or whitespace-only
    #[error("room id must not be empty")]
    EmptyRoomId,

    /// Username was empty or whitespace-only
    #[error("username must not be empty")]
    EmptyUsername,
}

/// Opaque unique identifier of one live connection.
///
/// Allocated server-side on connection establishment; clients never
/// supply or observe it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate a fresh unique identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an ephemeral room.
///
/// Arbitrary client-supplied string; a room exists only by virtue of
/// having at least one member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Create a RoomId, rejecting empty identifiers
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyRoomId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-supplied display name. Accepted verbatim and unverified
/// against the auth boundary; only emptiness is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Create a Username, rejecting empty names
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyUsername);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
