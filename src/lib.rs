//! Room-scoped WebSocket chat relay library.
//!
//! This library provides the connection/room broadcast engine and the
//! HTTP/WebSocket server around it: clients join named rooms over a
//! persistent connection and exchange messages that are fanned out to
//! every member of a room, including the sender.

// layers
pub mod auth;
pub mod protocol;
pub mod relay;
pub mod server;

// shared library
pub mod common;
