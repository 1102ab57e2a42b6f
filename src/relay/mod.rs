//! Connection/room broadcast engine.
//!
//! The relay tracks live connections, maintains the many-to-many room
//! membership index, synthesizes presence notifications, and fans
//! messages out to room members. All state is volatile; nothing
//! survives a restart and no message is retained beyond its fan-out.

pub mod domain;
pub mod presence;
pub mod pusher;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod session;

pub use domain::{ConnectionId, RoomId, Username};
pub use pusher::{ChannelMessagePusher, MessagePusher, PusherChannel};
pub use registry::ConnectionRegistry;
pub use rooms::RoomTable;
pub use session::SessionManager;
