//! Server state shared across request handlers.

use std::sync::Arc;

use crate::auth::{TokenIssuer, UserStore};
use crate::relay::SessionManager;

/// Shared application state
pub struct AppState {
    /// Relay engine entry point for connection lifecycles
    pub session: Arc<SessionManager>,
    /// Account store (auth boundary)
    pub users: Arc<UserStore>,
    /// Bearer token issuer (auth boundary)
    pub tokens: TokenIssuer,
}
