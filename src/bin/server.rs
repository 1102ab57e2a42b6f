//! Room-scoped WebSocket chat relay server.
//!
//! Clients connect over WebSocket, join named rooms, and exchange
//! messages fanned out to every room member. Accounts are held in
//! memory behind the HTTP signup/login boundary.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 5000
//! ```

use std::sync::Arc;

use clap::Parser;
use zenwhisper::{
    auth::{TokenIssuer, UserStore},
    common::{logger::setup_logger, time::SystemClock},
    relay::{
        ChannelMessagePusher, ConnectionRegistry, RoomTable, SessionManager,
        presence::PresenceNotifier,
    },
    server::{run_server, state::AppState},
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Room-scoped WebSocket chat relay", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "5000")]
    port: u16,

    /// Secret used to sign login tokens
    #[arg(long, default_value = "zenwhisper-dev-secret")]
    token_secret: String,

    /// Login token lifetime in seconds
    #[arg(long, default_value = "3600")]
    token_ttl_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Relay engine: registry, membership table, delivery seam,
    // presence notifier, session manager.
    let registry = Arc::new(ConnectionRegistry::new());
    let rooms = Arc::new(RoomTable::new());
    let pusher = Arc::new(ChannelMessagePusher::new());
    let presence = PresenceNotifier::new(Arc::new(SystemClock));
    let session = Arc::new(SessionManager::new(registry, rooms, pusher, presence));

    // Auth boundary
    let users = Arc::new(UserStore::new());
    let tokens = TokenIssuer::new(&args.token_secret, args.token_ttl_secs);

    let state = Arc::new(AppState {
        session,
        users,
        tokens,
    });

    if let Err(e) = run_server(args.host, args.port, state).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
