//! Inkroom WebSocket Room Server
//!
//! Relays shape edits and cursor presence between clients in the same room,
//! persisting shapes in a latest-state table so late joiners can replay them.
//!
//! ## Protocol
//!
//! JSON text frames over `/ws?token=<jwt>`:
//! ```json
//! { "type": "joinRoom", "roomId": "abc" }
//! { "type": "msg", "roomID": "abc", "shape": { "name": "rect", "id": "r1", ... } }
//! { "type": "move", "roomID": "abc", "shape": { ... } }
//! { "type": "cursorMove", "roomId": "abc", "x": 100, "y": 200 }
//! ```
//! See [`inkroom_core::protocol`] for the full frame set.

pub mod auth;
pub mod config;
pub mod gateway;
pub mod persistence;
pub mod room;

use std::sync::Arc;

use tokio::net::TcpListener;

pub use auth::{AuthError, TokenVerifier};
pub use config::{ConfigError, ServerConfig};
pub use gateway::{Hub, JoinError, Session, router};
pub use persistence::{MemoryRepository, PersistenceError, Replaced, Room, ShapeRepository};
pub use room::{RoomCommand, RoomHandle};

/// Build a hub backed by an in-memory repository seeded from `config`.
pub fn memory_hub(config: &ServerConfig) -> Arc<Hub> {
    let repo = MemoryRepository::with_rooms(config.rooms.iter().cloned());
    Arc::new(Hub::new(
        Arc::new(repo),
        TokenVerifier::new(&config.jwt_secret),
        config.replay_limit,
    ))
}

/// Serve the router on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, hub: Arc<Hub>) -> std::io::Result<()> {
    axum::serve(listener, router(hub)).await
}
