//! Connection gateway: authentication, sessions and HTTP routes.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::{SinkExt, StreamExt};
use inkroom_core::{ClientMessage, RoomId, ShapeRecord, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, TokenVerifier};
use crate::persistence::{PersistenceError, Room, ShapeRepository};
use crate::room::{Outbound, RoomCommand, RoomHandle, SessionId};

/// Per-connection outbound queue capacity.
const OUTBOUND_CAPACITY: usize = 256;

/// A running room actor and the number of sessions that joined it.
struct OpenRoom {
    handle: RoomHandle,
    sessions: usize,
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Shared server state: token verifier, repository and the open rooms.
pub struct Hub {
    rooms: DashMap<RoomId, OpenRoom>,
    repo: Arc<dyn ShapeRepository>,
    verifier: TokenVerifier,
    replay_limit: usize,
}

impl Hub {
    pub fn new(repo: Arc<dyn ShapeRepository>, verifier: TokenVerifier, replay_limit: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            repo,
            verifier,
            replay_limit,
        }
    }

    pub fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
        self.verifier.verify(token)
    }

    /// Register one more session in a room, spawning its actor if needed.
    /// Only rooms present in the durable store can be opened.
    pub async fn open_room(&self, room_id: &str) -> Result<RoomHandle, JoinError> {
        if !self.rooms.contains_key(room_id) && !self.repo.room_exists(room_id).await? {
            return Err(JoinError::RoomNotFound(room_id.to_string()));
        }
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(|| OpenRoom {
            handle: RoomHandle::spawn(room_id.to_string(), self.repo.clone(), self.replay_limit),
            sessions: 0,
        });
        room.sessions += 1;
        Ok(room.handle.clone())
    }

    /// Handle of an open room.
    pub fn room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|room| room.handle.clone())
    }

    /// Drop one session from a room. The last one out closes the room, and
    /// its actor stops after draining what is already queued.
    pub fn release_room(&self, room_id: &str) {
        if let Entry::Occupied(mut room) = self.rooms.entry(room_id.to_string()) {
            let open = room.get_mut();
            open.sessions = open.sessions.saturating_sub(1);
            if open.sessions == 0 {
                room.remove();
                debug!("Room {} closed", room_id);
            }
        }
    }

    pub fn repository(&self) -> &Arc<dyn ShapeRepository> {
        &self.repo
    }

    /// Number of rooms with a running actor.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// One authenticated connection and its room memberships.
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    tx: Outbound,
    rooms: HashSet<RoomId>,
}

impl Session {
    pub fn new(user_id: UserId, tx: Outbound) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx,
            rooms: HashSet::new(),
        }
    }

    pub fn rooms(&self) -> &HashSet<RoomId> {
        &self.rooms
    }

    /// Route one text frame to the room it addresses. Malformed frames and
    /// frames for rooms this session has not joined are logged and dropped.
    pub async fn handle_frame(&mut self, hub: &Hub, text: &str) {
        let msg = match ClientMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Malformed frame from {}: {}", self.user_id, e);
                return;
            }
        };

        let room_id = msg.room_id().to_string();
        match msg {
            ClientMessage::JoinRoom { .. } => self.join(hub, room_id).await,
            ClientMessage::LeaveRoom { .. } => {
                if !self.rooms.remove(&room_id) {
                    debug!("{} left room {} it never joined", self.user_id, room_id);
                    return;
                }
                leave(hub, &room_id, self.id).await;
            }
            ClientMessage::Create { shape, .. } => {
                let command = RoomCommand::Create {
                    user_id: self.user_id.clone(),
                    reply: self.tx.clone(),
                    shape,
                };
                self.send_joined(hub, &room_id, command).await;
            }
            ClientMessage::Update { shape, .. } => {
                let command = RoomCommand::Update {
                    user_id: self.user_id.clone(),
                    reply: self.tx.clone(),
                    shape,
                };
                self.send_joined(hub, &room_id, command).await;
            }
            ClientMessage::CursorMove { x, y, .. } => {
                let command = RoomCommand::Cursor {
                    user_id: self.user_id.clone(),
                    x,
                    y,
                };
                self.send_joined(hub, &room_id, command).await;
            }
        }
    }

    async fn join(&mut self, hub: &Hub, room_id: RoomId) {
        let handle = if self.rooms.contains(&room_id) {
            hub.room(&room_id)
        } else {
            match hub.open_room(&room_id).await {
                Ok(handle) => {
                    self.rooms.insert(room_id.clone());
                    Some(handle)
                }
                Err(e) => {
                    info!("{} cannot join: {}", self.user_id, e);
                    None
                }
            }
        };
        let Some(handle) = handle else {
            return;
        };
        let command = RoomCommand::Join {
            session: self.id,
            user_id: self.user_id.clone(),
            tx: self.tx.clone(),
        };
        if let Err(e) = handle.send(command).await {
            warn!("Room {}: {}", room_id, e);
        }
    }

    async fn send_joined(&self, hub: &Hub, room_id: &str, command: RoomCommand) {
        if !self.rooms.contains(room_id) {
            debug!("{} sent to room {} it has not joined", self.user_id, room_id);
            return;
        }
        let Some(handle) = hub.room(room_id) else {
            return;
        };
        if let Err(e) = handle.send(command).await {
            warn!("Room {}: {}", room_id, e);
        }
    }

    /// Leave every joined room.
    pub async fn disconnect(&mut self, hub: &Hub) {
        for room_id in self.rooms.drain() {
            leave(hub, &room_id, self.id).await;
        }
    }
}

async fn leave(hub: &Hub, room_id: &str, session: SessionId) {
    if let Some(handle) = hub.room(room_id) {
        if let Err(e) = handle.send(RoomCommand::Leave { session }).await {
            warn!("Room {}: {}", room_id, e);
        }
    }
    hub.release_room(room_id);
}

/// Build the application router.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/rooms/{room_id}/shapes", get(room_shapes))
        .route("/rooms/by-slug/{slug}", get(room_by_slug))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

/// Index page
async fn index() -> &'static str {
    "Inkroom Server - Connect via WebSocket at /ws?token=<jwt>"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// WebSocket upgrade handler. A bad token still upgrades, then the socket is
/// closed without a payload.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<TokenQuery>,
    State(hub): State<Arc<Hub>>,
) -> impl IntoResponse {
    let auth = hub.authenticate(query.token.as_deref());
    ws.on_upgrade(move |socket| async move {
        match auth {
            Ok(user_id) => handle_socket(socket, hub, user_id).await,
            Err(e) => {
                warn!("Rejected connection: {}", e);
                let mut socket = socket;
                let _ = socket.send(Message::Close(None)).await;
            }
        }
    })
}

/// Handle an authenticated WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, user_id: UserId) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let mut session = Session::new(user_id, tx);
    info!("New connection: {} ({})", session.user_id, session.id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => session.handle_frame(&hub, text.as_str()).await,
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame from {}", session.user_id);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session.user_id, e);
                        break;
                    }
                }
            }

            Some(frame) = rx.recv() => {
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.disconnect(&hub).await;
    info!("Connection closed: {} ({})", session.user_id, session.id);
}

#[derive(Debug, Deserialize)]
struct ShapesQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ShapesResponse {
    messages: Vec<ShapeRecord>,
}

/// Latest shapes of a room, newest first.
async fn room_shapes(
    Path(room_id): Path<RoomId>,
    Query(query): Query<ShapesQuery>,
    State(hub): State<Arc<Hub>>,
) -> Response {
    let limit = query.limit.unwrap_or(hub.replay_limit);
    match hub.repository().list_latest(&room_id, limit).await {
        Ok(messages) => Json(ShapesResponse { messages }).into_response(),
        Err(e) => {
            warn!("Listing shapes for room {} failed: {}", room_id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct RoomResponse {
    room: Room,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Room details for a slug.
async fn room_by_slug(Path(slug): Path<String>, State(hub): State<Arc<Hub>>) -> Response {
    match hub.repository().room_by_slug(&slug).await {
        Ok(Some(room)) => Json(RoomResponse { room }).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: "Room Not Found" }),
        )
            .into_response(),
        Err(e) => {
            warn!("Room lookup for slug {} failed: {}", slug, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
