//! Per-room actors.
//!
//! Every open room gets one task that owns the room's membership and
//! processes its commands strictly in arrival order. The task ends once every
//! [`RoomHandle`] for it is dropped and its queue is drained. Persistence is awaited inside the
//! task before anything is fanned out, so broadcasts for a room leave in the
//! order their frames arrived and a later replay never contradicts them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use inkroom_core::{DropReason, Participant, RoomId, ServerMessage, Shape, ShapeId, ShapeRecord, UserId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::persistence::{Replaced, ShapeRepository};

pub type SessionId = Uuid;

/// Queue of serialized frames for one connection.
pub type Outbound = mpsc::Sender<String>;

/// Capacity of a room's command queue.
const COMMAND_CAPACITY: usize = 1024;

/// Commands processed by a room actor, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        session: SessionId,
        user_id: UserId,
        tx: Outbound,
    },
    Leave {
        session: SessionId,
    },
    Create {
        user_id: UserId,
        /// Where a nack goes if the create is dropped.
        reply: Outbound,
        shape: Shape,
    },
    Update {
        user_id: UserId,
        reply: Outbound,
        shape: Shape,
    },
    Cursor {
        user_id: UserId,
        x: f64,
        y: f64,
    },
}

/// Cloneable handle to a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawn the actor for `room_id` on the current runtime.
    pub fn spawn(room_id: RoomId, repo: Arc<dyn ShapeRepository>, replay_limit: usize) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let actor = RoomActor {
            room_id,
            members: HashMap::new(),
            repo,
            replay_limit,
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Queue a command. Fails only if the actor has stopped.
    pub async fn send(&self, command: RoomCommand) -> Result<(), RoomClosed> {
        self.tx.send(command).await.map_err(|_| RoomClosed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Room actor has stopped")]
pub struct RoomClosed;

struct Member {
    user_id: UserId,
    tx: Outbound,
}

struct RoomActor {
    room_id: RoomId,
    members: HashMap<SessionId, Member>,
    repo: Arc<dyn ShapeRepository>,
    replay_limit: usize,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        debug!("Room {} started", self.room_id);
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!("Room {} stopped", self.room_id);
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { session, user_id, tx } => self.join(session, user_id, tx).await,
            RoomCommand::Leave { session } => self.leave(session),
            RoomCommand::Create { user_id, reply, shape } => self.create(user_id, reply, shape).await,
            RoomCommand::Update { user_id, reply, shape } => self.update(user_id, reply, shape).await,
            RoomCommand::Cursor { user_id, x, y } => {
                let msg = ServerMessage::CursorMove {
                    user_id: user_id.clone(),
                    x,
                    y,
                    room_id: self.room_id.clone(),
                };
                self.fanout(&msg, Some(&user_id));
            }
        }
    }

    async fn join(&mut self, session: SessionId, user_id: UserId, tx: Outbound) {
        info!("User {} joined room {}", user_id, self.room_id);
        let shapes = match self.repo.list_latest(&self.room_id, self.replay_limit).await {
            Ok(shapes) => shapes,
            Err(e) => {
                warn!("Replay for room {} failed: {}", self.room_id, e);
                Vec::new()
            }
        };
        let replay = ServerMessage::Replay {
            room_id: self.room_id.clone(),
            shapes,
        };
        deliver(&tx, &replay);
        self.members.insert(session, Member { user_id, tx });
        self.broadcast_roster();
    }

    fn leave(&mut self, session: SessionId) {
        if let Some(member) = self.members.remove(&session) {
            info!("User {} left room {}", member.user_id, self.room_id);
            self.broadcast_roster();
        }
    }

    /// The room must still exist in the durable store before anything of
    /// it is written.
    async fn check_room(&self) -> Result<(), DropReason> {
        match self.repo.room_exists(&self.room_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!("Room {} not found, dropping event", self.room_id);
                Err(DropReason::RoomNotFound)
            }
            Err(e) => {
                warn!("Room lookup for {} failed: {}", self.room_id, e);
                Err(DropReason::PersistenceFailure)
            }
        }
    }

    async fn create(&mut self, user_id: UserId, reply: Outbound, shape: Shape) {
        let record = match ShapeRecord::from_shape(&self.room_id, &user_id, &shape) {
            Ok(record) => record,
            Err(e) => {
                debug!("Not persisting {} in room {}: {}", shape.kind(), self.room_id, e);
                return;
            }
        };
        let shape_id = record.id.clone();
        let message = record.message.clone();

        if let Err(reason) = self.check_room().await {
            self.nack(&reply, shape_id, reason);
            return;
        }
        if let Err(e) = self.repo.create_row(record).await {
            warn!("Create {} in room {} failed: {}", shape_id, self.room_id, e);
            self.nack(&reply, shape_id, DropReason::PersistenceFailure);
            return;
        }

        let msg = ServerMessage::Created {
            message,
            user_id,
            room_id: Some(self.room_id.clone()),
        };
        self.fanout(&msg, None);
    }

    async fn update(&mut self, user_id: UserId, reply: Outbound, shape: Shape) {
        let Some(id) = shape.id().map(str::to_string) else {
            return;
        };
        let message = match serde_json::to_string(&shape) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to encode shape {}: {}", id, e);
                return;
            }
        };

        if let Err(reason) = self.check_room().await {
            self.nack(&reply, id, reason);
            return;
        }
        match self.repo.replace_row(&id, &self.room_id, message.clone()).await {
            Ok(Replaced::Committed) => {
                let msg = ServerMessage::Updated {
                    message,
                    user_id,
                    room_id: Some(self.room_id.clone()),
                };
                self.fanout(&msg, None);
            }
            Ok(Replaced::NotFound) => debug!("Update for unknown shape {} in room {} ignored", id, self.room_id),
            Err(e) => {
                warn!("Update {} in room {} failed: {}", id, self.room_id, e);
                self.nack(&reply, id, DropReason::PersistenceFailure);
            }
        }
    }

    /// Tell the originator its event was dropped.
    fn nack(&self, reply: &Outbound, shape_id: ShapeId, reason: DropReason) {
        let nack = ServerMessage::Nack {
            room_id: self.room_id.clone(),
            shape_id,
            reason,
        };
        deliver(reply, &nack);
    }

    /// Distinct identities in the room, sorted.
    fn roster(&self) -> Vec<Participant> {
        self.members
            .values()
            .map(|m| m.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|user_id| Participant { user_id })
            .collect()
    }

    fn broadcast_roster(&self) {
        let msg = ServerMessage::ParticipantsUpdate {
            participants: self.roster(),
            room_id: self.room_id.clone(),
        };
        self.fanout(&msg, None);
    }

    /// Send to every member, skipping those with `exclude`'s identity.
    /// Closed transports are skipped silently.
    fn fanout(&self, msg: &ServerMessage, exclude: Option<&str>) {
        let frame = match msg.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return;
            }
        };
        for member in self.members.values() {
            if exclude == Some(member.user_id.as_str()) {
                continue;
            }
            match member.tx.try_send(frame.clone()) {
                Ok(()) | Err(TrySendError::Closed(_)) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for {}, dropping frame", member.user_id)
                }
            }
        }
    }
}

/// Send one frame to one connection, best effort.
fn deliver(tx: &Outbound, msg: &ServerMessage) {
    match msg.to_json() {
        Ok(frame) => {
            if let Err(TrySendError::Full(_)) = tx.try_send(frame) {
                warn!("Outbound queue full, dropping frame");
            }
        }
        Err(e) => warn!("Failed to encode frame: {}", e),
    }
}
