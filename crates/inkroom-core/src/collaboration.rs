//! Client side of a collaborative room.
//!
//! [`RoomClient`] ties the shape store, viewport, selection and presence
//! together and speaks the wire protocol. It owns no transport: outgoing frames
//! are queued as JSON strings and drained with [`RoomClient::take_outgoing`],
//! incoming frames are fed to [`RoomClient::handle_message`].

use std::time::Instant;

use kurbo::{Point, Vec2};

use crate::presence::{CursorThrottle, PresenceTracker};
use crate::protocol::{ClientMessage, DropReason, RoomId, ServerMessage, UserId};
use crate::render::RenderContext;
use crate::selection::{Handle, Manipulation, get_handles, hit_test_handles, shape_at};
use crate::shapes::{Shape, ShapeId};
use crate::store::ShapeStore;
use crate::viewport::Viewport;

/// What an incoming frame changed.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// The join-time replay was applied.
    Replayed { room_id: RoomId, count: usize },
    ShapeCreated {
        shape_id: Option<ShapeId>,
        user_id: UserId,
    },
    ShapeUpdated { shape_id: ShapeId, user_id: UserId },
    ParticipantsChanged {
        room_id: RoomId,
        participants: Vec<UserId>,
    },
    CursorMoved { user_id: UserId, position: Point },
    /// The server dropped one of our creates or moves.
    Rejected { shape_id: ShapeId, reason: DropReason },
}

/// One client's view of one room at a time.
pub struct RoomClient {
    /// Identity this client authenticated as.
    user_id: UserId,
    current_room: Option<RoomId>,
    store: ShapeStore,
    viewport: Viewport,
    selected: Option<ShapeId>,
    manipulation: Option<Manipulation>,
    presence: PresenceTracker,
    throttle: CursorThrottle,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    /// Set by presence, selection and viewport changes.
    dirty: bool,
}

impl RoomClient {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            current_room: None,
            store: ShapeStore::new(),
            viewport: Viewport::new(),
            selected: None,
            manipulation: None,
            presence: PresenceTracker::default(),
            throttle: CursorThrottle::default(),
            outgoing: Vec::new(),
            dirty: true,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the current room ID.
    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    // --- Room membership ---

    /// Join a room, leaving the current one first. The store is emptied and
    /// waits for the server's replay before applying live events.
    pub fn join_room(&mut self, room_id: impl Into<RoomId>) {
        let room_id = room_id.into();
        if self.current_room.as_deref() == Some(room_id.as_str()) {
            return;
        }
        self.leave_room();
        self.store.begin_replay();
        self.current_room = Some(room_id.clone());
        self.send(ClientMessage::JoinRoom { room_id });
    }

    /// Leave the current room and forget its shapes and presence.
    pub fn leave_room(&mut self) {
        let Some(room_id) = self.current_room.take() else {
            return;
        };
        self.send(ClientMessage::LeaveRoom { room_id });
        self.store.clear();
        self.presence.clear();
        self.throttle.reset();
        self.clear_selection();
    }

    // --- Local edits ---

    /// Add a locally drawn shape right away and send it to the room.
    pub fn local_create(&mut self, shape: Shape) -> Option<ShapeId> {
        let id = shape.id().map(str::to_string);
        self.store.local_create(shape.clone());
        match &self.current_room {
            Some(room_id) => {
                let room_id = room_id.clone();
                self.send(ClientMessage::Create { room_id, shape });
            }
            None => log::debug!("Not in a room, keeping shape {:?} local", id),
        }
        id
    }

    /// Currently selected shape, if it still exists.
    pub fn selected(&self) -> Option<&Shape> {
        self.selected.as_deref().and_then(|id| self.store.get(id))
    }

    /// Screen-space handles of the selected shape.
    pub fn selection_handles(&self) -> Vec<Handle> {
        self.selected()
            .map(|shape| get_handles(shape, &self.viewport))
            .unwrap_or_default()
    }

    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.dirty = true;
        }
        self.manipulation = None;
    }

    /// Pointer pressed at a screen point. Handles of the selected shape win
    /// over shapes underneath. Returns whether a shape was grabbed.
    pub fn pointer_down(&mut self, screen_point: Point) -> bool {
        let world = self.viewport.screen_to_world(screen_point);

        let grabbed = self.selected().and_then(|shape| {
            let handle = hit_test_handles(shape, &self.viewport, screen_point)?;
            Some(Manipulation::resizing(shape.id()?.to_string(), handle))
        });
        if grabbed.is_some() {
            self.manipulation = grabbed;
            return true;
        }

        let hit = shape_at(self.store.iter(), world).and_then(|s| s.id().map(str::to_string));
        match hit {
            Some(id) => {
                self.selected = Some(id.clone());
                self.manipulation = Some(Manipulation::moving(id, world));
                self.dirty = true;
                true
            }
            None => {
                self.clear_selection();
                false
            }
        }
    }

    /// Pointer moved to a screen point. Continues any drag and feeds the
    /// cursor throttle.
    pub fn pointer_move(&mut self, screen_point: Point, now: Instant) {
        let world = self.viewport.screen_to_world(screen_point);

        if let Some(drag) = self.manipulation.as_mut() {
            let moved = match self.store.get_mut(&drag.shape_id) {
                Some(shape) => {
                    drag.update(shape, world);
                    Some(shape.clone())
                }
                None => None,
            };
            match moved {
                Some(shape) => self.send_update(shape),
                // Gone from the store (room left or replay replaced it).
                None => self.clear_selection(),
            }
        }

        if let Some(room_id) = self.current_room.clone() {
            if let Some(pos) = self.throttle.sample(world, now) {
                self.send(ClientMessage::CursorMove {
                    room_id,
                    x: pos.x,
                    y: pos.y,
                });
            }
        }
    }

    /// Pointer released. The selection stays; the drag ends.
    pub fn pointer_up(&mut self) {
        self.manipulation = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.manipulation.is_some()
    }

    // --- Viewport ---

    pub fn pan(&mut self, delta: Vec2) {
        self.viewport.pan(delta);
        self.dirty = true;
    }

    pub fn zoom_at(&mut self, anchor: Point, ratio: f64) {
        self.viewport.zoom_at(anchor, ratio);
        self.dirty = true;
    }

    // --- Outgoing ---

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn send(&mut self, msg: ClientMessage) {
        match msg.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::warn!("Failed to encode outgoing frame: {}", e),
        }
    }

    fn send_update(&mut self, shape: Shape) {
        if let Some(room_id) = self.current_room.clone() {
            self.send(ClientMessage::Update { room_id, shape });
        }
    }

    // --- Incoming ---

    /// Handle an incoming server frame.
    /// Returns a RoomEvent describing what happened.
    pub fn handle_message(&mut self, json: &str, now: Instant) -> Option<RoomEvent> {
        let msg = match ServerMessage::from_json(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Ignoring malformed frame: {}", e);
                return None;
            }
        };

        match msg {
            ServerMessage::Replay { room_id, shapes } => {
                if !self.addresses(Some(&room_id)) {
                    return None;
                }
                let count = shapes.len();
                self.store.finish_replay(shapes);
                Some(RoomEvent::Replayed { room_id, count })
            }
            ServerMessage::Created {
                message,
                user_id,
                room_id,
            } => {
                if !self.addresses(room_id.as_deref()) {
                    return None;
                }
                let shape = decode_shape(&message)?;
                let shape_id = shape.id().map(str::to_string);
                self.store.apply_create(shape);
                Some(RoomEvent::ShapeCreated { shape_id, user_id })
            }
            ServerMessage::Updated {
                message,
                user_id,
                room_id,
            } => {
                if !self.addresses(room_id.as_deref()) {
                    return None;
                }
                let shape = decode_shape(&message)?;
                let shape_id = shape.id()?.to_string();
                // Our own echo lags behind the drag in progress.
                if user_id == self.user_id
                    && self.manipulation.as_ref().is_some_and(|m| m.shape_id == shape_id)
                {
                    return None;
                }
                let replaying = self.store.is_replaying();
                let applied = self.store.apply_update(shape);
                (applied || replaying).then_some(RoomEvent::ShapeUpdated { shape_id, user_id })
            }
            ServerMessage::ParticipantsUpdate {
                participants,
                room_id,
            } => {
                if !self.addresses(Some(&room_id)) {
                    return None;
                }
                self.presence.set_roster(&participants);
                self.dirty = true;
                Some(RoomEvent::ParticipantsChanged {
                    room_id,
                    participants: self.presence.roster().to_vec(),
                })
            }
            ServerMessage::CursorMove {
                user_id,
                x,
                y,
                room_id,
            } => {
                if !self.addresses(Some(&room_id)) || user_id == self.user_id {
                    return None;
                }
                let position = Point::new(x, y);
                self.presence.update_cursor(user_id.clone(), position, now);
                self.dirty = true;
                Some(RoomEvent::CursorMoved { user_id, position })
            }
            ServerMessage::Nack {
                room_id,
                shape_id,
                reason,
            } => {
                if !self.addresses(Some(&room_id)) {
                    return None;
                }
                log::warn!("Server dropped shape {} in room {}: {:?}", shape_id, room_id, reason);
                self.store.mark_rejected(&shape_id, reason);
                Some(RoomEvent::Rejected { shape_id, reason })
            }
        }
    }

    /// Frames without a room id belong to the current room.
    fn addresses(&self, room_id: Option<&str>) -> bool {
        match (room_id, self.current_room.as_deref()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(theirs), Some(ours)) => theirs == ours,
        }
    }

    // --- Redraw ---

    /// Expire stale cursors and report whether a redraw is needed.
    /// Feed the result to a [`crate::render::RedrawScheduler`].
    pub fn tick(&mut self, now: Instant) -> bool {
        let pruned = self.presence.prune(now);
        let store_dirty = self.store.take_dirty();
        let dirty = std::mem::take(&mut self.dirty);
        pruned || store_dirty || dirty
    }

    /// Snapshot of everything a renderer needs for one frame.
    pub fn render_context(&self, now: Instant) -> RenderContext<'_> {
        RenderContext {
            shapes: self.store.entries(),
            viewport: &self.viewport,
            selected: self.selected(),
            handles: self.selection_handles(),
            cursors: self
                .presence
                .cursors(now)
                .map(|(id, cursor)| (id.clone(), cursor.position))
                .collect(),
        }
    }
}

fn decode_shape(message: &str) -> Option<Shape> {
    match serde_json::from_str(message) {
        Ok(shape) => Some(shape),
        Err(e) => {
            log::warn!("Ignoring undecodable shape payload: {}", e);
            None
        }
    }
}
