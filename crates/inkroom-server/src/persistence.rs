//! Persistence adapter contract and the in-memory implementation.
//!
//! The store is a latest-state table: one row per shape id. A create inserts,
//! a replace overwrites the payload of an existing row and never inserts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use inkroom_core::{RoomId, ShapeId, ShapeRecord, UserId};
use serde::Serialize;
use thiserror::Error;

/// Boxed future for repository calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Shape already exists: {0}")]
    Duplicate(ShapeId),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Outcome of a replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    Committed,
    /// No row with that id in that room. Accepted, nothing written.
    NotFound,
}

/// A durable room. Rooms are created outside this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub slug: String,
    #[serde(rename = "adminId")]
    pub admin: UserId,
}

/// Durable shape store used by the room actors.
pub trait ShapeRepository: Send + Sync {
    /// Insert a new row. Fails with [`PersistenceError::Duplicate`] if the id
    /// is taken.
    fn create_row(&self, record: ShapeRecord) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Overwrite the payload of an existing row of `room_id`. A row with the
    /// same id in another room counts as [`Replaced::NotFound`].
    fn replace_row(&self, id: &str, room_id: &str, message: String) -> BoxFuture<'_, PersistenceResult<Replaced>>;

    fn room_exists(&self, room_id: &str) -> BoxFuture<'_, PersistenceResult<bool>>;

    fn room_by_slug(&self, slug: &str) -> BoxFuture<'_, PersistenceResult<Option<Room>>>;

    /// Up to `limit` rows of a room, newest first.
    fn list_latest(&self, room_id: &str, limit: usize) -> BoxFuture<'_, PersistenceResult<Vec<ShapeRecord>>>;
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Room>,
    /// Rows in first-insertion order.
    rows: Vec<ShapeRecord>,
    index: HashMap<ShapeId, usize>,
}

/// In-memory repository for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding the given rooms.
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let repo = Self::new();
        for room in rooms {
            repo.add_room(room);
        }
        repo
    }

    pub fn add_room(&self, room: Room) {
        if let Ok(mut tables) = self.tables.write() {
            tables.rooms.insert(room.id.clone(), room);
        }
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> PersistenceError {
    PersistenceError::Unavailable(format!("Lock error: {}", e))
}

impl ShapeRepository for MemoryRepository {
    fn create_row(&self, record: ShapeRecord) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            if tables.index.contains_key(&record.id) {
                return Err(PersistenceError::Duplicate(record.id));
            }
            let position = tables.rows.len();
            tables.index.insert(record.id.clone(), position);
            tables.rows.push(record);
            Ok(())
        })
    }

    fn replace_row(&self, id: &str, room_id: &str, message: String) -> BoxFuture<'_, PersistenceResult<Replaced>> {
        let id = id.to_string();
        let room_id = room_id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            let Some(&i) = tables.index.get(&id) else {
                return Ok(Replaced::NotFound);
            };
            let row = &mut tables.rows[i];
            if row.room_id != room_id {
                return Ok(Replaced::NotFound);
            }
            row.message = message;
            Ok(Replaced::Committed)
        })
    }

    fn room_exists(&self, room_id: &str) -> BoxFuture<'_, PersistenceResult<bool>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            Ok(tables.rooms.contains_key(&room_id))
        })
    }

    fn room_by_slug(&self, slug: &str) -> BoxFuture<'_, PersistenceResult<Option<Room>>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            Ok(tables.rooms.values().find(|room| room.slug == slug).cloned())
        })
    }

    fn list_latest(&self, room_id: &str, limit: usize) -> BoxFuture<'_, PersistenceResult<Vec<ShapeRecord>>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            Ok(tables
                .rows
                .iter()
                .rev()
                .filter(|row| row.room_id == room_id)
                .take(limit)
                .cloned()
                .collect())
        })
    }
}
