//! Client-side shape store for one open room.
//!
//! The store is the single authoritative mirror of a room's shapes on a
//! client. Remote creates and updates, optimistic local creates and the
//! join-time replay are all reconciled here.

use std::collections::HashMap;

use crate::protocol::{DropReason, ShapeRecord};
use crate::shapes::{Shape, ShapeId};

/// Synchronization state of a stored shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created locally, not yet seen back from the server.
    Pending,
    /// Seen from the server (remote event, replay, or our own echo).
    Committed,
    /// The server dropped the create. The shape stays visible locally.
    Rejected(DropReason),
}

/// A shape plus its sync state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredShape {
    pub shape: Shape,
    pub sync: SyncState,
}

/// A live event that arrived while a replay was in progress.
#[derive(Debug, Clone)]
enum Deferred {
    Create(Shape),
    Update(Shape),
}

/// Ordered, id-keyed collection of shapes.
///
/// Iteration order is insertion order, which is also the draw order.
#[derive(Debug, Default)]
pub struct ShapeStore {
    entries: Vec<StoredShape>,
    index: HashMap<ShapeId, usize>,
    /// Live events buffered while a replay is outstanding.
    deferred: Option<Vec<Deferred>>,
    dirty: bool,
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shapes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.entries.iter().map(|e| &e.shape)
    }

    /// Shapes with their sync state, in insertion order.
    pub fn entries(&self) -> &[StoredShape] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.index.get(id).map(|&i| &self.entries[i].shape)
    }

    /// Mutable access to a stored shape. Marks the store dirty.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Shape> {
        let &i = self.index.get(id)?;
        self.dirty = true;
        Some(&mut self.entries[i].shape)
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.index.get(id).map(|&i| self.entries[i].sync)
    }

    /// Whether a replay is outstanding.
    pub fn is_replaying(&self) -> bool {
        self.deferred.is_some()
    }

    /// Return and clear the redraw flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Drop everything, including any outstanding replay.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.deferred = None;
        self.dirty = true;
    }

    /// Apply a remote create. Inserts if the id is new, overwrites in place if
    /// it is already present, so repeated delivery never duplicates an id.
    pub fn apply_create(&mut self, shape: Shape) {
        if let Some(deferred) = self.deferred.as_mut() {
            deferred.push(Deferred::Create(shape));
            return;
        }
        self.upsert(shape, SyncState::Committed);
    }

    /// Apply a remote update. Unknown ids are ignored.
    /// Returns whether a stored shape changed.
    pub fn apply_update(&mut self, shape: Shape) -> bool {
        if let Some(deferred) = self.deferred.as_mut() {
            deferred.push(Deferred::Update(shape));
            return false;
        }
        let Some(&i) = shape.id().and_then(|id| self.index.get(id)) else {
            log::debug!("Ignoring update for unknown shape {:?}", shape.id());
            return false;
        };
        self.entries[i].shape = shape;
        self.dirty = true;
        true
    }

    /// Insert a locally drawn shape immediately, before the server sees it.
    pub fn local_create(&mut self, shape: Shape) {
        self.upsert(shape, SyncState::Pending);
    }

    /// Record that the server dropped a create. The shape is kept.
    pub fn mark_rejected(&mut self, id: &str, reason: DropReason) {
        if let Some(&i) = self.index.get(id) {
            self.entries[i].sync = SyncState::Rejected(reason);
            self.dirty = true;
        }
    }

    /// Start buffering live events until [`ShapeStore::finish_replay`].
    pub fn begin_replay(&mut self) {
        if self.deferred.is_none() {
            self.deferred = Some(Vec::new());
        }
    }

    /// Materialize the store from replayed rows (newest first, as listed by
    /// the server), then apply any live events buffered meanwhile.
    ///
    /// Local shapes still pending are kept after the replayed ones.
    pub fn finish_replay(&mut self, records: Vec<ShapeRecord>) {
        let deferred = self.deferred.take().unwrap_or_default();
        let pending: Vec<StoredShape> = self
            .entries
            .drain(..)
            .filter(|e| e.sync == SyncState::Pending)
            .collect();
        self.index.clear();

        // Oldest first gives a stable draw order.
        for record in records.into_iter().rev() {
            match record.shape() {
                Ok(shape) => self.upsert(shape, SyncState::Committed),
                Err(e) => log::warn!("Skipping undecodable replay row {}: {}", record.id, e),
            }
        }
        for entry in pending {
            let known = entry.shape.id().is_some_and(|id| self.index.contains_key(id));
            if !known {
                self.upsert(entry.shape, SyncState::Pending);
            }
        }
        for event in deferred {
            match event {
                Deferred::Create(shape) => self.apply_create(shape),
                Deferred::Update(shape) => {
                    self.apply_update(shape);
                }
            }
        }
        self.dirty = true;
    }

    fn upsert(&mut self, shape: Shape, sync: SyncState) {
        self.dirty = true;
        let Some(id) = shape.id().map(str::to_string) else {
            self.entries.push(StoredShape { shape, sync });
            return;
        };
        match self.index.get(&id) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.shape = shape;
                // An echo of our own create confirms it; never downgrade.
                if sync == SyncState::Committed || entry.sync != SyncState::Committed {
                    entry.sync = sync;
                }
            }
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(StoredShape { shape, sync });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Eraser, Rect};
    use kurbo::Point;

    fn rect(id: &str, x: f64) -> Shape {
        let mut r = Rect::new(Point::new(x, 10.0), 50.0, 30.0, "black");
        r.id = id.to_string();
        Shape::Rect(r)
    }

    fn record(shape: &Shape) -> ShapeRecord {
        ShapeRecord::from_shape("abc", "u1", shape).unwrap()
    }

    #[test]
    fn test_duplicate_create_is_idempotent() {
        let mut store = ShapeStore::new();
        store.apply_create(rect("r1", 10.0));
        store.apply_create(rect("r1", 10.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_overwrites_in_place() {
        let mut store = ShapeStore::new();
        store.apply_create(rect("r1", 10.0));
        store.apply_create(rect("r2", 20.0));
        store.apply_create(rect("r1", 99.0));
        let ids: Vec<_> = store.iter().filter_map(|s| s.id()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(store.get("r1"), Some(&rect("r1", 99.0)));
    }

    #[test]
    fn test_update_without_create_is_noop() {
        let mut store = ShapeStore::new();
        store.apply_create(rect("r1", 10.0));
        assert!(!store.apply_update(rect("ghost", 0.0)));
        assert_eq!(store.len(), 1);
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn test_update_replaces_geometry() {
        let mut store = ShapeStore::new();
        store.apply_create(rect("r1", 10.0));
        assert!(store.apply_update(rect("r1", 40.0)));
        assert_eq!(store.get("r1"), Some(&rect("r1", 40.0)));
    }

    #[test]
    fn test_local_create_pending_then_committed_by_echo() {
        let mut store = ShapeStore::new();
        store.local_create(rect("r1", 10.0));
        assert_eq!(store.sync_state("r1"), Some(SyncState::Pending));
        store.apply_create(rect("r1", 10.0));
        assert_eq!(store.sync_state("r1"), Some(SyncState::Committed));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejected_shape_is_kept() {
        let mut store = ShapeStore::new();
        store.local_create(rect("r1", 10.0));
        store.mark_rejected("r1", DropReason::RoomNotFound);
        assert_eq!(
            store.sync_state("r1"),
            Some(SyncState::Rejected(DropReason::RoomNotFound))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erasers_without_id_always_append() {
        let mut store = ShapeStore::new();
        let mark = Shape::Eraser(Eraser::at(Point::new(1.0, 1.0)));
        store.apply_create(mark.clone());
        store.apply_create(mark);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replay_orders_oldest_first() {
        let mut store = ShapeStore::new();
        store.begin_replay();
        let newest_first = vec![record(&rect("r3", 3.0)), record(&rect("r2", 2.0)), record(&rect("r1", 1.0))];
        store.finish_replay(newest_first);
        let ids: Vec<_> = store.iter().filter_map(|s| s.id()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert!(!store.is_replaying());
    }

    #[test]
    fn test_live_events_wait_for_replay() {
        let mut store = ShapeStore::new();
        store.begin_replay();
        store.apply_create(rect("live", 5.0));
        // Update for a shape only the replay knows about.
        store.apply_update(rect("r1", 77.0));
        assert!(store.is_empty());

        store.finish_replay(vec![record(&rect("r1", 1.0))]);

        let ids: Vec<_> = store.iter().filter_map(|s| s.id()).collect();
        assert_eq!(ids, vec!["r1", "live"]);
        assert_eq!(store.get("r1"), Some(&rect("r1", 77.0)));
    }

    #[test]
    fn test_replay_keeps_pending_local_shapes() {
        let mut store = ShapeStore::new();
        store.begin_replay();
        let circle = Shape::Circle(Circle::new(Point::new(0.0, 0.0), 5.0, "red"));
        let circle_id = circle.id().unwrap().to_string();
        store.local_create(circle);
        store.finish_replay(vec![record(&rect("r1", 1.0))]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.sync_state(&circle_id), Some(SyncState::Pending));
    }

    #[test]
    fn test_replay_skips_bad_rows() {
        let mut store = ShapeStore::new();
        store.begin_replay();
        let bad = ShapeRecord {
            id: "bad".into(),
            room_id: "abc".into(),
            user_id: "u1".into(),
            message: "{not json".into(),
        };
        store.finish_replay(vec![bad, record(&rect("r1", 1.0))]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_mut_marks_dirty() {
        let mut store = ShapeStore::new();
        store.apply_create(rect("r1", 10.0));
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
        if let Some(shape) = store.get_mut("r1") {
            shape.translate(kurbo::Vec2::new(1.0, 0.0));
        }
        assert!(store.take_dirty());
    }
}
