//! Cursor presence: outgoing throttling and the remote cursor table.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use kurbo::Point;

use crate::protocol::{Participant, UserId};

/// Minimum time between two transmitted cursor positions.
pub const CURSOR_THROTTLE: Duration = Duration::from_millis(50);
/// Minimum world-space displacement before a new position is transmitted.
pub const CURSOR_MIN_DISTANCE: f64 = 2.0;
/// Remote cursors not refreshed within this window are dropped.
pub const CURSOR_EXPIRY: Duration = Duration::from_secs(5);

/// Decides which local pointer samples are worth sending.
///
/// A sample is sent only when the throttle window has elapsed since the last
/// transmission *and* the pointer moved far enough. The first sample always
/// goes out.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    window: Duration,
    min_distance: f64,
    last_sent: Option<(Instant, Point)>,
}

impl Default for CursorThrottle {
    fn default() -> Self {
        Self::new(CURSOR_THROTTLE, CURSOR_MIN_DISTANCE)
    }
}

impl CursorThrottle {
    pub fn new(window: Duration, min_distance: f64) -> Self {
        Self {
            window,
            min_distance,
            last_sent: None,
        }
    }

    /// Feed a pointer sample in world coordinates. Returns the position to
    /// transmit, if any.
    pub fn sample(&mut self, world: Point, now: Instant) -> Option<Point> {
        if let Some((at, pos)) = self.last_sent {
            let elapsed = now.saturating_duration_since(at);
            if elapsed < self.window || pos.distance(world) <= self.min_distance {
                return None;
            }
        }
        self.last_sent = Some((now, world));
        Some(world)
    }

    /// Forget the last transmission, e.g. after leaving a room.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

/// Last known cursor of a remote participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteCursor {
    pub position: Point,
    pub updated: Instant,
}

/// Roster and live cursors of the other participants in a room.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    roster: Vec<UserId>,
    cursors: HashMap<UserId, RemoteCursor>,
    expiry: Duration,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(CURSOR_EXPIRY)
    }
}

impl PresenceTracker {
    pub fn new(expiry: Duration) -> Self {
        Self {
            roster: Vec::new(),
            cursors: HashMap::new(),
            expiry,
        }
    }

    /// Identities currently in the room, as last broadcast.
    pub fn roster(&self) -> &[UserId] {
        &self.roster
    }

    /// Replace the roster with the distinct identities of `participants`,
    /// sorted. Cursors of identities that left are dropped.
    pub fn set_roster(&mut self, participants: &[Participant]) {
        self.roster = participants
            .iter()
            .map(|p| p.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let roster = &self.roster;
        self.cursors.retain(|user, _| roster.contains(user));
    }

    /// Record a remote cursor position, replacing any previous one.
    pub fn update_cursor(&mut self, user_id: UserId, position: Point, now: Instant) {
        self.cursors.insert(user_id, RemoteCursor { position, updated: now });
    }

    /// Drop cursors older than the expiry window. Returns whether any went.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.cursors.len();
        let expiry = self.expiry;
        self.cursors
            .retain(|_, c| now.saturating_duration_since(c.updated) < expiry);
        self.cursors.len() != before
    }

    /// Live cursors at `now`.
    pub fn cursors(&self, now: Instant) -> impl Iterator<Item = (&UserId, &RemoteCursor)> {
        let expiry = self.expiry;
        self.cursors
            .iter()
            .filter(move |(_, c)| now.saturating_duration_since(c.updated) < expiry)
    }

    pub fn cursor(&self, user_id: &str, now: Instant) -> Option<&RemoteCursor> {
        self.cursors
            .get(user_id)
            .filter(|c| now.saturating_duration_since(c.updated) < self.expiry)
    }

    pub fn clear(&mut self) {
        self.roster.clear();
        self.cursors.clear();
    }
}
