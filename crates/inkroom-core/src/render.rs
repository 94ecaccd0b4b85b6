//! Renderer contract and redraw pacing.
//!
//! Pixel output is left to an external backend; the core only decides what a
//! frame contains and when a frame is due.

use std::time::{Duration, Instant};

use kurbo::Point;

use crate::protocol::UserId;
use crate::selection::Handle;
use crate::shapes::Shape;
use crate::store::StoredShape;
use crate::viewport::Viewport;

/// Default redraw interval (~60 frames per second).
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(16);

/// Everything a backend needs to draw one frame.
pub struct RenderContext<'a> {
    /// Shapes in draw order.
    pub shapes: &'a [StoredShape],
    pub viewport: &'a Viewport,
    /// Currently selected shape, if any.
    pub selected: Option<&'a Shape>,
    /// Handles of the selected shape, in screen space.
    pub handles: Vec<Handle>,
    /// Live remote cursors, in world space.
    pub cursors: Vec<(UserId, Point)>,
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Draw the ordered shape sequence through the viewport.
    fn render(&mut self, shapes: &[StoredShape], viewport: &Viewport);

    /// Draw the selection overlay for one shape.
    fn render_selection(&mut self, shape: &Shape, handles: &[Handle], viewport: &Viewport);

    /// Draw remote cursors. Backends without cursor overlays can ignore this.
    fn render_cursors(&mut self, _cursors: &[(UserId, Point)], _viewport: &Viewport) {}

    /// Draw a full frame.
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.render(ctx.shapes, ctx.viewport);
        if let Some(selected) = ctx.selected {
            self.render_selection(selected, &ctx.handles, ctx.viewport);
        }
        self.render_cursors(&ctx.cursors, ctx.viewport);
    }
}

/// Fixed-rate redraw loop driven by a dirty flag.
///
/// Events only mark the frame dirty; the host's timer asks
/// [`RedrawScheduler::should_redraw`] on every tick, so a burst of remote
/// updates still produces at most one frame per interval.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    interval: Duration,
    last_frame: Option<Instant>,
    pending: bool,
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(REDRAW_INTERVAL)
    }
}

impl RedrawScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_frame: None,
            pending: true,
        }
    }

    /// Request a redraw on the next due tick.
    pub fn mark_dirty(&mut self) {
        self.pending = true;
    }

    /// Call on every timer tick. `dirty` is OR-ed into the pending flag.
    /// Returns true when a frame should be drawn now.
    pub fn should_redraw(&mut self, now: Instant, dirty: bool) -> bool {
        self.pending |= dirty;
        if !self.pending {
            return false;
        }
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.pending = false;
        self.last_frame = Some(now);
        true
    }
}
