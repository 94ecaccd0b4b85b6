//! Viewport module for pan/zoom transforms.
//!
//! `screen = world * scale + offset`. The viewport is purely local state and
//! never travels over the wire.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest allowed scale.
pub const MIN_SCALE: f64 = 0.1;
/// Largest allowed scale.
pub const MAX_SCALE: f64 = 10.0;

/// Viewport manages the view transform for one client.
///
/// It handles panning (translation) and zooming (scaling) operations,
/// converting between screen coordinates and world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current translation offset (pan), in screen pixels.
    pub offset: Vec2,
    /// Current scale factor.
    pub scale: f64,
    /// Minimum allowed scale.
    pub min_scale: f64,
    /// Maximum allowed scale.
    pub max_scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
        }
    }
}

impl Viewport {
    /// Create a new viewport with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the affine transform for rendering (world to screen).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Get the inverse transform for input handling (screen to world).
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Convert a pointer displacement in screen pixels to world units.
    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        delta / self.scale
    }

    /// Pan the viewport by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom by `ratio`, keeping the world point under `anchor` fixed.
    ///
    /// When the resulting scale is clamped, only the ratio actually applied
    /// moves the offset. Ratios that are not finite and positive are ignored.
    pub fn zoom_at(&mut self, anchor: Point, ratio: f64) {
        if !(ratio.is_finite() && ratio > 0.0) {
            return;
        }
        let new_scale = (self.scale * ratio).clamp(self.min_scale, self.max_scale);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }
        let applied = new_scale / self.scale;
        let anchor = anchor.to_vec2();
        self.offset = anchor - (anchor - self.offset) * applied;
        self.scale = new_scale;
    }

    /// Reset to the identity transform.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::new();
        assert_eq!(viewport.offset, Vec2::ZERO);
        assert!((viewport.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_with_offset_and_scale() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(50.0, 100.0);
        viewport.scale = 2.0;
        let world = viewport.screen_to_world(Point::new(150.0, 300.0));
        assert!((world.x - 50.0).abs() < EPS);
        assert!((world.y - 100.0).abs() < EPS);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(30.0, -20.0);
        viewport.scale = 1.5;

        let original = Point::new(123.0, 456.0);
        let back = viewport.world_to_screen(viewport.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(12.0, -7.0);
        let anchor = Point::new(200.0, 150.0);
        let before = viewport.screen_to_world(anchor);

        viewport.zoom_at(anchor, 1.25);

        let after = viewport.screen_to_world(anchor);
        assert!((before.x - after.x).abs() < EPS);
        assert!((before.y - after.y).abs() < EPS);
        assert!((viewport.scale - 1.25).abs() < EPS);
    }

    #[test]
    fn test_zoom_in_then_out_restores() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(40.0, 25.0);
        viewport.scale = 0.8;
        let original = viewport.clone();
        let anchor = Point::new(320.0, 240.0);

        viewport.zoom_at(anchor, 1.7);
        viewport.zoom_at(anchor, 1.0 / 1.7);

        assert!((viewport.scale - original.scale).abs() < EPS);
        assert!((viewport.offset.x - original.offset.x).abs() < EPS);
        assert!((viewport.offset.y - original.offset.y).abs() < EPS);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut viewport = Viewport::new();
        viewport.zoom_at(Point::ZERO, 0.001);
        assert!((viewport.scale - viewport.min_scale).abs() < f64::EPSILON);

        viewport.scale = 1.0;
        viewport.zoom_at(Point::ZERO, 1000.0);
        assert!((viewport.scale - viewport.max_scale).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clamped_zoom_still_keeps_anchor() {
        let mut viewport = Viewport::new();
        let anchor = Point::new(100.0, 100.0);
        let before = viewport.screen_to_world(anchor);
        viewport.zoom_at(anchor, 50.0);
        let after = viewport.screen_to_world(anchor);
        assert!((before.x - after.x).abs() < EPS);
        assert!((before.y - after.y).abs() < EPS);
    }

    #[test]
    fn test_zoom_ignores_degenerate_ratios() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(5.0, 6.0);
        viewport.scale = 2.0;
        let before = viewport.clone();
        for ratio in [f64::NAN, f64::INFINITY, 0.0, -1.5] {
            viewport.zoom_at(Point::new(10.0, 10.0), ratio);
            assert_eq!(viewport.offset, before.offset);
            assert!((viewport.scale - before.scale).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_pan_and_delta() {
        let mut viewport = Viewport::new();
        viewport.pan(Vec2::new(10.0, 20.0));
        assert!((viewport.offset.x - 10.0).abs() < f64::EPSILON);
        assert!((viewport.offset.y - 20.0).abs() < f64::EPSILON);

        viewport.scale = 4.0;
        let delta = viewport.screen_delta_to_world(Vec2::new(8.0, -4.0));
        assert!((delta.x - 2.0).abs() < f64::EPSILON);
        assert!((delta.y + 1.0).abs() < f64::EPSILON);
    }
}
