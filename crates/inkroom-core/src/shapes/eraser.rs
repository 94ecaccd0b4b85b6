//! Eraser mark.

use super::{ShapeId, ShapeTrait};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Default eraser square size in world units.
pub const DEFAULT_ERASER_SIZE: f64 = 20.0;

/// A square cleared area centred on `(x, y)`.
///
/// Eraser marks are usually ephemeral and carry no id; those are never
/// persisted and never deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eraser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ShapeId>,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_size")]
    pub size: f64,
}

fn default_size() -> f64 {
    DEFAULT_ERASER_SIZE
}

impl Eraser {
    /// An ephemeral eraser mark at `center`.
    pub fn at(center: Point) -> Self {
        Self {
            id: None,
            x: center.x,
            y: center.y,
            size: DEFAULT_ERASER_SIZE,
        }
    }
}

impl ShapeTrait for Eraser {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn bounds(&self) -> kurbo::Rect {
        let half = self.size / 2.0;
        kurbo::Rect::new(self.x - half, self.y - half, self.x + half, self.y + half)
    }

    fn hit_test(&self, _point: Point) -> bool {
        false
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}
