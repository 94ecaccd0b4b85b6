//! Rectangle shape.

use super::{ShapeId, ShapeTrait, default_color, generate_id};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle anchored at its drawing origin.
///
/// `width`/`height` may be negative when the rectangle was dragged out
/// towards the top-left; [`Rect::normalized`] gives the covered area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub id: ShapeId,
    /// Origin x (where the drag started).
    pub x: f64,
    /// Origin y (where the drag started).
    pub y: f64,
    #[serde(rename = "Width")]
    pub width: f64,
    #[serde(rename = "Height")]
    pub height: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Rect {
    /// Create a new rectangle with a fresh id.
    pub fn new(origin: Point, width: f64, height: f64, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            x: origin.x,
            y: origin.y,
            width,
            height,
            color: color.into(),
        }
    }

    /// Create a rectangle from the two drag points, keeping the drag origin.
    pub fn from_drag(start: Point, end: Point, color: impl Into<String>) -> Self {
        Self::new(start, end.x - start.x, end.y - start.y, color)
    }

    /// The covered area with non-negative extent.
    pub fn normalized(&self) -> kurbo::Rect {
        kurbo::Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }
}

impl ShapeTrait for Rect {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn bounds(&self) -> kurbo::Rect {
        self.normalized()
    }

    /// Strictly inside: points on the border do not hit.
    fn hit_test(&self, point: Point) -> bool {
        let r = self.normalized();
        point.x > r.x0 && point.x < r.x1 && point.y > r.y0 && point.y < r.y1
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}
