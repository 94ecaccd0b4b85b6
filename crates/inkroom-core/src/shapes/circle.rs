//! Circle shape.

use super::{ShapeId, ShapeTrait, default_color, generate_id};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// A circle given by its center and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub id: ShapeId,
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    pub radius: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Circle {
    /// Create a new circle with a fresh id.
    pub fn new(center: Point, radius: f64, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            x: center.x,
            y: center.y,
            radius,
            color: color.into(),
        }
    }

    /// Circle tool: the drag box's larger side is the diameter, anchored at
    /// the drag start.
    pub fn from_drag(start: Point, end: Point, color: impl Into<String>) -> Self {
        let radius = (end.x - start.x).max(end.y - start.y) / 2.0;
        Self::new(Point::new(start.x + radius, start.y + radius), radius.abs(), color)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl ShapeTrait for Circle {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn bounds(&self) -> kurbo::Rect {
        kurbo::Rect::new(
            self.x - self.radius,
            self.y - self.radius,
            self.x + self.radius,
            self.y + self.radius,
        )
    }

    fn hit_test(&self, point: Point) -> bool {
        self.center().distance(point) < self.radius
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}
