//! Triangle shape.

use super::{ShapeId, ShapeTrait, default_color, generate_id, points_bounds};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// A triangle given by its three vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub id: ShapeId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub x3: f64,
    pub y3: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Triangle {
    pub fn new(a: Point, b: Point, c: Point, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            x1: a.x,
            y1: a.y,
            x2: b.x,
            y2: b.y,
            x3: c.x,
            y3: c.y,
            color: color.into(),
        }
    }

    /// Triangle tool: the drag start and end form the base, the apex is
    /// mirrored above the start by the drag height.
    pub fn from_drag(start: Point, end: Point, color: impl Into<String>) -> Self {
        let apex = Point::new(
            start.x + (end.x - start.x) / 2.0,
            start.y - (end.y - start.y),
        );
        Self::new(start, end, apex, color)
    }

    pub fn vertices(&self) -> [Point; 3] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x2, self.y2),
            Point::new(self.x3, self.y3),
        ]
    }

    /// Barycentric coordinates of `point`, or `None` for a degenerate triangle.
    pub fn barycentric(&self, point: Point) -> Option<(f64, f64, f64)> {
        let [a, b, c] = self.vertices();
        let v0 = c - a;
        let v1 = b - a;
        let v2 = point - a;
        let denom = v0.x * v1.y - v1.x * v0.y;
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let u = (v2.x * v1.y - v1.x * v2.y) / denom;
        let v = (v0.x * v2.y - v2.x * v0.y) / denom;
        Some((1.0 - u - v, v, u))
    }
}

impl ShapeTrait for Triangle {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn bounds(&self) -> kurbo::Rect {
        points_bounds(&self.vertices())
    }

    fn hit_test(&self, point: Point) -> bool {
        self.barycentric(point)
            .is_some_and(|(a, b, c)| a >= 0.0 && b >= 0.0 && c >= 0.0)
    }

    fn translate(&mut self, delta: Vec2) {
        self.x1 += delta.x;
        self.y1 += delta.y;
        self.x2 += delta.x;
        self.y2 += delta.y;
        self.x3 += delta.x;
        self.y3 += delta.y;
    }
}
