//! Pen stroke segment.

use super::{ShapeId, ShapeTrait, default_color, generate_id, points_bounds};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// One segment of a freehand stroke.
///
/// The pen tool emits a new segment for every pointer sample, so a visible
/// stroke is a run of these sharing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    pub id: ShapeId,
    pub startx: f64,
    pub starty: f64,
    pub endx: f64,
    pub endy: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Pen {
    pub fn new(start: Point, end: Point, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            startx: start.x,
            starty: start.y,
            endx: end.x,
            endy: end.y,
            color: color.into(),
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.startx, self.starty)
    }

    pub fn end(&self) -> Point {
        Point::new(self.endx, self.endy)
    }
}

impl ShapeTrait for Pen {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn bounds(&self) -> kurbo::Rect {
        points_bounds(&[self.start(), self.end()])
    }

    // Strokes are not selectable.
    fn hit_test(&self, _point: Point) -> bool {
        false
    }

    fn translate(&mut self, delta: Vec2) {
        self.startx += delta.x;
        self.starty += delta.y;
        self.endx += delta.x;
        self.endy += delta.y;
    }
}
