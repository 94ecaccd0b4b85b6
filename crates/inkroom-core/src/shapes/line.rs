//! Straight line shape.

use super::{ShapeId, ShapeTrait, default_color, generate_id, points_bounds};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// A straight line between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: ShapeId,
    #[serde(rename = "startX")]
    pub start_x: f64,
    #[serde(rename = "startY")]
    pub start_y: f64,
    #[serde(rename = "endX")]
    pub end_x: f64,
    #[serde(rename = "endY")]
    pub end_y: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Line {
    pub fn new(start: Point, end: Point, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            start_x: start.x,
            start_y: start.y,
            end_x: end.x,
            end_y: end.y,
            color: color.into(),
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }

    pub fn length(&self) -> f64 {
        self.start().distance(self.end())
    }
}

impl ShapeTrait for Line {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn bounds(&self) -> kurbo::Rect {
        points_bounds(&[self.start(), self.end()])
    }

    fn hit_test(&self, _point: Point) -> bool {
        false
    }

    fn translate(&mut self, delta: Vec2) {
        self.start_x += delta.x;
        self.start_y += delta.y;
        self.end_x += delta.x;
        self.end_y += delta.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_bounds() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0), "black");
        assert!((line.length() - 5.0).abs() < f64::EPSILON);
        assert_eq!(line.bounds(), kurbo::Rect::new(0.0, 0.0, 3.0, 4.0));
    }

    #[test]
    fn test_lines_are_not_selectable() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0), "black");
        assert!(!line.hit_test(Point::new(5.0, 0.0)));
    }
}
