//! Shape definitions for the shared drawing surface.
//!
//! Shapes travel over the wire as flat JSON objects tagged by `name`, with
//! the field spellings the drawing tools have always produced (`Width`,
//! `startx`, `startX`, ...). Each variant only carries the fields it needs.

mod circle;
mod eraser;
mod line;
mod pen;
mod rect;
mod triangle;

pub use circle::Circle;
pub use eraser::Eraser;
pub use line::Line;
pub use pen::Pen;
pub use rect::Rect;
pub use triangle::Triangle;

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for shapes. Generated by whichever client draws the shape.
pub type ShapeId = String;

/// Stroke color used when a tool has not picked one.
pub const DEFAULT_COLOR: &str = "black";

/// Generate a fresh, globally unique shape id.
pub fn generate_id() -> ShapeId {
    Uuid::new_v4().to_string()
}

pub(crate) fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Durable identifier, if the shape has one.
    fn id(&self) -> Option<&str>;

    /// Axis-aligned bounding box in world coordinates.
    fn bounds(&self) -> kurbo::Rect;

    /// Check if a world-space point selects this shape.
    fn hit_test(&self, point: Point) -> bool;

    /// Move the shape by a world-space delta.
    fn translate(&mut self, delta: Vec2);
}

/// Enum wrapper for all shape types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Shape {
    #[serde(rename = "rect")]
    Rect(Rect),
    #[serde(rename = "circle")]
    Circle(Circle),
    #[serde(rename = "pen")]
    Pen(Pen),
    #[serde(rename = "line")]
    Line(Line),
    #[serde(rename = "triangle")]
    Triangle(Triangle),
    #[serde(rename = "eraser")]
    Eraser(Eraser),
}

impl Shape {
    pub fn id(&self) -> Option<&str> {
        match self {
            Shape::Rect(s) => s.id(),
            Shape::Circle(s) => s.id(),
            Shape::Pen(s) => s.id(),
            Shape::Line(s) => s.id(),
            Shape::Triangle(s) => s.id(),
            Shape::Eraser(s) => s.id(),
        }
    }

    pub fn bounds(&self) -> kurbo::Rect {
        match self {
            Shape::Rect(s) => s.bounds(),
            Shape::Circle(s) => s.bounds(),
            Shape::Pen(s) => s.bounds(),
            Shape::Line(s) => s.bounds(),
            Shape::Triangle(s) => s.bounds(),
            Shape::Eraser(s) => s.bounds(),
        }
    }

    pub fn hit_test(&self, point: Point) -> bool {
        match self {
            Shape::Rect(s) => s.hit_test(point),
            Shape::Circle(s) => s.hit_test(point),
            Shape::Pen(s) => s.hit_test(point),
            Shape::Line(s) => s.hit_test(point),
            Shape::Triangle(s) => s.hit_test(point),
            Shape::Eraser(s) => s.hit_test(point),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Shape::Rect(s) => s.translate(delta),
            Shape::Circle(s) => s.translate(delta),
            Shape::Pen(s) => s.translate(delta),
            Shape::Line(s) => s.translate(delta),
            Shape::Triangle(s) => s.translate(delta),
            Shape::Eraser(s) => s.translate(delta),
        }
    }

    /// Whether the shape can be stored server-side. Eraser marks without an
    /// id are local-only.
    pub fn is_durable(&self) -> bool {
        self.id().is_some()
    }

    /// The wire tag for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Rect(_) => "rect",
            Shape::Circle(_) => "circle",
            Shape::Pen(_) => "pen",
            Shape::Line(_) => "line",
            Shape::Triangle(_) => "triangle",
            Shape::Eraser(_) => "eraser",
        }
    }
}

/// Bounding box of a set of points.
pub(crate) fn points_bounds(points: &[Point]) -> kurbo::Rect {
    let Some(first) = points.first() else {
        return kurbo::Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(kurbo::Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
}
