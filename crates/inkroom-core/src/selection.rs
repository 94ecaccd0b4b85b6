//! Hit-testing, selection handles and drag/resize manipulation.

use crate::shapes::{Circle, Rect, Shape, ShapeId};
use crate::viewport::Viewport;
use kurbo::{Point, Vec2};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 16.0;
/// Gap between a shape's box and its handles, in screen pixels. Handles sit
/// half of this outside the box.
pub const HANDLE_PADDING: f64 = 10.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Corner handle of a rectangle.
    Corner(Corner),
    /// Edge midpoint handle of a rectangle.
    Edge(Edge),
    /// The single handle on a circle's outline.
    Radius,
}

/// A selection handle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Centre of the handle square, in screen pixels.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Whether a screen point falls inside this handle's square.
    pub fn contains(&self, screen_point: Point) -> bool {
        let half = HANDLE_SIZE / 2.0;
        (screen_point.x - self.position.x).abs() <= half
            && (screen_point.y - self.position.y).abs() <= half
    }
}

/// Find the shape under a world point.
///
/// Shapes are tested in the order given (store insertion order) and the
/// first match wins, so an older shape beats a newer one drawn on top.
pub fn shape_at<'a, I>(shapes: I, world_point: Point) -> Option<&'a Shape>
where
    I: IntoIterator<Item = &'a Shape>,
{
    shapes.into_iter().find(|shape| shape.hit_test(world_point))
}

/// Get the selection handles for a shape, in screen space.
pub fn get_handles(shape: &Shape, viewport: &Viewport) -> Vec<Handle> {
    match shape {
        Shape::Rect(rect) => rect_handles(rect, viewport),
        Shape::Circle(circle) => {
            let center = viewport.world_to_screen(circle.center());
            let radius = circle_handle_radius(circle, viewport);
            vec![Handle::new(
                Point::new(center.x + radius, center.y),
                HandleKind::Radius,
            )]
        }
        Shape::Pen(_) | Shape::Line(_) | Shape::Triangle(_) | Shape::Eraser(_) => Vec::new(),
    }
}

fn rect_handles(rect: &Rect, viewport: &Viewport) -> Vec<Handle> {
    let bounds = rect.normalized();
    let tl = viewport.world_to_screen(Point::new(bounds.x0, bounds.y0));
    let br = viewport.world_to_screen(Point::new(bounds.x1, bounds.y1));
    let pad = HANDLE_PADDING / 2.0;
    let (left, top, right, bottom) = (tl.x - pad, tl.y - pad, br.x + pad, br.y + pad);
    let mid_x = (tl.x + br.x) / 2.0;
    let mid_y = (tl.y + br.y) / 2.0;

    vec![
        Handle::new(Point::new(left, top), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(Point::new(right, top), HandleKind::Corner(Corner::TopRight)),
        Handle::new(Point::new(left, bottom), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(Point::new(right, bottom), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(Point::new(mid_x, top), HandleKind::Edge(Edge::Top)),
        Handle::new(Point::new(right, mid_y), HandleKind::Edge(Edge::Right)),
        Handle::new(Point::new(mid_x, bottom), HandleKind::Edge(Edge::Bottom)),
        Handle::new(Point::new(left, mid_y), HandleKind::Edge(Edge::Left)),
    ]
}

/// Screen radius of the padded circle the radius handle sits on.
fn circle_handle_radius(circle: &Circle, viewport: &Viewport) -> f64 {
    circle.radius * viewport.scale + HANDLE_PADDING / 2.0
}

/// Find which handle (if any) is under a screen point.
pub fn hit_test_handles(shape: &Shape, viewport: &Viewport, screen_point: Point) -> Option<HandleKind> {
    match shape {
        Shape::Circle(circle) => {
            let center = viewport.world_to_screen(circle.center());
            let radius = circle_handle_radius(circle, viewport);
            let off_ring = (center.distance(screen_point) - radius).abs();
            (off_ring <= HANDLE_SIZE / 2.0).then_some(HandleKind::Radius)
        }
        _ => get_handles(shape, viewport)
            .into_iter()
            .find(|handle| handle.contains(screen_point))
            .map(|handle| handle.kind),
    }
}

/// Resize a shape by dragging one of its handles to a world point.
pub fn apply_resize(shape: &mut Shape, handle: HandleKind, world_point: Point) {
    match (shape, handle) {
        (Shape::Rect(rect), HandleKind::Corner(_) | HandleKind::Edge(_)) => {
            let mut b = rect.normalized();
            match handle {
                HandleKind::Corner(Corner::TopLeft) => (b.x0, b.y0) = (world_point.x, world_point.y),
                HandleKind::Corner(Corner::TopRight) => (b.x1, b.y0) = (world_point.x, world_point.y),
                HandleKind::Corner(Corner::BottomLeft) => (b.x0, b.y1) = (world_point.x, world_point.y),
                HandleKind::Corner(Corner::BottomRight) => (b.x1, b.y1) = (world_point.x, world_point.y),
                HandleKind::Edge(Edge::Top) => b.y0 = world_point.y,
                HandleKind::Edge(Edge::Right) => b.x1 = world_point.x,
                HandleKind::Edge(Edge::Bottom) => b.y1 = world_point.y,
                HandleKind::Edge(Edge::Left) => b.x0 = world_point.x,
                HandleKind::Radius => {}
            }
            rect.x = b.x0;
            rect.y = b.y0;
            rect.width = b.x1 - b.x0;
            rect.height = b.y1 - b.y0;
        }
        (Shape::Circle(circle), HandleKind::Radius) => {
            circle.radius = circle.center().distance(world_point);
        }
        _ => {}
    }
}

/// What a drag is doing to its shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragMode {
    /// Moving the whole shape; `last` is the previous pointer position (world).
    Move { last: Point },
    /// Dragging a resize handle.
    Resize(HandleKind),
}

/// State of an active manipulation of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Manipulation {
    pub shape_id: ShapeId,
    pub mode: DragMode,
}

impl Manipulation {
    pub fn moving(shape_id: ShapeId, start: Point) -> Self {
        Self {
            shape_id,
            mode: DragMode::Move { last: start },
        }
    }

    pub fn resizing(shape_id: ShapeId, handle: HandleKind) -> Self {
        Self {
            shape_id,
            mode: DragMode::Resize(handle),
        }
    }

    /// Apply the pointer's new world position to the shape in place.
    pub fn update(&mut self, shape: &mut Shape, world_point: Point) {
        match &mut self.mode {
            DragMode::Move { last } => {
                let delta: Vec2 = world_point - *last;
                shape.translate(delta);
                *last = world_point;
            }
            DragMode::Resize(handle) => apply_resize(shape, *handle, world_point),
        }
    }
}
