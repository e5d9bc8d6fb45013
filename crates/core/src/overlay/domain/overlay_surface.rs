use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::face_box::{BoundingBox, Point};

/// RGBA draw color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const CYAN: Color = Color::rgb(0, 200, 255);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// One recorded drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Box {
        bbox: BoundingBox,
        label: String,
        color: Color,
    },
    Points {
        points: Vec<Point>,
        color: Color,
    },
    Text {
        lines: Vec<String>,
        anchor: Point,
        color: Color,
    },
}

/// A drawing target aligned with the displayed frame.
///
/// Coordinates are in display space (see [`DisplayGeometry`]).
pub trait OverlaySurface: Send {
    fn geometry(&self) -> DisplayGeometry;

    /// Erases everything drawn since the last clear.
    fn clear(&mut self);

    /// Outlines `bbox` with `label` drawn in a bar along its top edge.
    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, color: Color);

    fn draw_points(&mut self, points: &[Point], color: Color);

    /// Draws a text field whose top-left corner sits at `anchor`.
    fn draw_text(&mut self, lines: &[String], anchor: Point, color: Color);
}

/// Lets a surface be drawn by the scheduler thread while another owner
/// (e.g. the CLI exporting snapshots) keeps a handle to it.
impl<S: OverlaySurface> OverlaySurface for std::sync::Arc<std::sync::Mutex<S>> {
    fn geometry(&self) -> DisplayGeometry {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .geometry()
    }

    fn clear(&mut self) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, color: Color) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .draw_box(bbox, label, color);
    }

    fn draw_points(&mut self, points: &[Point], color: Color) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .draw_points(points, color);
    }

    fn draw_text(&mut self, lines: &[String], anchor: Point, color: Color) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .draw_text(lines, anchor, color);
    }
}
