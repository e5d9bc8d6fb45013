use crate::overlay::domain::overlay_surface::{Color, DrawCommand, OverlaySurface};
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::face_box::{BoundingBox, Point};

/// Headless surface that records draw commands instead of rasterizing them.
pub struct DisplayListSurface {
    geometry: DisplayGeometry,
    commands: Vec<DrawCommand>,
    clear_count: usize,
}

impl DisplayListSurface {
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            commands: Vec::new(),
            clear_count: 0,
        }
    }

    /// Commands drawn since the last clear.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Box labels currently on the surface, in draw order.
    pub fn labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Box { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl OverlaySurface for DisplayListSurface {
    fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clear_count += 1;
    }

    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, color: Color) {
        self.commands.push(DrawCommand::Box {
            bbox: *bbox,
            label: label.to_string(),
            color,
        });
    }

    fn draw_points(&mut self, points: &[Point], color: Color) {
        self.commands.push(DrawCommand::Points {
            points: points.to_vec(),
            color,
        });
    }

    fn draw_text(&mut self, lines: &[String], anchor: Point, color: Color) {
        self.commands.push(DrawCommand::Text {
            lines: lines.to_vec(),
            anchor,
            color,
        });
    }
}
