use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::overlay::domain::overlay_surface::{Color, OverlaySurface};
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::face_box::{BoundingBox, Point};
use crate::shared::frame::Frame;

const LINE_WIDTH: i64 = 2;
const POINT_RADIUS: i64 = 2;
const LINE_HEIGHT: i64 = 16;
const CHAR_WIDTH: i64 = 7;
const LABEL_BACKGROUND_ALPHA: u8 = 160;

/// Rasterizes overlay drawings onto a transparent RGBA canvas.
///
/// Boxes, landmark dots and label backgrounds are painted; label text is
/// kept as captions alongside the canvas rather than rendered as glyphs.
pub struct RasterSurface {
    geometry: DisplayGeometry,
    canvas: RgbaImage,
    captions: Vec<String>,
}

impl RasterSurface {
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            canvas: RgbaImage::new(geometry.width, geometry.height),
            captions: Vec::new(),
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Label and expression text drawn since the last clear.
    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    /// Alpha-blends the canvas over `frame`, resizing the frame to the
    /// surface geometry first when needed.
    pub fn composite(&self, frame: &Frame) -> Frame {
        let base = if frame.width() == self.geometry.width && frame.height() == self.geometry.height {
            frame.clone()
        } else {
            frame.resized(self.geometry.width, self.geometry.height)
        };

        let channels = base.channels() as usize;
        let index = base.index();
        let mut data = base.data().to_vec();
        for (x, y, pixel) in self.canvas.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            if alpha == 0 || channels < 3 {
                continue;
            }
            let offset = (y as usize * self.geometry.width as usize + x as usize) * channels;
            for c in 0..3 {
                let under = data[offset + c] as u32;
                data[offset + c] = ((pixel[c] as u32 * alpha + under * (255 - alpha)) / 255) as u8;
            }
        }
        Frame::new(data, self.geometry.width, self.geometry.height, base.channels(), index)
    }

    /// Writes `frame` with the overlay composited on top to an image file.
    pub fn save_composited(&self, frame: &Frame, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let composited = self.composite(frame);
        let img = image::RgbImage::from_raw(
            composited.width(),
            composited.height(),
            composited.data().to_vec(),
        )
        .ok_or("Frame is not a packed RGB image")?;
        img.save(path)?;
        Ok(())
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x < 0 || y < 0 || x >= self.geometry.width as i64 || y >= self.geometry.height as i64 {
            return;
        }
        self.canvas.put_pixel(x as u32, y as u32, color);
    }

    fn fill_rect(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgba<u8>) {
        let x1 = x1.max(0);
        let y1 = y1.max(0);
        let x2 = x2.min(self.geometry.width as i64);
        let y2 = y2.min(self.geometry.height as i64);
        for y in y1..y2 {
            for x in x1..x2 {
                self.put(x, y, color);
            }
        }
    }

    fn label_background(&mut self, x: i64, y: i64, lines: &[String], color: Color) {
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i64;
        let background = Rgba([color.r / 3, color.g / 3, color.b / 3, LABEL_BACKGROUND_ALPHA]);
        self.fill_rect(
            x,
            y,
            x + widest * CHAR_WIDTH + 4,
            y + lines.len() as i64 * LINE_HEIGHT,
            background,
        );
    }
}

impl OverlaySurface for RasterSurface {
    fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.captions.clear();
    }

    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, color: Color) {
        let rgba = Rgba(color.to_rgba());
        let x1 = bbox.x.round() as i64;
        let y1 = bbox.y.round() as i64;
        let x2 = bbox.right().round() as i64;
        let y2 = bbox.bottom().round() as i64;

        self.fill_rect(x1, y1, x2, y1 + LINE_WIDTH, rgba);
        self.fill_rect(x1, y2 - LINE_WIDTH, x2, y2, rgba);
        self.fill_rect(x1, y1, x1 + LINE_WIDTH, y2, rgba);
        self.fill_rect(x2 - LINE_WIDTH, y1, x2, y2, rgba);

        if !label.is_empty() {
            let lines = [label.to_string()];
            self.label_background(x1, y1 - LINE_HEIGHT, &lines, color);
            self.captions.push(label.to_string());
        }
    }

    fn draw_points(&mut self, points: &[Point], color: Color) {
        let rgba = Rgba(color.to_rgba());
        for point in points {
            let cx = point.x.round() as i64;
            let cy = point.y.round() as i64;
            for dy in -POINT_RADIUS..=POINT_RADIUS {
                for dx in -POINT_RADIUS..=POINT_RADIUS {
                    if dx * dx + dy * dy <= POINT_RADIUS * POINT_RADIUS {
                        self.put(cx + dx, cy + dy, rgba);
                    }
                }
            }
        }
    }

    fn draw_text(&mut self, lines: &[String], anchor: Point, color: Color) {
        if lines.is_empty() {
            return;
        }
        self.label_background(anchor.x.round() as i64, anchor.y.round() as i64, lines, color);
        self.captions.extend(lines.iter().cloned());
    }
}
