/// A 2D point in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Point {
        Point::new(self.x * sx, self.y * sy)
    }
}

/// Axis-aligned face box in frame pixel coordinates (top-left origin).
///
/// Coordinates stay fractional so rescaling between the capture resolution
/// and the display geometry does not accumulate rounding error.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x, self.bottom())
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> BoundingBox {
        BoundingBox::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }

    /// Intersection with the `[0, width) x [0, height)` frame rectangle.
    ///
    /// Boxes entirely outside the frame collapse to zero area.
    pub fn clamped(&self, width: u32, height: u32) -> BoundingBox {
        let fw = width as f64;
        let fh = height as f64;
        let x1 = self.x.clamp(0.0, fw);
        let y1 = self.y.clamp(0.0, fh);
        let x2 = self.right().clamp(0.0, fw);
        let y2 = self.bottom().clamp(0.0, fh);
        BoundingBox::from_corners(x1, y1, x2.max(x1), y2.max(y1))
    }

    /// Square box of side `max(width, height) * scale` centered on this box.
    pub fn square_around(&self, scale: f64) -> BoundingBox {
        let side = self.width.max(self.height) * scale;
        let c = self.center();
        BoundingBox::new(c.x - side / 2.0, c.y - side / 2.0, side, side)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}
