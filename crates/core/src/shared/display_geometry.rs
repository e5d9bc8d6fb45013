use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH};

/// Fixed output resolution shared by the video source, the scheduler and
/// the overlay so detection and drawing coordinates stay aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale factors mapping `source_width x source_height` coordinates onto
    /// this geometry.
    pub fn scale_from(&self, source_width: u32, source_height: u32) -> (f64, f64) {
        if source_width == 0 || source_height == 0 {
            return (1.0, 1.0);
        }
        (
            self.width as f64 / source_width as f64,
            self.height as f64 / source_height as f64,
        )
    }
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_WIDTH, DEFAULT_DISPLAY_HEIGHT)
    }
}

impl std::fmt::Display for DisplayGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_vga() {
        assert_eq!(DisplayGeometry::default(), DisplayGeometry::new(640, 480));
    }

    #[test]
    fn test_scale_from_larger_source() {
        let (sx, sy) = DisplayGeometry::new(640, 480).scale_from(1280, 960);
        assert_relative_eq!(sx, 0.5);
        assert_relative_eq!(sy, 0.5);
    }

    #[test]
    fn test_scale_from_zero_source_is_identity() {
        assert_eq!(DisplayGeometry::default().scale_from(0, 480), (1.0, 1.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(DisplayGeometry::new(320, 240).to_string(), "320x240");
    }
}
