use std::path::Path;

use crate::shared::frame::Frame;

/// Fetches a reference identity image as an RGB frame.
pub trait ReferenceImageLoader: Send {
    fn load(&self, source: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}
