use std::path::Path;

use crate::recognition::domain::reference_image_loader::ReferenceImageLoader;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Decodes reference images from disk with the `image` crate.
pub struct ImageFileLoader;

impl ImageFileLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceImageLoader for ImageFileLoader {
    fn load(&self, source: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let supported = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            return Err(format!("Unsupported reference image: {}", source.display()).into());
        }

        let img = image::open(source)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, 3, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::from_pixel(12, 8, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let frame = ImageFileLoader::new().load(&path).unwrap();

        assert_eq!(frame.width(), 12);
        assert_eq!(frame.height(), 8);
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageFileLoader::new().load(&dir.path().join("none.jpg")).is_err());
    }

    #[test]
    fn test_unsupported_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(ImageFileLoader::new().load(&path).is_err());
    }
}
