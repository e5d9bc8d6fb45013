use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::face_box::BoundingBox;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `bbox` (clamped to the frame) into a new frame.
    ///
    /// Returns `None` when the clamped box has no area.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let clamped = bbox.clamped(self.width, self.height);
        let x1 = clamped.x.floor() as usize;
        let y1 = clamped.y.floor() as usize;
        let x2 = (clamped.right().ceil() as usize).min(self.width as usize);
        let y2 = (clamped.bottom().ceil() as usize).min(self.height as usize);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let row_len = self.width as usize * channels;
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);
        for row in y1..y2 {
            let start = row * row_len + x1 * channels;
            let end = row * row_len + x2 * channels;
            data.extend_from_slice(&self.data[start..end]);
        }

        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        ))
    }

    /// Nearest-neighbor resize, keeping the frame index.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.is_empty() {
            let len = width as usize * height as usize * self.channels as usize;
            return Frame::new(vec![0; len], width, height, self.channels, self.index);
        }
        let channels = self.channels as usize;
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let mut data = Vec::with_capacity(width as usize * height as usize * channels);
        for y in 0..height as usize {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / height as f64) as usize).min(src_h - 1);
            for x in 0..width as usize {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / width as f64) as usize).min(src_w - 1);
                let offset = (src_y * src_w + src_x) * channels;
                data.extend_from_slice(&self.data[offset..offset + channels]);
            }
        }
        Frame::new(data, width, height, self.channels, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_empty());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let frame = gradient(4, 3);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[3, 4, 3]);
        assert_eq!(arr[[2, 1, 0]], 1);
        assert_eq!(arr[[2, 1, 1]], 2);
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient(10, 10);
        let crop = frame.crop(&BoundingBox::new(2.0, 3.0, 4.0, 5.0)).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 5);
        assert_eq!(crop.index(), 7);
        assert_eq!(crop.as_ndarray()[[0, 0, 0]], 2);
        assert_eq!(crop.as_ndarray()[[0, 0, 1]], 3);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = gradient(10, 10);
        let crop = frame.crop(&BoundingBox::new(-5.0, 8.0, 10.0, 10.0)).unwrap();
        assert_eq!(crop.width(), 5);
        assert_eq!(crop.height(), 2);
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = gradient(10, 10);
        assert!(frame.crop(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn test_resized_dimensions_and_index() {
        let frame = gradient(8, 6);
        let resized = frame.resized(4, 3);
        assert_eq!(resized.width(), 4);
        assert_eq!(resized.height(), 3);
        assert_eq!(resized.index(), 7);
        assert_eq!(resized.data().len(), 4 * 3 * 3);
    }

    #[test]
    fn test_resized_same_size_is_identical() {
        let frame = gradient(5, 5);
        assert_eq!(frame.resized(5, 5).data(), frame.data());
    }
}
