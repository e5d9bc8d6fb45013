//! Crop and tensor helpers shared by the per-face classifier heads.

use crate::shared::face_box::BoundingBox;
use crate::shared::frame::Frame;

/// Square crop around `bbox`, enlarged by `scale`, clamped to the frame.
pub fn square_crop(frame: &Frame, bbox: &BoundingBox, scale: f64) -> Option<Frame> {
    frame.crop(&bbox.square_around(scale))
}

/// Resize an RGB crop to `size x size` and normalize to NCHW float32.
pub fn rgb_tensor(crop: &Frame, size: usize, mean: f32, std: f32) -> ndarray::Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let channels = crop.channels() as usize;
    let data = crop.data();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    if src_w == 0 || src_h == 0 || channels < 3 {
        return tensor;
    }

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * channels;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (data[offset + c] as f32 - mean) / std;
            }
        }
    }

    tensor
}

/// Resize an RGB crop to `size x size` luminance in `[0, 255]`, shape `[1, 1, size, size]`.
pub fn gray_tensor(crop: &Frame, size: usize) -> ndarray::Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let channels = crop.channels() as usize;
    let data = crop.data();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, size, size));
    if src_w == 0 || src_h == 0 || channels < 3 {
        return tensor;
    }

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * channels;
            let r = data[offset] as f32;
            let g = data[offset + 1] as f32;
            let b = data[offset + 2] as f32;
            tensor[[0, 0, y, x]] = 0.299 * r + 0.587 * g + 0.114 * b;
        }
    }

    tensor
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}
