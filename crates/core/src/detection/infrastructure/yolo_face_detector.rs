/// YOLO face-pose detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing, and
/// yields face boxes with their five visible keypoints.
use std::path::Path;

use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::face_box::{BoundingBox, Point};
use crate::shared::frame::Frame;

use super::execution_provider::build_session;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoints per detection (5 landmarks × 3 values each: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct YoloFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl YoloFaceDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, ort::Error> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    /// Detects faces, returning box, score and visible keypoints in frame
    /// coordinates. Descriptor and attributes are left empty.
    pub fn detect(
        &mut self,
        frame: &Frame,
        with_landmarks: bool,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // [1, features, detections] when transposed, else [1, detections, features]
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(det) = parse_row(&row, self.confidence, scale, pad_x, pad_y) {
                raw_dets.push(det);
            }
        }

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(kept
            .into_iter()
            .map(|d| {
                let mut obs = FaceObservation::new(d.bbox, d.confidence);
                if with_landmarks {
                    obs.landmarks = d.keypoints;
                }
                obs
            })
            .collect())
    }
}

/// Parses one output row `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`,
/// mapping letterbox coordinates back to the original frame.
fn parse_row(row: &[f32], min_conf: f64, scale: f64, pad_x: u32, pad_y: u32) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_conf {
        return None;
    }

    let unletterbox = |x: f64, y: f64| ((x - pad_x as f64) / scale, (y - pad_y as f64) / scale);

    let cx = row[0] as f64;
    let cy = row[1] as f64;
    let w = row[2] as f64;
    let h = row[3] as f64;
    let (x1, y1) = unletterbox(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = unletterbox(cx + w / 2.0, cy + h / 2.0);

    let mut keypoints = Vec::new();
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        for k in 0..5 {
            let kconf = row[5 + k * 3 + 2] as f64;
            if kconf >= KEYPOINT_CONF_THRESH {
                let (kx, ky) = unletterbox(row[5 + k * 3] as f64, row[5 + k * 3 + 1] as f64);
                keypoints.push(Point::new(kx, ky));
            }
        }
    }

    Some(RawDetection {
        bbox: BoundingBox::from_corners(x1, y1, x2, y2),
        confidence: conf,
        keypoints,
    })
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: BoundingBox,
    confidence: f64,
    keypoints: Vec<Point>,
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            bbox: BoundingBox::from_corners(x1, y1, x2, y2),
            confidence,
            keypoints: Vec::new(),
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 640x480 camera frame: scale 1.0, no horizontal pad, 80px vertical pad
        let frame = Frame::new(vec![128u8; 640 * 480 * 3], 640, 480, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(scale, 1.0);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 80);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_parse_row_maps_back_to_frame() {
        // Box centered at (320, 320) in letterbox space, 80px vertical pad
        let mut row = vec![320.0, 320.0, 100.0, 60.0, 0.9];
        row.extend_from_slice(&[300.0, 300.0, 0.9, 340.0, 300.0, 0.9, 320.0, 320.0, 0.2]);
        row.extend_from_slice(&[305.0, 340.0, 0.8, 335.0, 340.0, 0.8]);

        let det = parse_row(&row, 0.5, 1.0, 0, 80).unwrap();

        assert_eq!(det.bbox, BoundingBox::new(270.0, 210.0, 100.0, 60.0));
        assert_relative_eq!(det.confidence, 0.9, epsilon = 1e-6);
        // Nose keypoint is below the visibility threshold
        assert_eq!(det.keypoints.len(), 4);
        assert_eq!(det.keypoints[0], Point::new(300.0, 220.0));
    }

    #[test]
    fn test_parse_row_rejects_low_confidence() {
        let row = vec![320.0, 320.0, 100.0, 60.0, 0.3];
        assert!(parse_row(&row, 0.5, 1.0, 0, 0).is_none());
    }

    #[test]
    fn test_parse_row_rejects_short_row() {
        assert!(parse_row(&[1.0, 2.0, 3.0], 0.0, 1.0, 0, 0).is_none());
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![raw(0.0, 0.0, 100.0, 100.0, 0.8), raw(5.0, 5.0, 105.0, 105.0, 0.9)];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let mut dets = vec![raw(0.0, 0.0, 50.0, 50.0, 0.9), raw(200.0, 200.0, 250.0, 250.0, 0.8)];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        let mut dets: Vec<RawDetection> = Vec::new();
        assert!(nms(&mut dets, 0.3).is_empty());
    }
}
