/// FER+ expression classifier over a 64×64 grayscale crop.
use std::path::Path;

use crate::detection::domain::face_observation::{Expression, Expressions};
use crate::detection::infrastructure::face_crop::{gray_tensor, softmax, square_crop};
use crate::shared::face_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;

const INPUT_SIZE: usize = 64;
const CROP_SCALE: f64 = 1.2;

/// FER+ output order. `None` marks classes the overlay has no label for.
const CLASS_ORDER: [Option<Expression>; 8] = [
    Some(Expression::Neutral),
    Some(Expression::Happy),
    Some(Expression::Surprised),
    Some(Expression::Sad),
    Some(Expression::Angry),
    Some(Expression::Disgusted),
    Some(Expression::Fearful),
    None, // contempt
];

pub struct ExpressionClassifier {
    session: ort::session::Session,
}

impl ExpressionClassifier {
    pub fn new(model_path: &Path) -> Result<Self, ort::Error> {
        Ok(Self {
            session: build_session(model_path)?,
        })
    }

    pub fn classify(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<Option<Expressions>, Box<dyn std::error::Error>> {
        let Some(crop) = square_crop(frame, bbox, CROP_SCALE) else {
            return Ok(None);
        };
        let tensor = gray_tensor(&crop, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let logits = output.as_slice().ok_or("Cannot get expression slice")?;
        Ok(decode(logits))
    }
}

fn decode(logits: &[f32]) -> Option<Expressions> {
    if logits.len() < CLASS_ORDER.len() {
        return None;
    }
    let probs = softmax(&logits[..CLASS_ORDER.len()]);
    Some(Expressions::new(
        CLASS_ORDER
            .iter()
            .zip(probs)
            .filter_map(|(class, p)| class.map(|e| (e, p))),
    ))
}
