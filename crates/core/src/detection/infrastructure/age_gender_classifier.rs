/// InsightFace `genderage` head: `[female, male, age / 100]` from a 96×96 crop.
use std::path::Path;

use crate::detection::domain::face_observation::{Gender, GenderEstimate};
use crate::detection::infrastructure::face_crop::{rgb_tensor, softmax, square_crop};
use crate::shared::face_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;

const INPUT_SIZE: usize = 96;
const CROP_SCALE: f64 = 1.5;

pub struct AgeGenderClassifier {
    session: ort::session::Session,
}

impl AgeGenderClassifier {
    pub fn new(model_path: &Path) -> Result<Self, ort::Error> {
        Ok(Self {
            session: build_session(model_path)?,
        })
    }

    pub fn classify(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<Option<(f32, GenderEstimate)>, Box<dyn std::error::Error>> {
        let Some(crop) = square_crop(frame, bbox, CROP_SCALE) else {
            return Ok(None);
        };
        let tensor = rgb_tensor(&crop, INPUT_SIZE, 0.0, 1.0);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let values = output.as_slice().ok_or("Cannot get age/gender slice")?;
        Ok(decode(values))
    }
}

fn decode(values: &[f32]) -> Option<(f32, GenderEstimate)> {
    if values.len() < 3 {
        return None;
    }
    let probs = softmax(&values[..2]);
    let gender = if probs[1] >= probs[0] {
        GenderEstimate {
            gender: Gender::Male,
            probability: probs[1],
        }
    } else {
        GenderEstimate {
            gender: Gender::Female,
            probability: probs[0],
        }
    };
    let age = (values[2] * 100.0).max(0.0);
    Some((age, gender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_male() {
        let (age, gender) = decode(&[-1.0, 2.0, 0.342]).unwrap();
        assert_relative_eq!(age, 34.2, epsilon = 1e-4);
        assert_eq!(gender.gender, Gender::Male);
        assert!(gender.probability > 0.9);
    }

    #[test]
    fn test_decode_female() {
        let (_, gender) = decode(&[3.0, 0.0, 0.25]).unwrap();
        assert_eq!(gender.gender, Gender::Female);
    }

    #[test]
    fn test_decode_clamps_negative_age() {
        let (age, _) = decode(&[0.0, 1.0, -0.05]).unwrap();
        assert_relative_eq!(age, 0.0);
    }

    #[test]
    fn test_decode_short_output() {
        assert!(decode(&[0.1, 0.9]).is_none());
    }
}
