/// ArcFace descriptor extraction using ONNX Runtime.
///
/// Produces L2-normalized 512-d descriptors from square face crops.
use std::path::Path;

use crate::detection::infrastructure::face_crop::{rgb_tensor, square_crop};
use crate::recognition::domain::descriptor::Descriptor;
use crate::shared::face_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Crop margin around the detector box; ArcFace expects a tight face.
const CROP_SCALE: f64 = 1.0;

pub struct ArcFaceEmbedder {
    session: ort::session::Session,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, ort::Error> {
        Ok(Self {
            session: build_session(model_path)?,
        })
    }

    /// Descriptor for the face inside `bbox`, or `None` if the box lies
    /// outside the frame.
    pub fn embed(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<Option<Descriptor>, Box<dyn std::error::Error>> {
        let Some(crop) = square_crop(frame, bbox, CROP_SCALE) else {
            return Ok(None);
        };
        let tensor = rgb_tensor(&crop, INPUT_SIZE, NORM_MEAN, NORM_STD);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut descriptor = Descriptor::new(embedding_slice.to_vec());
        descriptor.l2_normalize();
        Ok(Some(descriptor))
    }
}
