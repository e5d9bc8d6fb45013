pub mod age_gender_classifier;
pub mod arcface_embedder;
pub mod execution_provider;
pub mod expression_classifier;
mod face_crop;
pub mod onnx_perception_engine;
pub mod yolo_face_detector;
