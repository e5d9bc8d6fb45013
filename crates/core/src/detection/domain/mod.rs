pub mod face_observation;
pub mod perception_engine;
