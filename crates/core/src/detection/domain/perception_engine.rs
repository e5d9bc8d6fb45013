use thiserror::Error;

use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::config::FeatureToggles;
use crate::shared::frame::Frame;

/// A model-backed capability an engine may need before it can detect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    FaceDetection,
    Descriptors,
    Expressions,
    AgeGender,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::FaceDetection => write!(f, "face detection"),
            Capability::Descriptors => write!(f, "face descriptors"),
            Capability::Expressions => write!(f, "expressions"),
            Capability::AgeGender => write!(f, "age/gender"),
        }
    }
}

#[derive(Error, Debug)]
#[error("{capability} capability unavailable: {source}")]
pub struct CapabilityLoadError {
    pub capability: Capability,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl CapabilityLoadError {
    pub fn new(
        capability: Capability,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            capability,
            source: source.into(),
        }
    }
}

/// What a detection call should extract besides the face boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectOptions {
    /// Return at most the highest-scoring face.
    pub single_face: bool,
    pub landmarks: bool,
    pub descriptors: bool,
    pub expressions: bool,
    pub age_gender: bool,
}

impl DetectOptions {
    /// Everything the live pipeline draws and matches for `features`.
    pub fn for_features(features: FeatureToggles) -> Self {
        Self {
            single_face: false,
            landmarks: true,
            descriptors: true,
            expressions: features.expressions,
            age_gender: features.age_gender,
        }
    }

    /// Single face with descriptor, as used for reference gallery images.
    pub fn reference() -> Self {
        Self {
            single_face: true,
            landmarks: true,
            descriptors: true,
            expressions: false,
            age_gender: false,
        }
    }
}

/// Domain interface for face perception: detection plus attribute extraction.
///
/// Implementations hold model sessions, hence `&mut self`.
pub trait FacePerceptionEngine: Send {
    /// Loads every capability the engine was configured with.
    fn load_capabilities(&mut self) -> Result<(), CapabilityLoadError>;

    fn detect(
        &mut self,
        frame: &Frame,
        options: &DetectOptions,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>>;
}

/// An engine whose capabilities loaded successfully.
///
/// The only way to run detection in the pipeline; an engine that failed to
/// load can never reach a detection cycle.
pub struct LoadedEngine {
    inner: Box<dyn FacePerceptionEngine>,
}

impl LoadedEngine {
    pub fn load(mut engine: Box<dyn FacePerceptionEngine>) -> Result<Self, CapabilityLoadError> {
        engine.load_capabilities()?;
        log::info!("Face perception capabilities loaded");
        Ok(Self { inner: engine })
    }

    pub fn detect(
        &mut self,
        frame: &Frame,
        options: &DetectOptions,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        let mut faces = self.inner.detect(frame, options)?;
        if options.single_face && faces.len() > 1 {
            faces.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            faces.truncate(1);
        }
        Ok(faces)
    }
}
