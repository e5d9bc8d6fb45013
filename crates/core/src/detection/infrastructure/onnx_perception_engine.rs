use std::path::{Path, PathBuf};

use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::perception_engine::{
    Capability, CapabilityLoadError, DetectOptions, FacePerceptionEngine,
};
use crate::shared::config::FeatureToggles;
use crate::shared::constants::{
    AGE_GENDER_MODEL_NAME, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, EXPRESSION_MODEL_NAME,
    YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ModelSource, ProgressFn};

use super::age_gender_classifier::AgeGenderClassifier;
use super::arcface_embedder::ArcFaceEmbedder;
use super::expression_classifier::ExpressionClassifier;
use super::yolo_face_detector::YoloFaceDetector;

pub const DETECTOR_SOURCE: ModelSource = ModelSource::remote(YOLO_MODEL_NAME, YOLO_MODEL_URL);
pub const EMBEDDING_SOURCE: ModelSource =
    ModelSource::remote(EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL);
pub const AGE_GENDER_SOURCE: ModelSource = ModelSource::local(AGE_GENDER_MODEL_NAME);
pub const EXPRESSION_SOURCE: ModelSource = ModelSource::local(EXPRESSION_MODEL_NAME);

/// Factory for the download progress callback handed to the model resolver.
pub type ProgressFactory = Box<dyn Fn(&str) -> Option<ProgressFn> + Send>;

pub struct OnnxEngineConfig {
    pub models_dir: Option<PathBuf>,
    pub features: FeatureToggles,
    pub detector_confidence: f64,
}

#[derive(Default)]
struct Sessions {
    detector: Option<YoloFaceDetector>,
    embedder: Option<ArcFaceEmbedder>,
    age_gender: Option<AgeGenderClassifier>,
    expressions: Option<ExpressionClassifier>,
}

/// Face perception engine composed from per-capability ONNX models.
///
/// Detection and descriptors are always loaded; expression and age/gender
/// heads only when the matching feature is enabled. A disabled feature is
/// never loaded and never run, even if requested per call.
pub struct OnnxPerceptionEngine {
    config: OnnxEngineConfig,
    on_download: Option<ProgressFactory>,
    sessions: Sessions,
}

impl OnnxPerceptionEngine {
    pub fn new(config: OnnxEngineConfig) -> Self {
        Self {
            config,
            on_download: None,
            sessions: Sessions::default(),
        }
    }

    pub fn with_download_progress(mut self, factory: ProgressFactory) -> Self {
        self.on_download = Some(factory);
        self
    }

    /// Capabilities this engine loads, with their model sources.
    pub fn required_capabilities(&self) -> Vec<(Capability, ModelSource)> {
        let mut required = vec![
            (Capability::FaceDetection, DETECTOR_SOURCE),
            (Capability::Descriptors, EMBEDDING_SOURCE),
        ];
        if self.config.features.age_gender {
            required.push((Capability::AgeGender, AGE_GENDER_SOURCE));
        }
        if self.config.features.expressions {
            required.push((Capability::Expressions, EXPRESSION_SOURCE));
        }
        required
    }

    fn resolve(&self, capability: Capability, source: &ModelSource) -> Result<PathBuf, CapabilityLoadError> {
        let progress = self.on_download.as_ref().and_then(|f| f(source.name));
        model_resolver::resolve(source, self.config.models_dir.as_deref(), progress)
            .map_err(|e| CapabilityLoadError::new(capability, e))
    }

    fn load(&mut self, capability: Capability, path: &Path) -> Result<(), CapabilityLoadError> {
        let wrap = |e: ort::Error| CapabilityLoadError::new(capability, e);
        match capability {
            Capability::FaceDetection => {
                self.sessions.detector = Some(
                    YoloFaceDetector::new(path, self.config.detector_confidence).map_err(wrap)?,
                );
            }
            Capability::Descriptors => {
                self.sessions.embedder = Some(ArcFaceEmbedder::new(path).map_err(wrap)?);
            }
            Capability::AgeGender => {
                self.sessions.age_gender = Some(AgeGenderClassifier::new(path).map_err(wrap)?);
            }
            Capability::Expressions => {
                self.sessions.expressions = Some(ExpressionClassifier::new(path).map_err(wrap)?);
            }
        }
        Ok(())
    }
}

impl FacePerceptionEngine for OnnxPerceptionEngine {
    fn load_capabilities(&mut self) -> Result<(), CapabilityLoadError> {
        // Resolve every model before building sessions so a missing file is
        // reported without paying for the ones that did load.
        let mut resolved = Vec::new();
        for (capability, source) in self.required_capabilities() {
            let path = self.resolve(capability, &source)?;
            log::info!("Using {capability} model {}", path.display());
            resolved.push((capability, path));
        }
        for (capability, path) in resolved {
            self.load(capability, &path)?;
        }
        Ok(())
    }

    fn detect(
        &mut self,
        frame: &Frame,
        options: &DetectOptions,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        let sessions = &mut self.sessions;
        let detector = sessions
            .detector
            .as_mut()
            .ok_or("face detection capability not loaded")?;
        let mut faces = detector.detect(frame, options.landmarks)?;

        if options.single_face && faces.len() > 1 {
            // NMS output is already sorted by confidence
            faces.truncate(1);
        }

        for face in &mut faces {
            let bbox = face.bounding_box;
            if options.descriptors {
                let embedder = sessions
                    .embedder
                    .as_mut()
                    .ok_or("descriptor capability not loaded")?;
                face.descriptor = embedder.embed(frame, &bbox)?;
            }
            if options.age_gender {
                if let Some(classifier) = sessions.age_gender.as_mut() {
                    if let Some((age, gender)) = classifier.classify(frame, &bbox)? {
                        face.age = Some(age);
                        face.gender = Some(gender);
                    }
                }
            }
            if options.expressions {
                if let Some(classifier) = sessions.expressions.as_mut() {
                    face.expressions = classifier.classify(frame, &bbox)?;
                }
            }
        }

        Ok(faces)
    }
}
