use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::perception_engine::{DetectOptions, LoadedEngine};
use crate::notification::domain::notification_throttler::NotificationThrottler;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::overlay::domain::overlay_surface::OverlaySurface;
use crate::pipeline::build_gallery_use_case::ReferenceGalleryBuilder;
use crate::pipeline::cycle_logger::CycleLogger;
use crate::recognition::domain::gallery::{Gallery, ReferenceIdentity};
use crate::recognition::domain::identity_matcher::{IdentityMatcher, MatchResult};
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;

/// Why a single tick produced no results. The scheduler logs it and moves
/// on to the next tick.
#[derive(Debug, thiserror::Error)]
pub enum DetectionCycleError {
    #[error("No frame available yet")]
    NoFrame,
    #[error("Frame {0} is empty")]
    EmptyFrame(usize),
    #[error("Face detection failed: {0}")]
    Engine(String),
}

/// Pipeline stage a cycle is in, for observers of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Detecting,
    Rendering,
}

/// Outcome of one completed cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub index: u64,
    pub frame_index: usize,
    pub matches: Vec<MatchResult>,
    pub announcements: Vec<String>,
    pub duration: Duration,
}

/// One detect → match → render → notify pass over a frame.
///
/// Owns everything a cycle touches; the scheduler runs it on a single
/// thread so cycles never overlap.
pub struct DetectionCycle {
    engine: LoadedEngine,
    gallery: Arc<Gallery>,
    matcher: IdentityMatcher,
    options: DetectOptions,
    geometry: DisplayGeometry,
    renderer: OverlayRenderer,
    surface: Box<dyn OverlaySurface>,
    throttler: NotificationThrottler,
    last_frame: Option<Frame>,
}

impl DetectionCycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: LoadedEngine,
        gallery: Arc<Gallery>,
        matcher: IdentityMatcher,
        options: DetectOptions,
        renderer: OverlayRenderer,
        surface: Box<dyn OverlaySurface>,
        throttler: NotificationThrottler,
    ) -> Self {
        let geometry = surface.geometry();
        Self {
            engine,
            gallery,
            matcher,
            options,
            geometry,
            renderer,
            surface,
            throttler,
            last_frame: None,
        }
    }

    pub fn gallery(&self) -> &Arc<Gallery> {
        &self.gallery
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    pub fn throttler(&self) -> &NotificationThrottler {
        &self.throttler
    }

    pub fn throttler_mut(&mut self) -> &mut NotificationThrottler {
        &mut self.throttler
    }

    /// The last frame a cycle ran on.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Detects faces and maps them into display coordinates.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>, DetectionCycleError> {
        if frame.is_empty() {
            return Err(DetectionCycleError::EmptyFrame(frame.index()));
        }

        let faces = self
            .engine
            .detect(frame, &self.options)
            .map_err(|e| DetectionCycleError::Engine(e.to_string()))?;

        let (sx, sy) = self.geometry.scale_from(frame.width(), frame.height());
        Ok(faces.iter().map(|face| face.scaled(sx, sy)).collect())
    }

    /// Pairs each face with its best gallery match. Faces without a
    /// descriptor are unknown.
    pub fn identify(&self, faces: Vec<FaceObservation>) -> Vec<(FaceObservation, MatchResult)> {
        faces
            .into_iter()
            .map(|face| {
                let matched = match &face.descriptor {
                    Some(descriptor) => self.matcher.find_best_match(descriptor, &self.gallery),
                    None => MatchResult::unknown(f64::INFINITY),
                };
                (face, matched)
            })
            .collect()
    }

    pub fn render(&mut self, faces: &[(FaceObservation, MatchResult)]) {
        self.renderer.render(self.surface.as_mut(), faces);
    }

    /// Feeds every recognized face to the throttler, returning the greetings
    /// that fired.
    pub fn notify(&mut self, faces: &[(FaceObservation, MatchResult)]) -> Vec<String> {
        faces
            .iter()
            .filter_map(|(_, matched)| matched.identity.as_deref())
            .filter_map(|identity| self.throttler.on_recognized(identity))
            .collect()
    }

    /// Runs all stages on `frame`, reporting stage changes and timings.
    pub fn run(
        &mut self,
        frame: Frame,
        index: u64,
        logger: &mut dyn CycleLogger,
        on_stage: &mut dyn FnMut(CycleStage),
    ) -> Result<CycleReport, DetectionCycleError> {
        let started = Instant::now();

        on_stage(CycleStage::Detecting);
        let t = Instant::now();
        let faces = self.detect(&frame)?;
        logger.timing("detect", t.elapsed().as_secs_f64() * 1000.0);
        logger.metric("faces", faces.len() as f64);

        let t = Instant::now();
        let matched = self.identify(faces);
        logger.timing("match", t.elapsed().as_secs_f64() * 1000.0);

        on_stage(CycleStage::Rendering);
        let t = Instant::now();
        self.render(&matched);
        logger.timing("render", t.elapsed().as_secs_f64() * 1000.0);

        let t = Instant::now();
        let announcements = self.notify(&matched);
        logger.timing("notify", t.elapsed().as_secs_f64() * 1000.0);

        let frame_index = frame.index();
        self.last_frame = Some(frame);

        Ok(CycleReport {
            index,
            frame_index,
            matches: matched.into_iter().map(|(_, m)| m).collect(),
            announcements,
            duration: started.elapsed(),
        })
    }

    /// Rebuilds the gallery from `identities`, keeping previous entries for
    /// references that fail this time.
    pub fn rebuild_gallery(&mut self, builder: &ReferenceGalleryBuilder, identities: &[ReferenceIdentity]) {
        let previous = self.gallery.clone();
        let rebuilt = builder.build(&mut self.engine, identities, Some(&previous));
        self.gallery = Arc::new(rebuilt);
    }
}
