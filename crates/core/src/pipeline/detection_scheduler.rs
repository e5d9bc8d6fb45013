use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::pipeline::build_gallery_use_case::ReferenceGalleryBuilder;
use crate::pipeline::cycle_logger::CycleLogger;
use crate::pipeline::detection_cycle::{CycleReport, CycleStage, DetectionCycle, DetectionCycleError};
use crate::recognition::domain::gallery::ReferenceIdentity;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{MediaAccessError, VideoSource};

const REPORT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Detecting,
    Rendering,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Detecting => "detecting",
            SchedulerState::Rendering => "rendering",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

enum Command {
    RebuildGallery,
    Stop,
}

/// Totals for one scheduler run.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    pub cycles: u64,
    pub skipped: u64,
    pub announcements: u64,
    pub gallery_rebuilds: u64,
    /// Frame the final cycle ran on, for exporting a snapshot.
    pub last_frame: Option<Frame>,
}

/// Drives detection cycles at a fixed cadence on a dedicated thread.
///
/// The loop reschedules itself: the wait for the next tick only starts once
/// the current cycle has finished, so cycles never overlap however slow the
/// engine is. The wait doubles as the command inbox, which keeps stop and
/// rebuild requests responsive.
pub struct DetectionScheduler {
    cycle: DetectionCycle,
    source: Box<dyn VideoSource>,
    logger: Box<dyn CycleLogger>,
    tick_interval: Duration,
    gallery_source: Option<(ReferenceGalleryBuilder, Vec<ReferenceIdentity>)>,
    state: Arc<Mutex<SchedulerState>>,
}

impl DetectionScheduler {
    pub fn new(
        cycle: DetectionCycle,
        source: Box<dyn VideoSource>,
        logger: Box<dyn CycleLogger>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            cycle,
            source,
            logger,
            tick_interval,
            gallery_source: None,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
        }
    }

    /// Enables [`SchedulerHandle::rebuild_gallery`].
    pub fn with_gallery_source(
        mut self,
        builder: ReferenceGalleryBuilder,
        identities: Vec<ReferenceIdentity>,
    ) -> Self {
        self.gallery_source = Some((builder, identities));
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the video source and starts ticking.
    ///
    /// A source that cannot be opened is fatal: no thread is started.
    pub fn start(mut self) -> Result<SchedulerHandle, MediaAccessError> {
        let geometry = self.source.open()?;
        if geometry != self.cycle.geometry() {
            log::warn!(
                "Video geometry {geometry} differs from overlay geometry {}; results are rescaled",
                self.cycle.geometry()
            );
        }

        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (report_tx, report_rx) = crossbeam_channel::bounded(REPORT_CAPACITY);
        let state = self.state.clone();
        set_state(&state, SchedulerState::Running);
        log::info!(
            "Detection scheduler started ({}ms interval)",
            self.tick_interval.as_millis()
        );

        let spawned = std::thread::Builder::new()
            .name("detection-scheduler".into())
            .spawn(move || self.run(command_rx, report_tx));

        match spawned {
            Ok(thread) => Ok(SchedulerHandle {
                commands: command_tx,
                reports: report_rx,
                state,
                thread: Some(thread),
            }),
            Err(e) => {
                set_state(&state, SchedulerState::Stopped);
                Err(MediaAccessError::Thread(e.to_string()))
            }
        }
    }

    fn run(mut self, commands: Receiver<Command>, reports: Sender<CycleReport>) -> RunStats {
        let mut stats = RunStats::default();
        let mut index = 0u64;

        loop {
            self.tick(index, &mut stats, &reports);
            index += 1;
            set_state(&self.state, SchedulerState::Running);

            match commands.recv_timeout(self.tick_interval) {
                Ok(Command::RebuildGallery) => self.rebuild_gallery(&mut stats),
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.source.close();
        self.logger.summary();
        stats.last_frame = self.cycle.last_frame().cloned();
        set_state(&self.state, SchedulerState::Stopped);
        log::info!(
            "Detection scheduler stopped after {} cycles ({} skipped)",
            stats.cycles,
            stats.skipped
        );
        stats
    }

    fn tick(&mut self, index: u64, stats: &mut RunStats, reports: &Sender<CycleReport>) {
        let state = self.state.clone();
        let result = match self.source.latest_frame() {
            Some(frame) => self.cycle.run(frame, index, self.logger.as_mut(), &mut |stage| {
                let next = match stage {
                    CycleStage::Detecting => SchedulerState::Detecting,
                    CycleStage::Rendering => SchedulerState::Rendering,
                };
                set_state(&state, next);
            }),
            None => Err(DetectionCycleError::NoFrame),
        };

        match result {
            Ok(report) => {
                stats.cycles += 1;
                stats.announcements += report.announcements.len() as u64;
                self.logger.cycle_completed(index);
                match reports.try_send(report) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => log::debug!("Report queue full, dropping cycle {index}"),
                }
            }
            Err(e) => {
                stats.skipped += 1;
                self.logger.cycle_skipped(&e.to_string());
            }
        }
    }

    fn rebuild_gallery(&mut self, stats: &mut RunStats) {
        let Some((builder, identities)) = &self.gallery_source else {
            log::warn!("Gallery rebuild requested but no reference identities are configured");
            return;
        };
        self.cycle.rebuild_gallery(builder, identities);
        stats.gallery_rebuilds += 1;
        self.logger
            .metric("gallery_size", self.cycle.gallery().len() as f64);
        self.logger.info(&format!(
            "Reference gallery rebuilt with {} identities",
            self.cycle.gallery().len()
        ));
    }
}

fn set_state(state: &Mutex<SchedulerState>, next: SchedulerState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Control surface for a running scheduler.
pub struct SchedulerHandle {
    commands: Sender<Command>,
    reports: Receiver<CycleReport>,
    state: Arc<Mutex<SchedulerState>>,
    thread: Option<JoinHandle<RunStats>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports of completed cycles, oldest first. Reports are dropped when
    /// nobody drains the channel.
    pub fn reports(&self) -> &Receiver<CycleReport> {
        &self.reports
    }

    /// Queues a gallery rebuild; it runs between cycles.
    pub fn rebuild_gallery(&self) {
        if self.commands.send(Command::RebuildGallery).is_err() {
            log::warn!("Detection scheduler is not running; rebuild ignored");
        }
    }

    /// Halts the loop, waits for the in-flight cycle to finish and returns
    /// the run totals.
    pub fn stop(mut self) -> RunStats {
        self.shutdown().unwrap_or_default()
    }

    fn shutdown(&mut self) -> Option<RunStats> {
        let thread = self.thread.take()?;
        let _ = self.commands.send(Command::Stop);
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                log::error!("Detection scheduler thread panicked");
                set_state(&self.state, SchedulerState::Stopped);
                None
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_observation::FaceObservation;
    use crate::detection::domain::perception_engine::{
        CapabilityLoadError, DetectOptions, FacePerceptionEngine, LoadedEngine,
    };
    use crate::notification::domain::notification_throttler::NotificationThrottler;
    use crate::overlay::domain::overlay_renderer::OverlayRenderer;
    use crate::overlay::infrastructure::display_list_surface::DisplayListSurface;
    use crate::pipeline::cycle_logger::NullCycleLogger;
    use crate::pipeline::detection_cycle::tests::{
        face_with_descriptor, frame, FixedEngine, RecordingAnnouncer,
    };
    use crate::recognition::domain::gallery::Gallery;
    use crate::recognition::domain::identity_matcher::IdentityMatcher;
    use crate::recognition::domain::reference_image_loader::ReferenceImageLoader;
    use crate::shared::display_geometry::DisplayGeometry;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Serves a fixed frame after `warmup` empty polls.
    struct StubSource {
        frame: Frame,
        warmup: AtomicUsize,
        fail_open: bool,
        closed: Arc<Mutex<bool>>,
    }

    impl StubSource {
        fn new(frame: Frame) -> Self {
            Self {
                frame,
                warmup: AtomicUsize::new(0),
                fail_open: false,
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl VideoSource for StubSource {
        fn open(&mut self) -> Result<DisplayGeometry, MediaAccessError> {
            if self.fail_open {
                return Err(MediaAccessError::Open {
                    input: "camera".into(),
                    reason: "permission denied".into(),
                });
            }
            Ok(DisplayGeometry::new(self.frame.width(), self.frame.height()))
        }

        fn latest_frame(&self) -> Option<Frame> {
            let remaining = self.warmup.load(Ordering::SeqCst);
            if remaining > 0 {
                self.warmup.store(remaining - 1, Ordering::SeqCst);
                return None;
            }
            Some(self.frame.clone())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// Sleeps inside detect and records entry/exit times.
    struct SlowEngine {
        delay: Duration,
        spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
    }

    impl FacePerceptionEngine for SlowEngine {
        fn load_capabilities(&mut self) -> Result<(), CapabilityLoadError> {
            Ok(())
        }

        fn detect(
            &mut self,
            _frame: &Frame,
            _options: &DetectOptions,
        ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
            let entered = Instant::now();
            std::thread::sleep(self.delay);
            self.spans.lock().unwrap().push((entered, Instant::now()));
            Ok(vec![])
        }
    }

    fn cycle(engine: Box<dyn FacePerceptionEngine>, gallery: Gallery, spoken: Arc<Mutex<Vec<String>>>) -> DetectionCycle {
        DetectionCycle::new(
            LoadedEngine::load(engine).unwrap(),
            Arc::new(gallery),
            IdentityMatcher::new(0.6),
            DetectOptions::reference(),
            OverlayRenderer::new(),
            Box::new(DisplayListSurface::new(DisplayGeometry::new(64, 48))),
            NotificationThrottler::new(Box::new(RecordingAnnouncer(spoken)), 15, "Hello {name}"),
        )
    }

    fn wait_for_reports(handle: &SchedulerHandle, count: usize) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while reports.len() < count && Instant::now() < deadline {
            if let Ok(report) = handle.reports().recv_timeout(Duration::from_millis(50)) {
                reports.push(report);
            }
        }
        reports
    }

    #[test]
    fn test_cycles_never_overlap() {
        let spans = Arc::new(Mutex::new(Vec::new()));
        let engine = SlowEngine {
            delay: Duration::from_millis(30),
            spans: spans.clone(),
        };
        let scheduler = DetectionScheduler::new(
            cycle(Box::new(engine), Gallery::default(), Arc::new(Mutex::new(Vec::new()))),
            Box::new(StubSource::new(frame(64, 48))),
            Box::new(NullCycleLogger),
            Duration::from_millis(1),
        );

        let handle = scheduler.start().unwrap();
        assert_eq!(wait_for_reports(&handle, 5).len(), 5);
        handle.stop();

        let spans = spans.lock().unwrap();
        assert!(spans.len() >= 5);
        for pair in spans.windows(2) {
            assert!(pair[1].0 >= pair[0].1, "cycle started before the previous one finished");
        }
    }

    #[test]
    fn test_missing_frames_are_skipped_and_ticking_continues() {
        let mut source = StubSource::new(frame(64, 48));
        source.warmup = AtomicUsize::new(3);
        let scheduler = DetectionScheduler::new(
            cycle(
                Box::new(FixedEngine {
                    faces: vec![],
                    fail: false,
                }),
                Gallery::default(),
                Arc::new(Mutex::new(Vec::new())),
            ),
            Box::new(source),
            Box::new(NullCycleLogger),
            Duration::from_millis(1),
        );

        let handle = scheduler.start().unwrap();
        let reports = wait_for_reports(&handle, 2);
        let stats = handle.stop();

        assert_eq!(reports.len(), 2);
        assert_eq!(stats.skipped, 3);
        assert!(stats.cycles >= 2);
        assert_eq!(reports[0].index, 3);
    }

    #[test]
    fn test_engine_errors_do_not_stop_the_scheduler() {
        let scheduler = DetectionScheduler::new(
            cycle(
                Box::new(FixedEngine {
                    faces: vec![],
                    fail: true,
                }),
                Gallery::default(),
                Arc::new(Mutex::new(Vec::new())),
            ),
            Box::new(StubSource::new(frame(64, 48))),
            Box::new(NullCycleLogger),
            Duration::from_millis(1),
        );

        let handle = scheduler.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_ne!(handle.state(), SchedulerState::Stopped);
        let stats = handle.stop();

        assert_eq!(stats.cycles, 0);
        assert!(stats.skipped >= 2);
    }

    #[test]
    fn test_stop_interrupts_the_wait() {
        let source = StubSource::new(frame(64, 48));
        let closed = source.closed.clone();
        let scheduler = DetectionScheduler::new(
            cycle(
                Box::new(FixedEngine {
                    faces: vec![],
                    fail: false,
                }),
                Gallery::default(),
                Arc::new(Mutex::new(Vec::new())),
            ),
            Box::new(source),
            Box::new(NullCycleLogger),
            Duration::from_secs(60),
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let handle = scheduler.start().unwrap();
        assert_eq!(wait_for_reports(&handle, 1).len(), 1);
        let started = Instant::now();
        let stats = handle.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.cycles, 1);
        assert!(stats.last_frame.is_some());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_unopenable_source_prevents_start() {
        let mut source = StubSource::new(frame(64, 48));
        source.fail_open = true;
        let scheduler = DetectionScheduler::new(
            cycle(
                Box::new(FixedEngine {
                    faces: vec![],
                    fail: false,
                }),
                Gallery::default(),
                Arc::new(Mutex::new(Vec::new())),
            ),
            Box::new(source),
            Box::new(NullCycleLogger),
            Duration::from_millis(1),
        );

        assert!(matches!(scheduler.start(), Err(MediaAccessError::Open { .. })));
    }

    #[test]
    fn test_state_is_stopped_after_stop() {
        let scheduler = DetectionScheduler::new(
            cycle(
                Box::new(FixedEngine {
                    faces: vec![],
                    fail: false,
                }),
                Gallery::default(),
                Arc::new(Mutex::new(Vec::new())),
            ),
            Box::new(StubSource::new(frame(64, 48))),
            Box::new(NullCycleLogger),
            Duration::from_millis(5),
        );
        let state = scheduler.state.clone();

        let handle = scheduler.start().unwrap();
        assert_ne!(handle.state(), SchedulerState::Idle);
        handle.stop();

        assert_eq!(*state.lock().unwrap(), SchedulerState::Stopped);
    }

    struct OnePixelLoader;

    impl ReferenceImageLoader for OnePixelLoader {
        fn load(&self, source: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            if source.ends_with("snowden.jpg") {
                Ok(frame(1, 1))
            } else {
                Err("file not found".into())
            }
        }
    }

    /// Reference frames (1x1) yield the gallery descriptor; camera frames
    /// yield a face 0.1 away from it.
    struct ReferenceAwareEngine;

    impl FacePerceptionEngine for ReferenceAwareEngine {
        fn load_capabilities(&mut self) -> Result<(), CapabilityLoadError> {
            Ok(())
        }

        fn detect(
            &mut self,
            frame: &Frame,
            _options: &DetectOptions,
        ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
            if frame.width() == 1 {
                Ok(vec![face_with_descriptor(&[0.0, 0.0])])
            } else {
                Ok(vec![face_with_descriptor(&[0.1, 0.0])])
            }
        }
    }

    #[test]
    fn test_end_to_end_recognition_announces_once() {
        let identities = vec![ReferenceIdentity::new("Edward Snowden", "snowden.jpg")];
        let builder = ReferenceGalleryBuilder::new(Box::new(OnePixelLoader));
        let mut engine = LoadedEngine::load(Box::new(ReferenceAwareEngine)).unwrap();
        let gallery = builder.build(&mut engine, &identities, None);
        assert_eq!(gallery.names(), vec!["Edward Snowden"]);

        let surface = Arc::new(Mutex::new(DisplayListSurface::new(DisplayGeometry::new(64, 48))));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let cycle = DetectionCycle::new(
            engine,
            Arc::new(gallery),
            IdentityMatcher::new(0.6),
            DetectOptions::reference(),
            OverlayRenderer::new(),
            Box::new(surface.clone()),
            NotificationThrottler::new(Box::new(RecordingAnnouncer(spoken.clone())), 15, "Hello {name}"),
        );
        let scheduler = DetectionScheduler::new(
            cycle,
            Box::new(StubSource::new(frame(64, 48))),
            Box::new(NullCycleLogger),
            Duration::from_millis(20),
        );

        let handle = scheduler.start().unwrap();
        let reports = wait_for_reports(&handle, 3);
        let stats = handle.stop();

        assert_eq!(reports.len(), 3);
        let first = &reports[0].matches[0];
        assert_eq!(first.identity.as_deref(), Some("Edward Snowden"));
        assert!((first.distance - 0.1).abs() < 1e-6);
        assert!(stats.cycles < 15);
        assert_eq!(stats.announcements, 1);
        let spoken = spoken.lock().unwrap();
        assert_eq!(spoken.len(), 1);
        assert!(spoken[0].contains("Edward Snowden"));
        assert_eq!(surface.lock().unwrap().labels(), vec!["Edward Snowden"]);
    }

    #[test]
    fn test_rebuild_gallery_between_cycles() {
        let identities = vec![ReferenceIdentity::new("Edward Snowden", "snowden.jpg")];
        let scheduler = DetectionScheduler::new(
            cycle(Box::new(ReferenceAwareEngine), Gallery::default(), Arc::new(Mutex::new(Vec::new()))),
            Box::new(StubSource::new(frame(64, 48))),
            Box::new(NullCycleLogger),
            Duration::from_millis(5),
        )
        .with_gallery_source(ReferenceGalleryBuilder::new(Box::new(OnePixelLoader)), identities);

        let handle = scheduler.start().unwrap();
        let before = wait_for_reports(&handle, 1);
        assert!(before[0].matches[0].is_unknown());

        handle.rebuild_gallery();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut recognized = false;
        while !recognized && Instant::now() < deadline {
            if let Ok(report) = handle.reports().recv_timeout(Duration::from_millis(50)) {
                recognized = report.matches[0].label() == "Edward Snowden";
            }
        }
        let stats = handle.stop();

        assert!(recognized);
        assert_eq!(stats.gallery_rebuilds, 1);
    }
}
