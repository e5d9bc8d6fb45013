use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{select, Receiver};

use facewatch_core::detection::domain::perception_engine::{DetectOptions, LoadedEngine};
use facewatch_core::detection::infrastructure::onnx_perception_engine::{
    OnnxEngineConfig, OnnxPerceptionEngine,
};
use facewatch_core::notification::domain::announcer::Announcer;
use facewatch_core::notification::domain::notification_throttler::NotificationThrottler;
use facewatch_core::notification::infrastructure::log_announcer::LogAnnouncer;
use facewatch_core::notification::infrastructure::speech_command_announcer::SpeechCommandAnnouncer;
use facewatch_core::overlay::domain::overlay_renderer::OverlayRenderer;
use facewatch_core::overlay::infrastructure::raster_surface::RasterSurface;
use facewatch_core::pipeline::build_gallery_use_case::ReferenceGalleryBuilder;
use facewatch_core::pipeline::cycle_logger::LogCycleLogger;
use facewatch_core::pipeline::detection_cycle::{CycleReport, DetectionCycle};
use facewatch_core::pipeline::detection_scheduler::{DetectionScheduler, SchedulerHandle};
use facewatch_core::recognition::domain::gallery::ReferenceIdentity;
use facewatch_core::recognition::domain::identity_matcher::IdentityMatcher;
use facewatch_core::recognition::infrastructure::image_file_loader::ImageFileLoader;
use facewatch_core::shared::config::FacewatchConfig;
use facewatch_core::shared::model_resolver::ProgressFn;
use facewatch_core::video::infrastructure::ffmpeg_camera_source::{CameraInput, FfmpegCameraSource};

/// Live face recognition with on-frame annotations and spoken greetings.
///
/// Press Enter to stop, or type `r` and Enter to reload reference images.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Configuration file (default: <config dir>/Facewatch/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device, e.g. /dev/video0 (Linux), 0 (macOS), "video=Camera" (Windows).
    #[arg(long)]
    device: Option<String>,

    /// ffmpeg input device format: v4l2, avfoundation or dshow.
    #[arg(long)]
    input_format: Option<String>,

    /// Replay a video file instead of a camera.
    #[arg(long, conflicts_with_all = ["device", "input_format"])]
    video_file: Option<PathBuf>,

    /// Reference identity as NAME=IMAGE (repeatable).
    #[arg(long = "identity", value_name = "NAME=IMAGE")]
    identities: Vec<String>,

    /// Maximum descriptor distance for a match (lower is stricter).
    #[arg(long)]
    threshold: Option<f64>,

    /// Milliseconds between the end of one cycle and the start of the next.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Greet a recognized identity once every N recognitions.
    #[arg(long)]
    period: Option<u64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Directory searched first for model files.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Skip expression classification.
    #[arg(long)]
    no_expressions: bool,

    /// Skip age and gender estimation.
    #[arg(long)]
    no_age_gender: bool,

    /// Log greetings instead of speaking them.
    #[arg(long)]
    no_speech: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Write the last frame with its overlay to this image file on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

enum Input {
    Stop,
    Rebuild,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    config.validate()?;

    let engine = OnnxPerceptionEngine::new(OnnxEngineConfig {
        models_dir: config.models_dir.clone(),
        features: config.features,
        detector_confidence: config.detector_confidence,
    })
    .with_download_progress(Box::new(download_progress));
    let mut engine = LoadedEngine::load(Box::new(engine))?;

    let builder = ReferenceGalleryBuilder::new(Box::new(ImageFileLoader::new()));
    let gallery = builder.build(&mut engine, &config.identities, None);
    if gallery.is_empty() {
        log::warn!("No reference identities available; every face will be unknown");
    }

    let surface = Arc::new(Mutex::new(RasterSurface::new(config.display)));
    let throttler = NotificationThrottler::new(
        build_announcer(&config, cli.no_speech),
        config.throttle_period,
        config.greeting.clone(),
    );
    let cycle = DetectionCycle::new(
        engine,
        Arc::new(gallery),
        IdentityMatcher::new(config.match_threshold),
        DetectOptions::for_features(config.features),
        OverlayRenderer::new(),
        Box::new(surface.clone()),
        throttler,
    );

    let camera = FfmpegCameraSource::new(CameraInput::from(&config.camera), config.display);
    let scheduler = DetectionScheduler::new(
        cycle,
        Box::new(camera),
        Box::new(LogCycleLogger::default()),
        Duration::from_millis(config.tick_interval_ms),
    )
    .with_gallery_source(builder, config.identities.clone());

    let handle = scheduler.start()?;
    eprintln!("Watching for faces. Press Enter to stop, 'r' + Enter to reload references.");
    let deadline = cli.duration.map(|s| Instant::now() + Duration::from_secs(s));
    watch(&handle, spawn_stdin_reader(), deadline);

    let stats = handle.stop();
    log::info!(
        "{} cycles, {} skipped, {} greetings",
        stats.cycles,
        stats.skipped,
        stats.announcements
    );

    if let Some(path) = &cli.snapshot {
        match &stats.last_frame {
            Some(frame) => {
                let surface = surface.lock().map_err(|_| "overlay surface poisoned")?;
                surface.save_composited(frame, path)?;
                log::info!("Snapshot written to {}", path.display());
            }
            None => log::warn!("No frame was processed; snapshot not written"),
        }
    }

    Ok(())
}

enum Event {
    Report(CycleReport),
    Command(Input),
    StdinClosed,
    SchedulerGone,
    Timeout,
}

fn watch(handle: &SchedulerHandle, mut input: Receiver<Input>, deadline: Option<Instant>) {
    loop {
        let timeout = match deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return,
            },
            None => Duration::from_secs(3600),
        };

        let event = select! {
            recv(handle.reports()) -> report => report.map_or(Event::SchedulerGone, Event::Report),
            recv(input) -> command => command.map_or(Event::StdinClosed, Event::Command),
            default(timeout) => Event::Timeout,
        };

        match event {
            Event::Report(report) => log_report(&report),
            Event::Command(Input::Rebuild) => {
                log::info!("Reloading reference images");
                handle.rebuild_gallery();
            }
            Event::Command(Input::Stop) | Event::SchedulerGone => return,
            // stdin closed (e.g. running detached): keep watching
            Event::StdinClosed => input = crossbeam_channel::never(),
            Event::Timeout if deadline.is_some() => return,
            Event::Timeout => {}
        }
    }
}

fn log_report(report: &CycleReport) {
    if report.matches.is_empty() {
        log::debug!("Cycle {}: no faces", report.index);
        return;
    }
    let matches: Vec<String> = report.matches.iter().map(|m| m.to_string()).collect();
    log::info!(
        "Cycle {} ({}ms): {}",
        report.index,
        report.duration.as_millis(),
        matches.join(", ")
    );
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = crossbeam_channel::bounded(4);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let command = match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("r") => Input::Rebuild,
                _ => Input::Stop,
            };
            let stop = matches!(command, Input::Stop);
            if tx.send(command).is_err() || stop {
                return;
            }
        }
    });
    rx
}

fn build_config(cli: &Cli) -> Result<FacewatchConfig, Box<dyn std::error::Error>> {
    let mut config = FacewatchConfig::load(cli.config.as_deref())?;

    if let Some(path) = &cli.video_file {
        config.camera.device = path.to_string_lossy().into_owned();
        config.camera.input_format = None;
    }
    if let Some(device) = &cli.device {
        config.camera.device = device.clone();
    }
    if let Some(format) = &cli.input_format {
        config.camera.input_format = Some(format.clone());
    }
    for spec in &cli.identities {
        config.identities.push(parse_identity(spec)?);
    }
    if let Some(threshold) = cli.threshold {
        config.match_threshold = threshold;
    }
    if let Some(interval) = cli.interval_ms {
        config.tick_interval_ms = interval;
    }
    if let Some(period) = cli.period {
        config.throttle_period = period;
    }
    if let Some(confidence) = cli.confidence {
        config.detector_confidence = confidence;
    }
    if let Some(dir) = &cli.models_dir {
        config.models_dir = Some(dir.clone());
    }
    if cli.no_expressions {
        config.features.expressions = false;
    }
    if cli.no_age_gender {
        config.features.age_gender = false;
    }
    Ok(config)
}

fn parse_identity(spec: &str) -> Result<ReferenceIdentity, String> {
    match spec.split_once('=') {
        Some((name, image)) if !name.trim().is_empty() && !image.is_empty() => {
            Ok(ReferenceIdentity::new(name.trim(), image))
        }
        _ => Err(format!("Identity must be NAME=IMAGE, got '{spec}'")),
    }
}

fn build_announcer(config: &FacewatchConfig, no_speech: bool) -> Box<dyn Announcer> {
    if no_speech {
        return Box::new(LogAnnouncer::new());
    }
    match config
        .speech_command
        .as_deref()
        .and_then(SpeechCommandAnnouncer::from_command_line)
    {
        Some(announcer) => {
            log::info!("Speaking greetings with '{}'", announcer.program());
            Box::new(announcer)
        }
        None => Box::new(LogAnnouncer::new()),
    }
}

fn download_progress(model_name: &str) -> Option<ProgressFn> {
    let name = model_name.to_string();
    Some(Box::new(move |downloaded: u64, total: u64| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {name}... {pct}%");
        } else {
            eprint!("\rDownloading {name}... {downloaded} bytes");
        }
        if total > 0 && downloaded >= total {
            eprintln!();
        }
    }))
}
