use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::shared::config::CameraConfig;
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{MediaAccessError, VideoSource};

const MAX_CONSECUTIVE_ERRORS: usize = 30;

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraInput {
    /// A capture device opened through an ffmpeg input device
    /// (`v4l2`, `avfoundation`, `dshow`).
    Device { format: String, device: String },
    /// A video file, replayed in a loop at its native frame rate.
    File(PathBuf),
}

impl From<&CameraConfig> for CameraInput {
    fn from(config: &CameraConfig) -> Self {
        match &config.input_format {
            Some(format) => CameraInput::Device {
                format: format.clone(),
                device: config.device.clone(),
            },
            None => CameraInput::File(PathBuf::from(&config.device)),
        }
    }
}

impl std::fmt::Display for CameraInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraInput::Device { format, device } => write!(f, "{device} ({format})"),
            CameraInput::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Live video via ffmpeg-next, decoded on a producer thread.
///
/// Each decoded frame is converted to RGB24 at the configured geometry and
/// overwrites a single latest-frame slot; nothing is queued.
pub struct FfmpegCameraSource {
    input: CameraInput,
    geometry: DisplayGeometry,
    slot: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl FfmpegCameraSource {
    pub fn new(input: CameraInput, geometry: DisplayGeometry) -> Self {
        Self {
            input,
            geometry,
            slot: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }

    pub fn input(&self) -> &CameraInput {
        &self.input
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, MediaAccessError> {
        let open_error = |e: ffmpeg_next::Error| MediaAccessError::Open {
            input: self.input.to_string(),
            reason: e.to_string(),
        };

        match &self.input {
            CameraInput::File(path) => ffmpeg_next::format::input(path).map_err(open_error),
            CameraInput::Device { format, device } => {
                ffmpeg_next::device::register_all();
                let input_format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == format.as_str())
                    .ok_or_else(|| MediaAccessError::InputFormatUnavailable(format.clone()))?;
                let context = ffmpeg_next::format::open_with(
                    device,
                    &ffmpeg_next::format::format::Format::Input(input_format),
                    ffmpeg_next::Dictionary::new(),
                )
                .map_err(open_error)?;
                match context {
                    ffmpeg_next::format::context::Context::Input(input) => Ok(input),
                    ffmpeg_next::format::context::Context::Output(_) => Err(MediaAccessError::Open {
                        input: self.input.to_string(),
                        reason: "opened as an output".into(),
                    }),
                }
            }
        }
    }
}

impl VideoSource for FfmpegCameraSource {
    fn open(&mut self) -> Result<DisplayGeometry, MediaAccessError> {
        if self.producer.is_some() {
            return Err(MediaAccessError::AlreadyOpen);
        }
        ffmpeg_next::init().map_err(|e| MediaAccessError::Decoder(e.to_string()))?;

        let ictx = self.open_input()?;
        let capture = Capture::new(ictx, self.geometry, &self.input)?;
        let pace = match self.input {
            CameraInput::File(_) => Some(capture.frame_interval),
            CameraInput::Device { .. } => None,
        };
        let looping = matches!(self.input, CameraInput::File(_));

        log::info!(
            "Opened video input {} ({}x{} -> {})",
            self.input,
            capture.source_width,
            capture.source_height,
            self.geometry
        );

        self.stop.store(false, Ordering::Relaxed);
        let slot = self.slot.clone();
        let stop = self.stop.clone();
        let handle = std::thread::Builder::new()
            .name("video-capture".into())
            .spawn(move || {
                let mut capture = capture;
                produce_frames(&mut capture, &slot, &stop, pace, looping)
            })
            .map_err(|e| MediaAccessError::Thread(e.to_string()))?;
        self.producer = Some(handle);

        Ok(self.geometry)
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|frame| frame.clone())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                log::error!("Video capture thread panicked");
            }
        }
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decoder state moved onto the producer thread.
struct Capture {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    geometry: DisplayGeometry,
    source_width: u32,
    source_height: u32,
    frame_interval: Duration,
    at_eof: bool,
}

// Safety: a Capture is created on the opening thread and then owned
// exclusively by the producer thread. The raw pointers inside ffmpeg types
// are never shared.
unsafe impl Send for Capture {}

/// Sequential frame decoding the producer loop drives.
trait FrameDecoder {
    /// Decodes the next frame, or `None` at end of input.
    fn next_frame(&mut self, index: usize) -> Result<Option<Frame>, ffmpeg_next::Error>;

    /// Seeks back to the start of the input.
    fn rewind(&mut self) -> Result<(), ffmpeg_next::Error>;
}

impl Capture {
    fn new(
        ictx: ffmpeg_next::format::context::Input,
        geometry: DisplayGeometry,
        input: &CameraInput,
    ) -> Result<Self, MediaAccessError> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| MediaAccessError::NoVideoStream(input.to_string()))?;
        let stream_index = stream.index();

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let frame_interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::from_millis(33)
        };

        let decoder_error = |e: ffmpeg_next::Error| MediaAccessError::Decoder(e.to_string());
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(decoder_error)?;
        let decoder = codec_ctx.decoder().video().map_err(decoder_error)?;

        let source_width = decoder.width();
        let source_height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            source_width,
            source_height,
            ffmpeg_next::format::Pixel::RGB24,
            geometry.width,
            geometry.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(decoder_error)?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            geometry,
            source_width,
            source_height,
            frame_interval,
            at_eof: false,
        })
    }
}

impl FrameDecoder for Capture {
    fn next_frame(&mut self, index: usize) -> Result<Option<Frame>, ffmpeg_next::Error> {
        loop {
            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
                self.scaler.run(&decoded, &mut rgb_frame)?;
                let (width, height) = (self.geometry.width, self.geometry.height);
                let pixels = extract_rgb_pixels(&rgb_frame, width, height);
                return Ok(Some(Frame::new(pixels, width, height, 3, index)));
            }

            if self.at_eof {
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if self.decoder.send_packet(&packet).is_err() {
                        continue;
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.at_eof = true;
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), ffmpeg_next::Error> {
        self.ictx.seek(0, ..)?;
        self.decoder.flush();
        self.at_eof = false;
        Ok(())
    }
}

/// Publishes decoded frames into `slot` until stopped or the input gives out.
///
/// A looping input rewinds at end of stream, unless a whole pass produced no
/// frame. Whenever the loop exits on its own the slot is cleared, so consumers
/// see missing frames instead of a frozen image.
fn produce_frames(
    decoder: &mut impl FrameDecoder,
    slot: &Mutex<Option<Frame>>,
    stop: &AtomicBool,
    pace: Option<Duration>,
    looping: bool,
) {
    let mut index = 0;
    let mut frames_this_pass = 0;
    let mut consecutive_errors = 0;

    while !stop.load(Ordering::Relaxed) {
        match decoder.next_frame(index) {
            Ok(Some(frame)) => {
                consecutive_errors = 0;
                index += 1;
                frames_this_pass += 1;
                match slot.lock() {
                    Ok(mut latest) => *latest = Some(frame),
                    Err(_) => return,
                }
                if let Some(interval) = pace {
                    std::thread::sleep(interval);
                }
            }
            Ok(None) if looping && frames_this_pass > 0 => {
                log::debug!("Video input ended after {index} frames, rewinding");
                frames_this_pass = 0;
                if let Err(e) = decoder.rewind() {
                    log::warn!("Failed to rewind video input: {e}");
                    break;
                }
            }
            Ok(None) if looping => {
                log::error!("Video input has no decodable frames, stopping capture");
                break;
            }
            Ok(None) => {
                log::warn!("Video input ended after {index} frames");
                break;
            }
            Err(e) => {
                consecutive_errors += 1;
                log::warn!("Dropping undecodable frame: {e}");
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    log::error!("Giving up on video input after {consecutive_errors} errors");
                    break;
                }
            }
        }
    }

    if !stop.load(Ordering::Relaxed) {
        if let Ok(mut latest) = slot.lock() {
            *latest = None;
        }
    }
}

/// Copies the RGB plane into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
