use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;

/// The camera (or replayed file) could not be opened or decoded.
///
/// Fatal to video: the detection pipeline is never started without a source.
#[derive(Debug, thiserror::Error)]
pub enum MediaAccessError {
    #[error("Video input format '{0}' is not available in this ffmpeg build")]
    InputFormatUnavailable(String),
    #[error("Failed to open video input '{input}': {reason}")]
    Open { input: String, reason: String },
    #[error("No video stream in '{0}'")]
    NoVideoStream(String),
    #[error("Failed to set up decoding: {0}")]
    Decoder(String),
    #[error("Video source is already open")]
    AlreadyOpen,
    #[error("Failed to start thread: {0}")]
    Thread(String),
}

/// A live stream of frames at a fixed display geometry.
///
/// Capture runs independently of detection; callers sample the most recent
/// frame whenever they are ready for one.
pub trait VideoSource: Send {
    /// Starts capture and returns the geometry every frame will have.
    fn open(&mut self) -> Result<DisplayGeometry, MediaAccessError>;

    /// The newest decoded frame, or `None` before the first one arrives.
    ///
    /// Returns the same frame again when nothing new was decoded since the
    /// previous call.
    fn latest_frame(&self) -> Option<Frame>;

    /// Stops capture and releases the device. Idempotent.
    fn close(&mut self);
}
