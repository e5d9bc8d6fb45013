use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::gallery::ReferenceIdentity;
use crate::shared::constants::{
    DEFAULT_GREETING, DEFAULT_MATCH_THRESHOLD, DEFAULT_THROTTLE_PERIOD, DEFAULT_TICK_INTERVAL_MS,
    UNKNOWN_LABEL,
};
use crate::shared::display_geometry::DisplayGeometry;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which optional perception capabilities the pipeline requests.
///
/// Landmarks and descriptors are always requested; matching needs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub expressions: bool,
    pub age_gender: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            expressions: true,
            age_gender: true,
        }
    }
}

/// Capture device selection, passed to ffmpeg's input-device layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device name or path (`/dev/video0`, `0`, `video=...`), or a video file.
    pub device: String,
    /// ffmpeg input format (`v4l2`, `avfoundation`, `dshow`). `None` opens
    /// `device` as a regular file or URL.
    pub input_format: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self {
                device: "0".to_string(),
                input_format: Some("avfoundation".to_string()),
            }
        }
        #[cfg(target_os = "windows")]
        {
            Self {
                device: "video=Integrated Camera".to_string(),
                input_format: Some("dshow".to_string()),
            }
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            Self {
                device: "/dev/video0".to_string(),
                input_format: Some("v4l2".to_string()),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacewatchConfig {
    pub display: DisplayGeometry,
    pub tick_interval_ms: u64,
    pub match_threshold: f64,
    pub throttle_period: u64,
    /// Greeting spoken for a recognized identity; `{name}` is substituted.
    pub greeting: String,
    pub models_dir: Option<PathBuf>,
    pub features: FeatureToggles,
    pub detector_confidence: f64,
    pub camera: CameraConfig,
    /// Speech synthesis program invoked with the greeting as its argument.
    /// `None` only logs greetings.
    pub speech_command: Option<String>,
    pub identities: Vec<ReferenceIdentity>,
}

impl Default for FacewatchConfig {
    fn default() -> Self {
        Self {
            display: DisplayGeometry::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            throttle_period: DEFAULT_THROTTLE_PERIOD,
            greeting: DEFAULT_GREETING.to_string(),
            models_dir: None,
            features: FeatureToggles::default(),
            detector_confidence: 0.5,
            camera: CameraConfig::default(),
            speech_command: default_speech_command(),
            identities: Vec::new(),
        }
    }
}

fn default_speech_command() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("say".to_string())
    } else if cfg!(target_os = "windows") {
        None
    } else {
        Some("espeak".to_string())
    }
}

impl FacewatchConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Facewatch").join("config.json"))
    }

    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    /// Relative paths inside the file resolve against the file's directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display geometry must be non-zero, got {}",
                self.display
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.throttle_period == 0 {
            return Err(ConfigError::Invalid(
                "throttle_period must be positive".to_string(),
            ));
        }
        if self.match_threshold.is_nan() || self.match_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "match_threshold must be positive, got {}",
                self.match_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )));
        }
        if let Some(identity) = self.identities.iter().find(|i| i.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "identity for {} has an empty name",
                identity.image.display()
            )));
        }
        if let Some(identity) = self
            .identities
            .iter()
            .find(|i| i.name.trim().eq_ignore_ascii_case(UNKNOWN_LABEL))
        {
            return Err(ConfigError::Invalid(format!(
                "identity name '{}' is reserved for unmatched faces",
                identity.name
            )));
        }
        Ok(())
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        for identity in &mut self.identities {
            if identity.image.is_relative() {
                identity.image = base.join(&identity.image);
            }
        }
        if let Some(dir) = self.models_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
