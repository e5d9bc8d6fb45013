pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// InsightFace age/gender head. Local-only: place it in the models directory.
pub const AGE_GENDER_MODEL_NAME: &str = "genderage.onnx";

/// FER+ expression classifier. Local-only: place it in the models directory.
pub const EXPRESSION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";

pub const DEFAULT_DISPLAY_WIDTH: u32 = 640;
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 480;

/// Euclidean descriptor distance at or below which a face matches an identity.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Recognition events between two greetings for the same identity.
pub const DEFAULT_THROTTLE_PERIOD: u64 = 15;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

pub const DEFAULT_GREETING: &str = "Hello {name}";

pub const UNKNOWN_LABEL: &str = "unknown";

/// Expressions below this probability are not drawn.
pub const MIN_EXPRESSION_CONFIDENCE: f32 = 0.1;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
