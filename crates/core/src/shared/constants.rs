use std::time::Duration;

pub const FACE_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const FACE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

pub const EYE_CASCADE_NAME: &str = "haarcascade_eye.xml";
pub const EYE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_eye.xml";

pub const DEFAULT_CAMERA_INDEX: u32 = 0;

pub const DEFAULT_SERIAL_DEVICE: &str = "COM10";
pub const DEFAULT_SERIAL_BAUD: u32 = 57_600;

/// Cadence of the serial status line.
pub const METRIC_PUBLISH_INTERVAL: Duration = Duration::from_millis(1500);

pub const DEFAULT_SCALE_FACTOR: f64 = 1.5;
pub const MIN_SCALE_FACTOR: f64 = 1.01;
pub const MAX_SCALE_FACTOR: f64 = 2.0;

pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const MIN_MIN_NEIGHBORS: u32 = 1;
pub const MAX_MIN_NEIGHBORS: u32 = 10;

/// Outline color on RGB frames (pure blue).
pub const HIGHLIGHT_RGB: [u8; 3] = [0, 0, 255];
/// Outline intensity on grayscale frames.
pub const HIGHLIGHT_GRAY: u8 = 255;
pub const OUTLINE_THICKNESS: u32 = 2;

/// Bounding box the display fits frames into, preserving aspect ratio.
pub const DISPLAY_MAX_WIDTH: u32 = 1000;
pub const DISPLAY_MAX_HEIGHT: u32 = 800;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];
