//! Conversions from pipeline results to what the window shows.
use iced::widget::image::Handle;

use facecount_core::detection::domain::detection_config::ModelVariant;
use facecount_core::pipeline::detection_pipeline::DetectionResult;
use facecount_core::shared::constants::{DISPLAY_MAX_HEIGHT, DISPLAY_MAX_WIDTH};
use facecount_core::shared::frame::{Frame, PixelFormat};

/// A decoded frame ready for the image widget.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub handle: Handle,
    pub width: f32,
    pub height: f32,
}

impl DisplayFrame {
    pub fn from_frame(frame: &Frame) -> Self {
        let (width, height) = fit_within(
            frame.width(),
            frame.height(),
            DISPLAY_MAX_WIDTH,
            DISPLAY_MAX_HEIGHT,
        );
        Self {
            handle: Handle::from_rgba(frame.width(), frame.height(), frame_to_rgba(frame)),
            width,
            height,
        }
    }
}

/// Largest size with the frame's aspect ratio that fits the box.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (0.0, 0.0);
    }
    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    ((width as f32 * scale).round(), (height as f32 * scale).round())
}

pub fn frame_to_rgba(frame: &Frame) -> Vec<u8> {
    match frame.format() {
        PixelFormat::Rgb8 => frame
            .data()
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        PixelFormat::Gray8 => frame.data().iter().flat_map(|&v| [v, v, v, 255]).collect(),
    }
}

pub fn info_text(result: &DetectionResult) -> String {
    let noun = match &result.model_variant {
        ModelVariant::Face => "Faces",
        ModelVariant::Eye => "Eyes",
        ModelVariant::Unrecognized(name) => name.as_str(),
    };
    format!("Number of {noun}: {}", result.count)
}
