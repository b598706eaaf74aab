use std::path::Path;

use crate::shared::frame::{Frame, PixelFormat};

/// Saves an annotated frame; the format follows the file extension.
pub fn write_frame(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (w, h) = (frame.width(), frame.height());
    let data = frame.data().to_vec();
    match frame.format() {
        PixelFormat::Rgb8 => image::RgbImage::from_raw(w, h, data)
            .ok_or("frame buffer does not match its dimensions")?
            .save(path)?,
        PixelFormat::Gray8 => image::GrayImage::from_raw(w, h, data)
            .ok_or("frame buffer does not match its dimensions")?
            .save(path)?,
    }
    log::debug!("Wrote {w}x{h} frame to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_squares_frame;

    #[test]
    fn test_rgb_frame_roundtrips_through_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let frame = two_squares_frame(PixelFormat::Rgb8);
        write_frame(&path, &frame).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (200, 100));
        assert_eq!(loaded.as_raw().as_slice(), frame.data());
    }

    #[test]
    fn test_gray_frame_is_saved_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        write_frame(&path, &two_squares_frame(PixelFormat::Gray8)).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.color(), image::ColorType::L8);
    }
}
