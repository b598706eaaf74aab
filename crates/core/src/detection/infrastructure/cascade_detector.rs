//! Multi-scale sliding-window detector over a [`HaarCascade`].
use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::detection::domain::detection_config::DetectorParams;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::detection::domain::rect_grouper::RectGrouper;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::haar_cascade::{CascadeError, HaarCascade, IntegralImages};

/// Scans an image pyramid (each level `1 / scale_factor^k` of the original)
/// with the cascade's base window and groups the raw hits.
pub struct CascadeDetector {
    cascade: HaarCascade,
    grouper: RectGrouper,
}

impl CascadeDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self {
            cascade,
            grouper: RectGrouper::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let cascade = HaarCascade::load(path)?;
        log::info!(
            "Loaded cascade {} ({} stages, {}x{} window)",
            path.display(),
            cascade.stage_count(),
            cascade.window_size().0,
            cascade.window_size().1,
        );
        Ok(Self::new(cascade))
    }

    /// Ungrouped hits in original-image coordinates.
    fn raw_hits(&self, gray: &GrayImage, scale_factor: f64) -> Vec<Region> {
        let (win_w, win_h) = self.cascade.window_size();
        let (img_w, img_h) = gray.dimensions();
        let mut hits = Vec::new();

        let mut factor = 1.0f64;
        loop {
            let scaled_w = (img_w as f64 / factor).round() as u32;
            let scaled_h = (img_h as f64 / factor).round() as u32;
            // A level must leave room to slide the window at least once.
            if (scaled_w as usize) <= win_w || (scaled_h as usize) <= win_h {
                break;
            }

            let resized;
            let level = if scaled_w == img_w && scaled_h == img_h {
                gray
            } else {
                resized = imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle);
                &resized
            };

            let ii = IntegralImages::new(level.as_raw(), scaled_w as usize, scaled_h as usize);
            let step = if factor > 2.0 { 1 } else { 2 };
            let hit_w = (win_w as f64 * factor).round() as i32;
            let hit_h = (win_h as f64 * factor).round() as i32;

            for y in (0..scaled_h as usize - win_h).step_by(step) {
                for x in (0..scaled_w as usize - win_w).step_by(step) {
                    if self.cascade.accepts(&ii, x, y) {
                        hits.push(Region::new(
                            (x as f64 * factor).round() as i32,
                            (y as f64 * factor).round() as i32,
                            hit_w,
                            hit_h,
                        ));
                    }
                }
            }

            factor *= scale_factor;
        }

        hits
    }
}

impl ObjectDetector for CascadeDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectorParams,
    ) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
            return Err(format!("scale factor must exceed 1.0, got {}", params.scale_factor).into());
        }

        let gray = frame.to_grayscale();
        let image = GrayImage::from_raw(gray.width(), gray.height(), gray.into_data())
            .ok_or("frame buffer does not match its dimensions")?;

        let hits = self.raw_hits(&image, params.scale_factor);
        log::trace!("{} raw cascade hits", hits.len());
        Ok(self.grouper.group(&hits, params.min_neighbors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;
    use crate::test_support::{SQUARE_CASCADE_XML, two_squares_frame, NEVER_CASCADE_XML};

    fn square_detector() -> CascadeDetector {
        CascadeDetector::new(HaarCascade::from_xml(SQUARE_CASCADE_XML).unwrap())
    }

    fn params(scale_factor: f64, min_neighbors: u32) -> DetectorParams {
        DetectorParams {
            scale_factor,
            min_neighbors,
        }
    }

    #[test]
    fn test_finds_both_squares() {
        let frame = two_squares_frame(PixelFormat::Rgb8);
        let found = square_detector().detect(&frame, &params(2.0, 5)).unwrap();
        assert_eq!(found.len(), 2);

        let mut xs: Vec<i32> = found.iter().map(|r| r.x).collect();
        xs.sort();
        // Each cluster averages windows sliding across its 40 px square.
        assert!((15..=45).contains(&xs[0]), "{xs:?}");
        assert!((115..=145).contains(&xs[1]), "{xs:?}");
        assert!(found.iter().all(|r| r.width == 20 && r.height == 20));
    }

    #[test]
    fn test_gray_frame_gives_same_count() {
        let frame = two_squares_frame(PixelFormat::Gray8);
        let found = square_detector().detect(&frame, &params(2.0, 5)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_blank_frame_has_no_detections() {
        let frame = Frame::new(vec![0; 200 * 100], 200, 100, PixelFormat::Gray8);
        let found = square_detector().detect(&frame, &params(1.5, 5)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_frame_smaller_than_window() {
        let frame = Frame::new(vec![255; 10 * 10], 10, 10, PixelFormat::Gray8);
        let found = square_detector().detect(&frame, &params(1.5, 1)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_frame_equal_to_window_is_not_scanned() {
        let frame = Frame::new(vec![255; 20 * 20], 20, 20, PixelFormat::Gray8);
        let found = square_detector().detect(&frame, &params(1.5, 0)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_scan_stops_before_last_offset() {
        // 22x21 leaves offsets 0..2 by 0..1: one window at step 2.
        let gray = GrayImage::from_pixel(22, 21, image::Luma([255]));
        let hits = square_detector().raw_hits(&gray, 1.5);
        assert_eq!(hits, vec![Region::new(0, 0, 20, 20)]);
    }

    #[test]
    fn test_never_firing_cascade() {
        let mut detector = CascadeDetector::new(HaarCascade::from_xml(NEVER_CASCADE_XML).unwrap());
        let frame = two_squares_frame(PixelFormat::Rgb8);
        assert!(detector.detect(&frame, &params(1.5, 5)).unwrap().is_empty());
    }

    #[test]
    fn test_zero_min_neighbors_returns_raw_hits() {
        let frame = two_squares_frame(PixelFormat::Gray8);
        let found = square_detector().detect(&frame, &params(2.0, 0)).unwrap();
        assert!(found.len() > 100);
    }

    #[test]
    fn test_rejects_scale_factor_not_above_one() {
        let frame = two_squares_frame(PixelFormat::Gray8);
        assert!(square_detector().detect(&frame, &params(1.0, 5)).is_err());
        assert!(square_detector().detect(&frame, &params(f64::NAN, 5)).is_err());
    }

    #[test]
    #[ignore = "downloads the stock frontal-face cascade"]
    fn test_stock_face_cascade_loads() {
        use crate::shared::constants::{FACE_CASCADE_NAME, FACE_CASCADE_URL};
        use crate::shared::model_resolver;

        let path = model_resolver::resolve(FACE_CASCADE_NAME, FACE_CASCADE_URL, None).unwrap();
        let detector = CascadeDetector::load(&path).unwrap();
        assert_eq!(detector.cascade.window_size(), (24, 24));
        assert!(detector.cascade.stage_count() > 10);
    }

    #[test]
    #[ignore = "downloads the stock frontal-face cascade and a sample portrait"]
    fn test_stock_face_cascade_counts_two_faces() {
        use crate::shared::constants::{FACE_CASCADE_NAME, FACE_CASCADE_URL};
        use crate::shared::model_resolver;

        const PORTRAIT_URL: &str =
            "https://raw.githubusercontent.com/opencv/opencv/4.x/samples/data/lena.jpg";

        let path = model_resolver::resolve(FACE_CASCADE_NAME, FACE_CASCADE_URL, None).unwrap();
        let mut detector = CascadeDetector::load(&path).unwrap();

        let bytes = reqwest::blocking::get(PORTRAIT_URL)
            .unwrap()
            .error_for_status()
            .unwrap()
            .bytes()
            .unwrap();
        let portrait = image::load_from_memory(&bytes)
            .unwrap()
            .resize_exact(256, 256, FilterType::Triangle)
            .to_rgb8();

        // Two copies side by side: two faces in one frame.
        let mut canvas = image::RgbImage::new(512, 256);
        imageops::replace(&mut canvas, &portrait, 0, 0);
        imageops::replace(&mut canvas, &portrait, 256, 0);
        let frame = Frame::new(canvas.into_raw(), 512, 256, PixelFormat::Rgb8);

        let found = detector.detect(&frame, &params(1.1, 5)).unwrap();
        assert_eq!(found.len(), 2, "{found:?}");
        let mut xs: Vec<i32> = found.iter().map(|r| r.x).collect();
        xs.sort();
        assert!(xs[0] < 256 && xs[1] >= 256, "{xs:?}");
    }
}
