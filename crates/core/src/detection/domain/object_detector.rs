use crate::detection::domain::detection_config::DetectorParams;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for a single-class object detector (face, eye).
///
/// Implementations may keep scratch buffers between calls, hence `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectorParams,
    ) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
