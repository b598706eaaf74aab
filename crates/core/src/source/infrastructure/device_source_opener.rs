use crate::source::domain::frame_source::{
    AcquisitionSource, FrameSource, SourceError, SourceOpener,
};

use super::ffmpeg_camera_source::FfmpegCameraSource;
use super::file_static_source::FileStaticSource;

/// Opens real devices: ffmpeg capture for cameras, image decoding for files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceSourceOpener;

impl SourceOpener for DeviceSourceOpener {
    fn open(&self, source: &AcquisitionSource) -> Result<Box<dyn FrameSource>, SourceError> {
        match source {
            AcquisitionSource::Camera(index) => Ok(Box::new(FfmpegCameraSource::open(*index)?)),
            AcquisitionSource::FileStatic(path) => Ok(Box::new(FileStaticSource::open(path)?)),
        }
    }
}
