use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

/// Where the acquisition loop pulls frames from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionSource {
    Camera(u32),
    /// A still image re-read from disk on every pull.
    FileStatic(PathBuf),
}

impl fmt::Display for AcquisitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionSource::Camera(index) => write!(f, "camera #{index}"),
            AcquisitionSource::FileStatic(path) => write!(f, "file {}", path.display()),
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The device produced nothing this time; try again.
    #[error("no frame available")]
    NoFrame,
    #[error("frame read failed: {0}")]
    ReadFailure(String),
    #[error("end of stream")]
    EndOfStream,
}

impl SourceError {
    /// Faults the loop skips over and retries on the next iteration.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::NoFrame | SourceError::ReadFailure(_))
    }
}

/// An opened, pull-based frame origin.
///
/// Implementations do no pacing; each call blocks until a frame is ready
/// or the read fails.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Opens a [`FrameSource`] for a descriptor. Called once per loop run.
pub trait SourceOpener: Send + Sync {
    fn open(&self, source: &AcquisitionSource) -> Result<Box<dyn FrameSource>, SourceError>;
}
