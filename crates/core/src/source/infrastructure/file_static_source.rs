use std::path::{Path, PathBuf};

use crate::shared::frame::{Frame, PixelFormat};
use crate::source::domain::frame_source::{FrameSource, SourceError};

/// Presents a single image file as a live feed.
///
/// Every pull decodes the file again, so replacing the file on disk shows
/// up on the next frame. Nothing is cached between pulls.
pub struct FileStaticSource {
    path: PathBuf,
}

impl FileStaticSource {
    /// Fails with [`SourceError::Unavailable`] when `path` is not an existing file.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a readable file",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl FrameSource for FileStaticSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let img = image::open(&self.path)
            .map_err(|e| SourceError::ReadFailure(format!("{}: {e}", self.path.display())))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, PixelFormat::Rgb8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_test_image(dir: &Path, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join("test.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb(rgb);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_nonexistent_is_unavailable() {
        let result = FileStaticSource::open(Path::new("/nonexistent/test.png"));
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_open_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileStaticSource::open(dir.path()).is_err());
    }

    #[test]
    fn test_frame_is_rgb_with_file_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80, [50, 100, 200]);
        let mut source = FileStaticSource::open(&path).unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 80);
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_every_pull_yields_a_fresh_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 4, 4, [1, 2, 3]);
        let mut source = FileStaticSource::open(&path).unwrap();

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.data(), second.data());
    }

    #[test]
    fn test_replaced_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 4, 4, [1, 2, 3]);
        let mut source = FileStaticSource::open(&path).unwrap();
        assert_eq!(&source.next_frame().unwrap().data()[..3], &[1, 2, 3]);

        write_test_image(dir.path(), 4, 4, [9, 8, 7]);
        assert_eq!(&source.next_frame().unwrap().data()[..3], &[9, 8, 7]);
    }

    #[test]
    fn test_undecodable_file_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not an image").unwrap();
        let mut source = FileStaticSource::open(&path).unwrap();

        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, SourceError::ReadFailure(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_deleted_file_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 4, 4, [1, 2, 3]);
        let mut source = FileStaticSource::open(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(matches!(
            source.next_frame(),
            Err(SourceError::ReadFailure(_))
        ));
    }
}
