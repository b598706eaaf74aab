use ndarray::ArrayViewMut3;

/// Pixel layout of a [`Frame`]. The channel count follows from the tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single decoded image: contiguous bytes in row-major order.
///
/// Format conversion happens at I/O boundaries and in [`Frame::to_grayscale`];
/// everything else treats pixel data as opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (format.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Single-channel copy using BT.601 luma weights. Gray frames are cloned.
    pub fn to_grayscale(&self) -> Frame {
        match self.format {
            PixelFormat::Gray8 => self.clone(),
            PixelFormat::Rgb8 => {
                let gray = self
                    .data
                    .chunks_exact(3)
                    .map(|px| luma(px[0], px[1], px[2]))
                    .collect();
                Frame::new(gray, self.width, self.height, PixelFormat::Gray8)
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, PixelFormat::Rgb8);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_clone_is_independent() {
        let frame = Frame::new(vec![100u8; 12], 2, 2, PixelFormat::Rgb8);
        let mut cloned = frame.clone();
        cloned.as_ndarray_mut()[[0, 0, 0]] = 0;
        assert_eq!(frame.data()[0], 100);
        assert_eq!(cloned.data()[0], 0);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Rgb8);
    }

    #[test]
    fn test_as_ndarray_mut_shape_for_gray() {
        let mut frame = Frame::new(vec![0u8; 8], 4, 2, PixelFormat::Gray8);
        assert_eq!(frame.as_ndarray_mut().shape(), &[2, 4, 1]);
    }

    #[test]
    fn test_as_ndarray_mut_modification() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb8);
        frame.as_ndarray_mut()[[0, 1, 2]] = 128;
        assert_eq!(frame.data()[5], 128);
    }

    #[test]
    fn test_to_grayscale_keeps_dimensions() {
        let frame = Frame::new(vec![10u8; 5 * 3 * 3], 5, 3, PixelFormat::Rgb8);
        let gray = frame.to_grayscale();
        assert_eq!(gray.width(), 5);
        assert_eq!(gray.height(), 3);
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.data().len(), 15);
    }

    #[rstest]
    #[case::white([255, 255, 255], 255)]
    #[case::black([0, 0, 0], 0)]
    #[case::red([255, 0, 0], 76)]
    #[case::green([0, 255, 0], 150)]
    #[case::blue([0, 0, 255], 29)]
    fn test_to_grayscale_luma(#[case] rgb: [u8; 3], #[case] expected: u8) {
        let frame = Frame::new(rgb.to_vec(), 1, 1, PixelFormat::Rgb8);
        assert_eq!(frame.to_grayscale().data()[0], expected);
    }

    #[test]
    fn test_to_grayscale_on_gray_is_identity() {
        let frame = Frame::new(vec![1, 2, 3, 4], 2, 2, PixelFormat::Gray8);
        assert_eq!(frame.to_grayscale().data(), frame.data());
    }
}
