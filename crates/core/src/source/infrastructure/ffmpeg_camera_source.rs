use crate::shared::frame::{Frame, PixelFormat};
use crate::source::domain::frame_source::{FrameSource, SourceError};

/// Live camera capture via libavdevice.
///
/// Each pull reads one packet from the device and decodes it to RGB24.
/// Packets that do not complete a picture surface as [`SourceError::NoFrame`];
/// webcams drop and stall frames routinely, so callers are expected to retry.
pub struct FfmpegCameraSource {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegCameraSource is owned by exactly one thread at a time (the
// acquisition worker). The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegCameraSource {}

/// Input format name and device URL for the platform's capture backend.
fn capture_device(index: u32) -> (&'static str, String) {
    #[cfg(target_os = "linux")]
    {
        ("video4linux2,v4l2", format!("/dev/video{index}"))
    }
    #[cfg(target_os = "macos")]
    {
        ("avfoundation", format!("{index}:none"))
    }
    #[cfg(target_os = "windows")]
    {
        ("vfwcap", index.to_string())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        ("video4linux2,v4l2", format!("/dev/video{index}"))
    }
}

fn unavailable(context: &str) -> impl FnOnce(ffmpeg_next::Error) -> SourceError + '_ {
    move |e| SourceError::Unavailable(format!("{context}: {e}"))
}

impl FfmpegCameraSource {
    pub fn open(index: u32) -> Result<Self, SourceError> {
        ffmpeg_next::init().map_err(unavailable("ffmpeg init"))?;
        ffmpeg_next::device::register_all();

        let (format_name, device) = capture_device(index);
        let input_format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == format_name)
            .ok_or_else(|| {
                SourceError::Unavailable(format!("capture backend {format_name} not available"))
            })?;

        let ictx = ffmpeg_next::format::open_with(
            &device,
            &ffmpeg_next::format::format::Format::Input(input_format),
            ffmpeg_next::Dictionary::new(),
        )
        .map_err(unavailable(&device))?
        .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| SourceError::Unavailable(format!("{device}: no video stream")))?;
        let video_stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(unavailable("codec parameters"))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(unavailable("video decoder"))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(unavailable("scaler"))?;

        log::info!("Opened camera {device} ({width}x{height}, {format_name})");

        Ok(Self {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| SourceError::ReadFailure(e.to_string()))?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(
            pixels,
            self.width,
            self.height,
            PixelFormat::Rgb8,
        )))
    }
}

impl FrameSource for FfmpegCameraSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(frame);
        }

        let Some((stream, packet)) = self.ictx.packets().next() else {
            return Err(SourceError::EndOfStream);
        };
        if stream.index() != self.video_stream_index {
            return Err(SourceError::NoFrame);
        }
        if self.decoder.send_packet(&packet).is_err() {
            return Err(SourceError::NoFrame);
        }

        self.try_receive()?.ok_or(SourceError::NoFrame)
    }
}

/// Copies RGB24 rows out of a possibly padded ffmpeg plane.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_device_uses_requested_index() {
        let (format_name, device) = capture_device(3);
        assert!(!format_name.is_empty());
        assert!(device.contains('3'));
    }

    #[test]
    fn test_open_missing_device_is_unavailable() {
        // Index far beyond anything a test host has attached.
        let result = FfmpegCameraSource::open(987);
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
