use ndarray::{s, Axis};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::shared::constants::{HIGHLIGHT_GRAY, HIGHLIGHT_RGB, OUTLINE_THICKNESS};
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::region::Region;

/// Draws a solid outline along the inner edge of each region.
///
/// Regions that overhang the frame are clipped; a region entirely outside
/// draws nothing.
pub struct RectangleAnnotator {
    rgb: [u8; 3],
    gray: u8,
    thickness: u32,
}

impl RectangleAnnotator {
    pub fn new(rgb: [u8; 3], gray: u8, thickness: u32) -> Self {
        Self {
            rgb,
            gray,
            thickness: thickness.max(1),
        }
    }

    fn color(&self, format: PixelFormat) -> &[u8] {
        match format {
            PixelFormat::Rgb8 => &self.rgb,
            PixelFormat::Gray8 => std::slice::from_ref(&self.gray),
        }
    }
}

impl Default for RectangleAnnotator {
    fn default() -> Self {
        Self::new(HIGHLIGHT_RGB, HIGHLIGHT_GRAY, OUTLINE_THICKNESS)
    }
}

/// Top, bottom, left and right strips of the outline.
fn outline_bands(r: &Region, thickness: i32) -> [Region; 4] {
    let th = thickness.min(r.height);
    let tw = thickness.min(r.width);
    [
        Region::new(r.x, r.y, r.width, th),
        Region::new(r.x, r.bottom() - th, r.width, th),
        Region::new(r.x, r.y, tw, r.height),
        Region::new(r.right() - tw, r.y, tw, r.height),
    ]
}

impl FrameAnnotator for RectangleAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        regions: &[Region],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (fw, fh) = (frame.width(), frame.height());
        let color = self.color(frame.format()).to_vec();
        let mut pixels = frame.as_ndarray_mut();

        for region in regions {
            if region.width <= 0 || region.height <= 0 {
                continue;
            }
            for band in outline_bands(region, self.thickness as i32) {
                let Some(b) = band.clamp_to(fw, fh) else {
                    continue;
                };
                let (x0, y0) = (b.x as usize, b.y as usize);
                let (x1, y1) = (b.right() as usize, b.bottom() as usize);
                let mut patch = pixels.slice_mut(s![y0..y1, x0..x1, ..]);
                for (mut plane, &c) in patch.axis_iter_mut(Axis(2)).zip(&color) {
                    plane.fill(c);
                }
            }
        }

        Ok(())
    }
}
