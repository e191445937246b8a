//! Side-by-side stereo composition.

use image::RgbImage;

use crate::align::RectifiedPair;
use crate::error::SlideError;

/// The terminal artifact: left eye then right eye, `2·W × H`.
#[derive(Debug, Clone, PartialEq)]
pub struct VRStereoFrame {
    image: RgbImage,
}

impl VRStereoFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Concatenates a rectified pair horizontally.
#[derive(Debug, Clone, Copy, Default)]
pub struct VRComposer;

impl VRComposer {
    pub fn compose(&self, pair: &RectifiedPair) -> Result<VRStereoFrame, SlideError> {
        let (lw, lh) = pair.left.dimensions();
        let (rw, rh) = pair.right.dimensions();
        if (lw, lh) != (rw, rh) {
            return Err(SlideError::ShapeMismatch {
                left: [lw, lh],
                right: [rw, rh],
            });
        }
        let mut image = RgbImage::new(2 * lw, lh);
        image::imageops::replace(&mut image, &pair.left, 0, 0);
        image::imageops::replace(&mut image, &pair.right, lw as i64, 0);
        tracing::debug!("composed {}x{} stereo frame", 2 * lw, lh);
        Ok(VRStereoFrame { image })
    }
}
