//! Raster types and sampling helpers.

use image::{DynamicImage, GrayImage, RgbImage};

/// One decoded slide scan. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct RawScan {
    pixels: RgbImage,
    source_channels: u8,
}

impl RawScan {
    /// Wrap an RGB8 grid.
    pub fn new(pixels: RgbImage) -> Self {
        Self {
            pixels,
            source_channels: 3,
        }
    }

    /// Expand a single-channel scan to RGB, remembering the source layout.
    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            pixels: DynamicImage::ImageLuma8(gray.clone()).to_rgb8(),
            source_channels: 1,
        }
    }

    /// Convert any decoded image. Alpha is dropped; deep formats are reduced to 8 bits.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self {
            pixels: img.to_rgb8(),
            source_channels: img.color().channel_count(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Channel count of the decoded source (1, 2, 3 or 4).
    pub fn channels(&self) -> u8 {
        self.source_channels
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Rec. 601 luma plane.
    pub fn luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.pixels)
    }

    /// The same scan turned upside down (a slide inserted rotated by 180°).
    pub fn rotated_180(&self) -> Self {
        Self {
            pixels: image::imageops::rotate180(&self.pixels),
            source_channels: self.source_channels,
        }
    }
}

/// Integer taps and weights for bilinear sampling at a continuous point.
///
/// Pixel `k` is centered at `k + 0.5`; samples outside the grid clamp to the
/// nearest edge pixel.
#[inline]
fn bilinear_taps(x: f64, y: f64, w: u32, h: u32) -> Option<(usize, usize, usize, usize, f32, f32)> {
    if !x.is_finite() || !y.is_finite() || w == 0 || h == 0 {
        return None;
    }
    let fx = (x - 0.5).clamp(0.0, (w - 1) as f64);
    let fy = (y - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(w as usize - 1);
    let y1 = (y0 + 1).min(h as usize - 1);
    Some((x0, y0, x1, y1, (fx - x0 as f64) as f32, (fy - y0 as f64) as f32))
}

/// Bilinearly interpolated luma at a continuous pixel coordinate.
pub(crate) fn sample_luma(img: &GrayImage, x: f64, y: f64) -> Option<f32> {
    let (w, h) = img.dimensions();
    let (x0, y0, x1, y1, tx, ty) = bilinear_taps(x, y, w, h)?;
    let raw = img.as_raw();
    let stride = w as usize;
    let at = |xx: usize, yy: usize| raw[yy * stride + xx] as f32;
    let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
    let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
    Some(top * (1.0 - ty) + bottom * ty)
}

/// Bilinearly interpolated RGB at a continuous pixel coordinate.
pub(crate) fn sample_rgb(img: &RgbImage, x: f64, y: f64) -> Option<[u8; 3]> {
    let (w, h) = img.dimensions();
    let (x0, y0, x1, y1, tx, ty) = bilinear_taps(x, y, w, h)?;
    let raw = img.as_raw();
    let stride = w as usize * 3;
    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let at = |xx: usize, yy: usize| raw[yy * stride + xx * 3 + c] as f32;
        let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
        let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
        *o = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}
