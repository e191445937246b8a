//! Gradient-magnitude edge mask for mount boundary extraction.

use image::imageops::FilterType;
use image::{GrayImage, Luma};

use super::MountDetectConfig;

/// Binary edge mask in the detector's working resolution.
#[derive(Debug, Clone)]
pub(crate) struct EdgeMap {
    /// 255 where the gradient magnitude passed the threshold, 0 elsewhere.
    pub mask: GrayImage,
    /// Maximum Scharr magnitude observed.
    pub max_magnitude: f32,
    /// Absolute threshold applied to the magnitude.
    pub threshold: f32,
    /// Multiplicative factors mapping working pixels back to scan pixels.
    pub scale: [f64; 2],
}

impl EdgeMap {
    pub(crate) fn is_flat(&self) -> bool {
        self.max_magnitude < 1e-3
    }

    #[inline]
    pub(crate) fn is_edge(&self, x: i64, y: i64) -> bool {
        let (w, h) = self.mask.dimensions();
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            return false;
        }
        self.mask.get_pixel(x as u32, y as u32)[0] != 0
    }
}

/// Downscale the luma plane so its longest side is at most `max_dim`.
///
/// Returns the working image and the working→scan scale factors.
pub(crate) fn working_luma(luma: &GrayImage, max_dim: u32) -> (GrayImage, [f64; 2]) {
    let (w, h) = luma.dimensions();
    let longest = w.max(h);
    if max_dim == 0 || longest <= max_dim {
        return (luma.clone(), [1.0, 1.0]);
    }
    let f = max_dim as f64 / longest as f64;
    let nw = ((w as f64 * f).round() as u32).max(1);
    let nh = ((h as f64 * f).round() as u32).max(1);
    let small = image::imageops::resize(luma, nw, nh, FilterType::Triangle);
    (small, [w as f64 / nw as f64, h as f64 / nh as f64])
}

/// Blur, take the Scharr gradient magnitude, and threshold it relative to its maximum.
pub(crate) fn edge_map(luma: &GrayImage, config: &MountDetectConfig) -> EdgeMap {
    let (work, scale) = working_luma(luma, config.detection_max_dim);
    let (w, h) = work.dimensions();
    let blurred = if config.blur_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&work, config.blur_sigma)
    } else {
        work
    };

    let gx = imageproc::gradients::horizontal_scharr(&blurred);
    let gy = imageproc::gradients::vertical_scharr(&blurred);
    let magnitude: Vec<f32> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw().iter())
        .map(|(&a, &b)| {
            let (a, b) = (a as f32, b as f32);
            (a * a + b * b).sqrt()
        })
        .collect();
    let max_magnitude = magnitude.iter().copied().fold(0.0f32, f32::max);
    let threshold = config.grad_threshold * max_magnitude;

    let mut mask = GrayImage::new(w, h);
    if max_magnitude >= 1e-3 {
        for (px, &m) in mask.pixels_mut().zip(magnitude.iter()) {
            if m >= threshold {
                *px = Luma([255]);
            }
        }
    }

    tracing::debug!(
        "edge map {}x{} (scale {:.3}), max |grad| = {:.1}, threshold = {:.1}",
        w,
        h,
        scale[0],
        max_magnitude,
        threshold
    );

    EdgeMap {
        mask,
        max_magnitude,
        threshold,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_no_edges() {
        let img = GrayImage::from_pixel(64, 48, Luma([128]));
        let map = edge_map(&img, &MountDetectConfig::default());
        assert!(map.is_flat());
        assert!(map.mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn step_edge_is_marked() {
        let mut img = GrayImage::from_pixel(64, 48, Luma([20]));
        for y in 0..48 {
            for x in 32..64 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        let map = edge_map(&img, &MountDetectConfig::default());
        assert!(map.is_edge(31, 24) || map.is_edge(32, 24));
        assert!(!map.is_edge(5, 24));
        assert!(!map.is_edge(60, 24));
    }

    #[test]
    fn large_images_are_downscaled() {
        let img = GrayImage::new(3000, 1500);
        let (small, scale) = working_luma(&img, 1000);
        assert_eq!(small.dimensions(), (1000, 500));
        assert_eq!(scale, [3.0, 3.0]);
    }
}
