//! Synthetic rasters for unit, integration and bench code.
//!
//! Depends only on `image` and `rand` so integration tests and benches can
//! pull it in with `#[path]`.
#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rotate_about(p: [f64; 2], center: [f64; 2], deg: f64) -> [f64; 2] {
    let (s, c) = deg.to_radians().sin_cos();
    let (dx, dy) = (p[0] - center[0], p[1] - center[1]);
    [center[0] + c * dx - s * dy, center[1] + s * dx + c * dy]
}

/// Corners `[TL, TR, BR, BL]` of a `size` rectangle centered at `center`,
/// rotated by `deg` (positive turns +x towards +y).
pub(crate) fn rotated_rect_corners(center: [f64; 2], size: [f64; 2], deg: f64) -> [[f64; 2]; 4] {
    let (hw, hh) = (size[0] / 2.0, size[1] / 2.0);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
        .map(|(dx, dy)| rotate_about([center[0] + dx, center[1] + dy], center, deg))
}

/// Gray image with a filled rotated rectangle of value `fg` on `bg`.
pub(crate) fn rotated_rect_gray(
    w: u32,
    h: u32,
    center: [f64; 2],
    size: [f64; 2],
    deg: f64,
    fg: u8,
    bg: u8,
) -> GrayImage {
    let (hw, hh) = (size[0] / 2.0, size[1] / 2.0);
    GrayImage::from_fn(w, h, |x, y| {
        let p = rotate_about([x as f64 + 0.5, y as f64 + 0.5], center, -deg);
        let (u, v) = (p[0] - center[0], p[1] - center[1]);
        if u.abs() <= hw && v.abs() <= hh {
            Luma([fg])
        } else {
            Luma([bg])
        }
    })
}

/// Uniform gray noise from a seeded generator.
pub(crate) fn noise_gray(w: u32, h: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(w, h, |_, _| Luma([rng.gen::<u8>()]))
}

/// Uniform RGB noise from a seeded generator.
pub(crate) fn noise_rgb(w: u32, h: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(w, h, |_, _| Rgb([rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()]))
}

/// A rendered stereo slide: a uniform card with a window holding two tinted
/// exposures separated by a dark strip.
///
/// Each exposure carries a top-to-bottom brightness ramp so upright output
/// can be told apart from upside-down output.
#[derive(Debug, Clone)]
pub(crate) struct SlideScene {
    pub size: [u32; 2],
    /// Window `[x0, y0, x1, y1]` before rotation.
    pub window: [f64; 4],
    /// Dividing strip `[x0, x1]` inside the window.
    pub gap: [f64; 2],
    /// Rotation of the whole mount about the scan center, degrees.
    pub rotation_deg: f64,
    pub card: [u8; 3],
    pub left_tint: [u8; 3],
    pub right_tint: [u8; 3],
    pub gap_level: u8,
}

impl SlideScene {
    /// 3000×1500 scan, two 1200×1200 exposures with a 100 px strip.
    pub(crate) fn full_size() -> Self {
        Self {
            size: [3000, 1500],
            window: [250.0, 150.0, 2750.0, 1350.0],
            gap: [1450.0, 1550.0],
            rotation_deg: 0.0,
            card: [220, 220, 220],
            left_tint: [150, 100, 80],
            right_tint: [80, 100, 150],
            gap_level: 10,
        }
    }

    /// 1200×600 scan, two 470×480 exposures with a 20 px strip.
    pub(crate) fn small() -> Self {
        Self {
            size: [1200, 600],
            window: [120.0, 60.0, 1080.0, 540.0],
            gap: [590.0, 610.0],
            ..Self::full_size()
        }
    }

    pub(crate) fn with_rotation(mut self, deg: f64) -> Self {
        self.rotation_deg = deg;
        self
    }

    pub(crate) fn with_gap(mut self, gap: [f64; 2]) -> Self {
        self.gap = gap;
        self
    }

    pub(crate) fn center(&self) -> [f64; 2] {
        [self.size[0] as f64 / 2.0, self.size[1] as f64 / 2.0]
    }

    /// Left exposure `[x0, y0, x1, y1]` before rotation.
    pub(crate) fn left_frame(&self) -> [f64; 4] {
        [self.window[0], self.window[1], self.gap[0], self.window[3]]
    }

    /// Right exposure `[x0, y0, x1, y1]` before rotation.
    pub(crate) fn right_frame(&self) -> [f64; 4] {
        [self.gap[1], self.window[1], self.window[2], self.window[3]]
    }

    /// Window corners in scan coordinates, after rotation.
    pub(crate) fn window_corners(&self) -> [[f64; 2]; 4] {
        let w = self.window;
        [[w[0], w[1]], [w[2], w[1]], [w[2], w[3]], [w[0], w[3]]]
            .map(|p| rotate_about(p, self.center(), self.rotation_deg))
    }

    pub(crate) fn render(&self) -> RgbImage {
        let center = self.center();
        let [wx0, wy0, wx1, wy1] = self.window;
        RgbImage::from_fn(self.size[0], self.size[1], |x, y| {
            let p = rotate_about([x as f64 + 0.5, y as f64 + 0.5], center, -self.rotation_deg);
            let inside = p[0] >= wx0 && p[0] < wx1 && p[1] >= wy0 && p[1] < wy1;
            if !inside {
                return Rgb(self.card);
            }
            if p[0] >= self.gap[0] && p[0] < self.gap[1] {
                return Rgb([self.gap_level; 3]);
            }
            let tint = if p[0] < self.gap[0] {
                self.left_tint
            } else {
                self.right_tint
            };
            let ramp = 0.8 + 0.4 * (p[1] - wy0) / (wy1 - wy0);
            Rgb(tint.map(|c| (c as f64 * ramp).round().clamp(0.0, 255.0) as u8))
        })
    }
}

/// Mean of each channel over a rectangular block.
pub(crate) fn mean_rgb(img: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [f64; 3] {
    let mut acc = [0.0; 3];
    let mut n = 0.0;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = img.get_pixel(x, y);
            for c in 0..3 {
                acc[c] += p[c] as f64;
            }
            n += 1.0;
        }
    }
    acc.map(|v| if n > 0.0 { v / n } else { 0.0 })
}
