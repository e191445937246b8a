//! Perspective rectification of the two frames onto a shared canonical grid.
//!
//! Each frame quad gets its own homography to a `Wc × Hc` rectangle; the scan
//! is resampled through the inverse with bilinear interpolation. Canonical
//! left/right follow the viewer's eyes, not scan position: when the initial
//! estimate places the scan-left frame on the canonical right, the assignment
//! is swapped.
//!
//! The swap only happens for a slide the caller declares upside down with
//! [`ScanOrientation::Rotated180`]. Frame quads always arrive in scan order,
//! so with the default [`ScanOrientation::Upright`] the centroid test never
//! fires; orientation is not inferred from image content.

use image::RgbImage;
use nalgebra::Matrix3;
use rayon::prelude::*;

use crate::error::{QuadDefect, QuadRole, SlideError};
use crate::geometry::{check_quad, distance, rect_corners, Point};
use crate::homography::{invert_homography, matrix3_to_array, rect_to_quad, try_project};
use crate::raster::{sample_rgb, RawScan};
use crate::split::{FramePair, FrameRegion};

/// How the slide sat in the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrientation {
    #[default]
    Upright,
    /// Inserted upside down: content is rotated by a half turn and the
    /// eyes are exchanged.
    Rotated180,
}

/// Rectification parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Canonical frame size `[Wc, Hc]` in pixels, shared by both eyes.
    pub canonical_size: [u32; 2],
    pub orientation: ScanOrientation,
    /// Smallest accepted frame quad area (px²).
    pub min_quad_area_px: f64,
    /// Smallest accepted |sin| of any interior corner angle.
    pub min_corner_sine: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            canonical_size: [1024, 1024],
            orientation: ScanOrientation::Upright,
            min_quad_area_px: 16.0,
            min_corner_sine: 0.05,
        }
    }
}

/// Homographies between one frame quad and the canonical rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentTransform {
    /// Scan pixels → canonical pixels.
    pub to_canonical: Matrix3<f64>,
    /// Canonical pixels → scan pixels.
    pub from_canonical: Matrix3<f64>,
    pub canonical_size: [u32; 2],
}

impl AlignmentTransform {
    /// Fit the transform taking `corners` (`[TL, TR, BR, BL]`, already
    /// oriented) onto `[0, Wc] × [0, Hc]`.
    pub fn estimate(corners: &[Point; 4], canonical_size: [u32; 2]) -> Result<Self, QuadDefect> {
        let [wc, hc] = canonical_size.map(f64::from);
        let canonical = rect_corners([0.0, 0.0, wc, hc]);
        let from_canonical = rect_to_quad([wc, hc], corners).ok_or(QuadDefect::Singular)?;
        let to_canonical = invert_homography(&from_canonical).ok_or(QuadDefect::Singular)?;

        let tol = 1e-6 * wc.max(hc).max(1.0);
        for (c, q) in canonical.iter().zip(corners.iter()) {
            let back = try_project(&to_canonical, q[0], q[1]).ok_or(QuadDefect::Singular)?;
            if distance(back, *c) > tol {
                return Err(QuadDefect::Singular);
            }
        }
        Ok(Self {
            to_canonical,
            from_canonical,
            canonical_size,
        })
    }

    pub fn project_to_canonical(&self, p: Point) -> Option<Point> {
        try_project(&self.to_canonical, p[0], p[1])
    }

    pub fn project_to_scan(&self, p: Point) -> Option<Point> {
        try_project(&self.from_canonical, p[0], p[1])
    }

    /// Row-major `[to_canonical, from_canonical]`.
    pub fn to_arrays(&self) -> [[[f64; 3]; 3]; 2] {
        [
            matrix3_to_array(&self.to_canonical),
            matrix3_to_array(&self.from_canonical),
        ]
    }
}

/// Both eyes resampled onto the canonical grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifiedPair {
    pub left: RgbImage,
    pub right: RgbImage,
}

impl RectifiedPair {
    /// `Some([w, h])` when both grids share dimensions.
    pub fn shared_size(&self) -> Option<[u32; 2]> {
        let l = self.left.dimensions();
        (l == self.right.dimensions()).then_some([l.0, l.1])
    }
}

/// Output of [`PairAligner::align`].
#[derive(Debug, Clone)]
pub struct Alignment {
    pub pair: RectifiedPair,
    pub left: AlignmentTransform,
    pub right: AlignmentTransform,
    /// True when scan-left content became the canonical right eye.
    pub swapped: bool,
}

/// Rectifies a [`FramePair`] into a [`RectifiedPair`].
#[derive(Debug, Clone, Default)]
pub struct PairAligner {
    config: AlignConfig,
}

impl PairAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    pub fn align(&self, frames: &FramePair, scan: &RawScan) -> Result<Alignment, SlideError> {
        let size = self.config.canonical_size;
        let left_t = self.frame_transform(&frames.left, QuadRole::LeftFrame)?;
        let right_t = self.frame_transform(&frames.right, QuadRole::RightFrame)?;

        let swapped = needs_swap(&left_t, frames);
        let (left_t, right_t) = if swapped {
            tracing::debug!("scan-left frame maps to the canonical right; swapping eyes");
            (right_t, left_t)
        } else {
            (left_t, right_t)
        };

        let left = warp(scan.pixels(), &left_t.from_canonical, size);
        let right = warp(scan.pixels(), &right_t.from_canonical, size);
        tracing::debug!("rectified both frames to {}x{}", size[0], size[1]);

        Ok(Alignment {
            pair: RectifiedPair { left, right },
            left: left_t,
            right: right_t,
            swapped,
        })
    }

    fn oriented(&self, corners: &[Point; 4]) -> [Point; 4] {
        match self.config.orientation {
            ScanOrientation::Upright => *corners,
            ScanOrientation::Rotated180 => [corners[2], corners[3], corners[0], corners[1]],
        }
    }

    fn frame_transform(
        &self,
        frame: &FrameRegion,
        role: QuadRole,
    ) -> Result<AlignmentTransform, SlideError> {
        let corners = self.oriented(&frame.corners);
        let degenerate = |defect| SlideError::DegenerateQuad { role, defect };
        check_quad(
            &corners,
            self.config.min_quad_area_px,
            self.config.min_corner_sine,
        )
        .map_err(degenerate)?;
        AlignmentTransform::estimate(&corners, self.config.canonical_size).map_err(degenerate)
    }
}

/// Whether the right frame's centroid lands left of the left frame's centroid
/// in the left frame's canonical coordinates.
fn needs_swap(left: &AlignmentTransform, frames: &FramePair) -> bool {
    let l = left.project_to_canonical(frames.left.centroid);
    let r = left.project_to_canonical(frames.right.centroid);
    match (l, r) {
        (Some(l), Some(r)) => r[0] < l[0],
        _ => {
            tracing::warn!("frame centroids do not project into the canonical frame");
            false
        }
    }
}

/// Resample `src` into a `size` grid; canonical pixel centers map through
/// `from_canonical` into `src`.
pub(crate) fn warp(src: &RgbImage, from_canonical: &Matrix3<f64>, size: [u32; 2]) -> RgbImage {
    let [wc, hc] = size;
    let mut out = RgbImage::new(wc, hc);
    if wc == 0 || hc == 0 {
        return out;
    }
    let row_len = wc as usize * 3;
    out.par_chunks_mut(row_len).enumerate().for_each(|(j, row)| {
        let y = j as f64 + 0.5;
        for (i, px) in row.chunks_exact_mut(3).enumerate() {
            let x = i as f64 + 0.5;
            let rgb = try_project(from_canonical, x, y)
                .and_then(|p| sample_rgb(src, p[0], p[1]))
                .unwrap_or([0, 0, 0]);
            px.copy_from_slice(&rgb);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::SplitMethod;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    fn gradient_scan(w: u32, h: u32) -> RawScan {
        RawScan::new(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 5 % 256) as u8, (y * 7 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn pair_of(left: [f64; 4], right: [f64; 4]) -> FramePair {
        FramePair {
            left: FrameRegion::new(rect_corners(left), left),
            right: FrameRegion::new(rect_corners(right), right),
            split: SplitMethod::FixedRatio { ratio: 0.5 },
        }
    }

    #[test]
    fn unit_scale_rectification_copies_pixels() {
        let scan = gradient_scan(40, 20);
        let frames = pair_of([2.0, 2.0, 18.0, 18.0], [22.0, 2.0, 38.0, 18.0]);
        let aligner = PairAligner::new(AlignConfig {
            canonical_size: [16, 16],
            ..AlignConfig::default()
        });
        let out = aligner.align(&frames, &scan).unwrap();
        assert!(!out.swapped);
        assert_eq!(out.pair.shared_size(), Some([16, 16]));
        for (x, y) in [(0, 0), (7, 3), (15, 15)] {
            assert_eq!(out.pair.left.get_pixel(x, y), scan.pixels().get_pixel(x + 2, y + 2));
            assert_eq!(out.pair.right.get_pixel(x, y), scan.pixels().get_pixel(x + 22, y + 2));
        }
    }

    #[test]
    fn output_has_canonical_size() {
        let scan = gradient_scan(200, 100);
        let frames = FramePair {
            left: FrameRegion::new(
                [[10.0, 12.0], [88.0, 8.0], [92.0, 90.0], [6.0, 86.0]],
                [0.0, 0.0, 80.0, 80.0],
            ),
            right: FrameRegion::new(
                [[110.0, 10.0], [190.0, 14.0], [188.0, 92.0], [108.0, 88.0]],
                [0.0, 0.0, 80.0, 80.0],
            ),
            split: SplitMethod::FixedRatio { ratio: 0.5 },
        };
        let aligner = PairAligner::new(AlignConfig {
            canonical_size: [64, 48],
            ..AlignConfig::default()
        });
        let out = aligner.align(&frames, &scan).unwrap();
        assert_eq!(out.pair.left.dimensions(), (64, 48));
        assert_eq!(out.pair.right.dimensions(), (64, 48));

        let tl = out.left.project_to_canonical([10.0, 12.0]).unwrap();
        assert_abs_diff_eq!(tl[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(tl[1], 0.0, epsilon = 1e-6);
        let br = out.right.project_to_scan([64.0, 48.0]).unwrap();
        assert_abs_diff_eq!(br[0], 188.0, epsilon = 1e-6);
        assert_abs_diff_eq!(br[1], 92.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_frame_is_reported_with_role() {
        let scan = gradient_scan(40, 20);
        let mut frames = pair_of([2.0, 2.0, 18.0, 18.0], [22.0, 2.0, 38.0, 18.0]);
        frames.right.corners = [[22.0, 2.0], [30.0, 2.0], [38.0, 2.0], [22.0, 18.0]];
        let err = PairAligner::default().align(&frames, &scan).unwrap_err();
        assert_eq!(
            err,
            SlideError::DegenerateQuad {
                role: QuadRole::RightFrame,
                defect: QuadDefect::CollinearCorners
            }
        );

        frames.right.corners[0] = [f64::NAN, 2.0];
        let err = PairAligner::default().align(&frames, &scan).unwrap_err();
        assert!(matches!(
            err,
            SlideError::DegenerateQuad {
                defect: QuadDefect::NonFinite,
                ..
            }
        ));
    }

    #[test]
    fn upside_down_scan_swaps_eyes() {
        let scan = gradient_scan(40, 20);
        let rotated = scan.rotated_180();
        let frames = pair_of([2.0, 2.0, 18.0, 18.0], [22.0, 2.0, 38.0, 18.0]);
        let upright = PairAligner::new(AlignConfig {
            canonical_size: [16, 16],
            ..AlignConfig::default()
        })
        .align(&frames, &scan)
        .unwrap();

        // In the rotated scan, the physical left frame sits at [22, 2, 38, 18].
        let flipped = PairAligner::new(AlignConfig {
            canonical_size: [16, 16],
            orientation: ScanOrientation::Rotated180,
            ..AlignConfig::default()
        })
        .align(&frames, &rotated)
        .unwrap();

        assert!(flipped.swapped);
        assert_eq!(flipped.pair, upright.pair);
    }

    #[test]
    fn undeclared_upside_down_scan_keeps_scan_order() {
        let rotated = gradient_scan(40, 20).rotated_180();
        let frames = pair_of([2.0, 2.0, 18.0, 18.0], [22.0, 2.0, 38.0, 18.0]);
        let out = PairAligner::new(AlignConfig {
            canonical_size: [16, 16],
            ..AlignConfig::default()
        })
        .align(&frames, &rotated)
        .unwrap();

        assert!(!out.swapped);
        assert_eq!(out.pair.left.get_pixel(0, 0), rotated.pixels().get_pixel(2, 2));
    }
}
