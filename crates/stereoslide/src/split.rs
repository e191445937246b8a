//! Division of the mount interior into the two stereo frames.

use image::GrayImage;
use nalgebra::Matrix3;

use crate::error::{AsymmetryReason, QuadDefect, QuadRole, SlideError};
use crate::geometry::{check_quad, distance, quad_centroid, rect_corners, Point};
use crate::homography::{rect_to_quad, try_project};
use crate::mount::MountRegion;
use crate::raster::{sample_luma, RawScan};

const PROFILE_ROWS: usize = 48;
const MIN_PROFILE_COLS: usize = 16;
const MAX_PROFILE_COLS: usize = 2048;

/// Pair splitting and validation parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction `[lo, hi]` of the interior width searched for the dividing strip.
    pub divider_search_window: [f64; 2],
    /// Columns darker than this fraction of the profile median count as dark.
    pub divider_rel_intensity: f32,
    /// Minimum dark-run width as a fraction of the interior width.
    pub min_divider_width_frac: f64,
    /// Split position (fraction of width) used when no strip is found.
    pub fallback_split_ratio: f64,
    /// Margin (pixels) trimmed from every side of each frame.
    pub frame_inset_px: f64,
    /// Expected width / height of one frame; `None` skips the aspect check.
    pub expected_frame_aspect: Option<f64>,
    /// Relative tolerance δ for the width-difference and aspect checks.
    pub frame_aspect_tolerance: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            divider_search_window: [0.3, 0.7],
            divider_rel_intensity: 0.5,
            min_divider_width_frac: 0.005,
            fallback_split_ratio: 0.5,
            frame_inset_px: 15.0,
            expected_frame_aspect: Some(1.0),
            frame_aspect_tolerance: 0.1,
        }
    }
}

/// One photographic exposure inside the mount.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FrameRegion {
    /// Corners in scan pixels, `[TL, TR, BR, BL]`.
    pub corners: [Point; 4],
    /// Mean of the corners.
    pub centroid: Point,
    /// Extent `[x0, y0, x1, y1]` in the de-skewed mount frame.
    pub mount_rect: [f64; 4],
}

impl FrameRegion {
    pub fn new(corners: [Point; 4], mount_rect: [f64; 4]) -> Self {
        Self {
            corners,
            centroid: quad_centroid(&corners),
            mount_rect,
        }
    }

    /// `[width, height]` in the de-skewed mount frame.
    pub fn size(&self) -> [f64; 2] {
        [
            self.mount_rect[2] - self.mount_rect[0],
            self.mount_rect[3] - self.mount_rect[1],
        ]
    }
}

/// How the split position was found.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitMethod {
    /// A dark strip spanning `[start, end)` in mount-frame x.
    Divider { start: f64, end: f64 },
    /// No strip found; split at `ratio` of the width.
    FixedRatio { ratio: f64 },
}

/// The two frames of a stereo slide, assigned by scan position.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FramePair {
    pub left: FrameRegion,
    pub right: FrameRegion,
    pub split: SplitMethod,
}

/// The mount quad resolved to an axis-aligned `[0, W] × [0, H]` frame.
#[derive(Debug, Clone)]
pub(crate) struct MountInterior {
    pub width: f64,
    pub height: f64,
    /// Mount frame → scan pixels.
    pub to_scan: Matrix3<f64>,
}

impl MountInterior {
    pub(crate) fn from_region(region: &MountRegion) -> Result<Self, SlideError> {
        let c = region.corners;
        let degenerate = |defect| SlideError::DegenerateQuad {
            role: QuadRole::Mount,
            defect,
        };
        check_quad(&c, 16.0, 0.05).map_err(degenerate)?;

        let width = 0.5 * (distance(c[0], c[1]) + distance(c[3], c[2]));
        let height = 0.5 * (distance(c[0], c[3]) + distance(c[1], c[2]));
        let to_scan =
            rect_to_quad([width, height], &c).ok_or_else(|| degenerate(QuadDefect::Singular))?;
        Ok(Self {
            width,
            height,
            to_scan,
        })
    }

    pub(crate) fn map(&self, p: Point) -> Option<Point> {
        try_project(&self.to_scan, p[0], p[1])
    }

    /// Mean luma of each interior column over the central rows.
    pub(crate) fn column_profile(&self, luma: &GrayImage) -> Vec<f32> {
        let n_cols = (self.width.round() as usize).clamp(MIN_PROFILE_COLS, MAX_PROFILE_COLS);
        (0..n_cols)
            .map(|i| {
                let u = (i as f64 + 0.5) / n_cols as f64 * self.width;
                let mut acc = 0.0f32;
                let mut n = 0usize;
                for r in 0..PROFILE_ROWS {
                    let v = (0.1 + 0.8 * (r as f64 + 0.5) / PROFILE_ROWS as f64) * self.height;
                    if let Some(s) = self.map([u, v]).and_then(|p| sample_luma(luma, p[0], p[1])) {
                        acc += s;
                        n += 1;
                    }
                }
                if n == 0 {
                    0.0
                } else {
                    acc / n as f32
                }
            })
            .collect()
    }
}

/// Longest dark run `[start, end)` (profile indices) inside the search window.
pub(crate) fn find_divider(profile: &[f32], config: &SplitConfig) -> Option<(usize, usize)> {
    let n = profile.len();
    if n == 0 {
        return None;
    }
    let mut sorted = profile.to_vec();
    sorted.sort_by(f32::total_cmp);
    let median = sorted[n / 2];
    let threshold = config.divider_rel_intensity * median;

    let lo = ((config.divider_search_window[0] * n as f64).floor() as usize).min(n);
    let hi = ((config.divider_search_window[1] * n as f64).ceil() as usize).min(n);
    let min_run = ((config.min_divider_width_frac * n as f64).ceil() as usize).max(1);

    let mut best: Option<(usize, usize)> = None;
    let mut run_start: Option<usize> = None;
    for i in lo..=hi {
        let dark = i < hi && profile[i] < threshold;
        match (dark, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s >= min_run && best.map_or(true, |(bs, be)| i - s > be - bs) {
                    best = Some((s, i));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    best
}

/// Splits a detected mount into its left and right frames.
#[derive(Debug, Clone, Default)]
pub struct PairSplitter {
    config: SplitConfig,
}

impl PairSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn split(&self, region: &MountRegion, scan: &RawScan) -> Result<FramePair, SlideError> {
        self.split_luma(region, &scan.luma())
    }

    pub fn split_luma(&self, region: &MountRegion, luma: &GrayImage) -> Result<FramePair, SlideError> {
        let cfg = &self.config;
        let interior = MountInterior::from_region(region)?;
        let (w, h) = (interior.width, interior.height);

        let profile = interior.column_profile(luma);
        let n = profile.len() as f64;
        let (split, left_x1, right_x0) = match find_divider(&profile, cfg) {
            Some((s, e)) => {
                let start = s as f64 / n * w;
                let end = e as f64 / n * w;
                tracing::debug!(
                    "divider at [{:.1}, {:.1}) of {:.1} px mount width",
                    start,
                    end,
                    w
                );
                (SplitMethod::Divider { start, end }, start, end)
            }
            None => {
                let ratio = cfg.fallback_split_ratio;
                tracing::warn!("no dividing strip found; splitting at ratio {:.3}", ratio);
                (SplitMethod::FixedRatio { ratio }, ratio * w, ratio * w)
            }
        };

        let m = cfg.frame_inset_px;
        let left_rect = [m, m, left_x1 - m, h - m];
        let right_rect = [right_x0 + m, m, w - m, h - m];
        let size = |r: [f64; 4]| [r[2] - r[0], r[3] - r[1]];
        let (ls, rs) = (size(left_rect), size(right_rect));

        let asymmetric = |reason| SlideError::AsymmetricFrames {
            left_size: ls,
            right_size: rs,
            reason,
        };
        for (role, s) in [(QuadRole::LeftFrame, ls), (QuadRole::RightFrame, rs)] {
            if s[0] <= 0.0 || s[1] <= 0.0 {
                return Err(asymmetric(AsymmetryReason::EmptyFrame { role }));
            }
        }
        self.validate(ls, rs).map_err(asymmetric)?;

        let left = self.frame_region(&interior, left_rect, QuadRole::LeftFrame)?;
        let right = self.frame_region(&interior, right_rect, QuadRole::RightFrame)?;
        tracing::debug!(
            "frames: left {:.0}x{:.0}, right {:.0}x{:.0}",
            ls[0],
            ls[1],
            rs[0],
            rs[1]
        );
        Ok(FramePair { left, right, split })
    }

    fn validate(&self, ls: [f64; 2], rs: [f64; 2]) -> Result<(), AsymmetryReason> {
        let tol = self.config.frame_aspect_tolerance;
        let relative = (ls[0] - rs[0]).abs() / ls[0].max(rs[0]);
        if relative > tol {
            return Err(AsymmetryReason::WidthDifference {
                relative,
                tolerance: tol,
            });
        }
        if let Some(expected) = self.config.expected_frame_aspect {
            for (role, s) in [(QuadRole::LeftFrame, ls), (QuadRole::RightFrame, rs)] {
                let aspect = s[0] / s[1];
                if (aspect / expected - 1.0).abs() > tol {
                    return Err(AsymmetryReason::AspectMismatch {
                        role,
                        aspect,
                        expected,
                        tolerance: tol,
                    });
                }
            }
        }
        Ok(())
    }

    fn frame_region(
        &self,
        interior: &MountInterior,
        rect: [f64; 4],
        role: QuadRole,
    ) -> Result<FrameRegion, SlideError> {
        let mut corners = [[0.0; 2]; 4];
        for (dst, p) in corners.iter_mut().zip(rect_corners(rect)) {
            *dst = interior.map(p).ok_or(SlideError::DegenerateQuad {
                role,
                defect: QuadDefect::Singular,
            })?;
        }
        Ok(FrameRegion::new(corners, rect))
    }
}
