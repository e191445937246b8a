//! Mount boundary detection.
//!
//! The detector works on a downscaled luma copy of the scan: Scharr gradient
//! magnitude, relative threshold, 8-connected labelling, then a
//! minimum-area-rectangle fit per large component. Each examined component
//! becomes a [`MountCandidate`] with its scores and, when it was not accepted,
//! the gate that rejected it. Components are examined largest first; the
//! first one whose rectangle passes the area gate is the mount boundary, and
//! it either passes the skew and confidence gates or detection fails. Smaller
//! components inside a rejected mount are never promoted.

mod candidate;
mod edges;

use image::GrayImage;

use crate::error::SlideError;
use crate::geometry::{rect_corners, Point};
use crate::raster::RawScan;

use candidate::{
    boundary_points, edge_support, fit_quad, ranked_components, rectangularity, to_scan,
    Component,
};
use edges::{edge_map, EdgeMap};

/// Mount detection parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MountDetectConfig {
    /// Accepted `[a_min, a_max]` ratio of the fitted rectangle area to the scan area.
    pub area_ratio_range: [f64; 2],
    /// Maximum absolute skew (degrees) of the mount against the image axes.
    pub max_skew_deg: f64,
    /// Confidence threshold τ in [0, 1].
    pub min_confidence: f32,
    /// Edge threshold relative to the maximum gradient magnitude.
    pub grad_threshold: f32,
    /// Gaussian pre-blur sigma (working pixels). `0` disables the blur.
    pub blur_sigma: f32,
    /// Longest side of the working image; larger scans are downscaled.
    pub detection_max_dim: u32,
    /// Maximum number of components examined, largest first.
    pub max_candidates: usize,
    /// Distance (working pixels) within which a perimeter sample counts as supported.
    pub edge_tolerance_px: u32,
}

impl Default for MountDetectConfig {
    fn default() -> Self {
        Self {
            area_ratio_range: [0.2, 0.95],
            max_skew_deg: 15.0,
            min_confidence: 0.6,
            grad_threshold: 0.2,
            blur_sigma: 1.0,
            detection_max_dim: 1024,
            max_candidates: 8,
            edge_tolerance_px: 2,
        }
    }
}

/// The accepted mount boundary, in scan pixel coordinates.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MountRegion {
    /// Corners as `[top-left, top-right, bottom-right, bottom-left]` of the de-skewed mount.
    pub corners: [Point; 4],
    /// Overall confidence in [0, 1]; at least `min_confidence`.
    pub confidence: f32,
    /// Smallest rotation onto the image axes, degrees in (-45, 45].
    pub skew_deg: f64,
    /// Fitted rectangle area over scan area.
    pub area_ratio: f64,
    pub edge_support: f32,
    pub rectangularity: f32,
}

/// Gate that rejected a mount candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRejection {
    AreaRatio,
    Skew,
    LowConfidence,
    Degenerate,
}

/// One examined edge component and its scores.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MountCandidate {
    /// Fitted quad in scan pixels (the component's bounding box when no fit exists).
    pub corners: [Point; 4],
    /// Edge pixels in the component (working resolution).
    pub pixel_count: usize,
    pub area_ratio: f64,
    pub skew_deg: f64,
    pub edge_support: f32,
    pub rectangularity: f32,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<CandidateRejection>,
}

impl MountCandidate {
    fn to_region(&self) -> MountRegion {
        MountRegion {
            corners: self.corners,
            confidence: self.confidence,
            skew_deg: self.skew_deg,
            area_ratio: self.area_ratio,
            edge_support: self.edge_support,
            rectangularity: self.rectangularity,
        }
    }
}

/// Scored outcome of one detection run.
#[derive(Debug, Clone)]
pub struct MountDetection {
    /// The accepted region, if any candidate passed every gate.
    pub region: Option<MountRegion>,
    /// Every examined candidate, in examination order.
    pub candidates: Vec<MountCandidate>,
    /// Binary edge mask at working resolution.
    pub edge_mask: GrayImage,
    /// Working → scan pixel scale factors.
    pub working_scale: [f64; 2],
    /// Absolute gradient-magnitude threshold that produced `edge_mask`.
    pub edge_threshold: f32,
}

impl MountDetection {
    /// Highest confidence among candidates that reached scoring.
    pub fn best_confidence(&self) -> Option<f32> {
        self.candidates
            .iter()
            .filter(|c| {
                !matches!(
                    c.rejection,
                    Some(CandidateRejection::Degenerate | CandidateRejection::AreaRatio)
                )
            })
            .map(|c| c.confidence)
            .fold(None, |acc: Option<f32>, c| Some(acc.map_or(c, |a| a.max(c))))
    }

    /// The accepted region, or `NoMountFound` with the run's best score.
    pub fn into_region(self) -> Result<MountRegion, SlideError> {
        let best_confidence = self.best_confidence();
        let candidates_examined = self.candidates.len();
        self.region.ok_or(SlideError::NoMountFound {
            best_confidence,
            candidates_examined,
        })
    }
}

/// Locates the slide mount in a scan.
#[derive(Debug, Clone, Default)]
pub struct MountDetector {
    config: MountDetectConfig,
}

impl MountDetector {
    pub fn new(config: MountDetectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MountDetectConfig {
        &self.config
    }

    /// Detect the mount in a scan.
    pub fn detect(&self, scan: &RawScan) -> MountDetection {
        self.detect_luma(&scan.luma())
    }

    /// Detect the mount in a luma plane.
    pub fn detect_luma(&self, luma: &GrayImage) -> MountDetection {
        let edges = edge_map(luma, &self.config);
        let mut candidates = Vec::new();
        let mut region = None;

        if edges.is_flat() {
            tracing::debug!("mount detection: flat image, no edges");
        } else {
            let (labels, comps) = ranked_components(&edges, &self.config);
            let boundaries = boundary_points(&labels, &comps);
            tracing::debug!("mount detection: {} components examined", comps.len());

            for (comp, points) in comps.iter().zip(boundaries.iter()) {
                let cand = self.score_component(comp, points, &edges);
                tracing::debug!(
                    "candidate {} px: area_ratio={:.3} skew={:.2}° support={:.3} rect={:.3} conf={:.3} -> {:?}",
                    cand.pixel_count,
                    cand.area_ratio,
                    cand.skew_deg,
                    cand.edge_support,
                    cand.rectangularity,
                    cand.confidence,
                    cand.rejection
                );
                let boundary = !matches!(
                    cand.rejection,
                    Some(CandidateRejection::AreaRatio | CandidateRejection::Degenerate)
                );
                if cand.rejection.is_none() {
                    region = Some(cand.to_region());
                }
                candidates.push(cand);
                if boundary {
                    break;
                }
            }
        }

        match &region {
            Some(r) => tracing::debug!(
                "mount found: confidence={:.3} skew={:.2}° area_ratio={:.3}",
                r.confidence,
                r.skew_deg,
                r.area_ratio
            ),
            None => tracing::warn!(
                "no mount candidate passed the gates ({} examined)",
                candidates.len()
            ),
        }

        MountDetection {
            region,
            candidates,
            edge_mask: edges.mask,
            working_scale: edges.scale,
            edge_threshold: edges.threshold,
        }
    }

    fn score_component(&self, comp: &Component, points: &[Point], edges: &EdgeMap) -> MountCandidate {
        let cfg = &self.config;
        let (w, h) = edges.mask.dimensions();
        let image_area = w as f64 * h as f64;

        let Some(fit) = fit_quad(points) else {
            let b = comp.bbox;
            let bbox = rect_corners([
                b[0] as f64,
                b[1] as f64,
                b[2] as f64 + 1.0,
                b[3] as f64 + 1.0,
            ]);
            return MountCandidate {
                corners: to_scan(&bbox, edges.scale),
                pixel_count: comp.pixel_count,
                area_ratio: 0.0,
                skew_deg: 0.0,
                edge_support: 0.0,
                rectangularity: 0.0,
                confidence: 0.0,
                rejection: Some(CandidateRejection::Degenerate),
            };
        };

        let area_ratio = fit.rect_area / image_area;
        let skew_deg = fit.skew_rad.to_degrees();
        let support = edge_support(edges, &fit.corners, cfg.edge_tolerance_px);
        let rect_score = rectangularity(&fit.corners);
        let confidence = (support * rect_score).clamp(0.0, 1.0);

        let rejection = if area_ratio < cfg.area_ratio_range[0] || area_ratio > cfg.area_ratio_range[1]
        {
            Some(CandidateRejection::AreaRatio)
        } else if skew_deg.abs() > cfg.max_skew_deg {
            Some(CandidateRejection::Skew)
        } else if confidence < cfg.min_confidence {
            Some(CandidateRejection::LowConfidence)
        } else {
            None
        };

        MountCandidate {
            corners: to_scan(&fit.corners, edges.scale),
            pixel_count: comp.pixel_count,
            area_ratio,
            skew_deg,
            edge_support: support,
            rectangularity: rect_score,
            confidence,
            rejection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance;
    use crate::test_utils::{noise_gray, rotated_rect_corners, rotated_rect_gray};
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_skewed_rectangle() {
        let img = rotated_rect_gray(640, 400, [320.0, 200.0], [480.0, 280.0], 5.0, 200, 30);
        let det = MountDetector::default().detect_luma(&img);
        assert!(det.edge_threshold > 0.0);
        let region = det.region.expect("mount should be found");

        assert!(region.confidence >= 0.6, "confidence {}", region.confidence);
        assert_abs_diff_eq!(region.skew_deg, 5.0, epsilon = 1.0);
        assert_abs_diff_eq!(region.area_ratio, 0.525, epsilon = 0.05);

        let expected = rotated_rect_corners([320.0, 200.0], [480.0, 280.0], 5.0);
        for (got, want) in region.corners.iter().zip(expected.iter()) {
            assert!(distance(*got, *want) < 6.0, "corner {:?} vs {:?}", got, want);
        }
    }

    #[test]
    fn excessive_skew_is_rejected() {
        let img = rotated_rect_gray(640, 400, [320.0, 200.0], [400.0, 200.0], 25.0, 200, 30);
        let det = MountDetector::default().detect_luma(&img);
        assert!(det.region.is_none());
        assert_eq!(det.candidates[0].rejection, Some(CandidateRejection::Skew));
        assert!(matches!(
            det.into_region(),
            Err(SlideError::NoMountFound { .. })
        ));
    }

    #[test]
    fn small_and_full_frame_rectangles_are_rejected() {
        let tiny = rotated_rect_gray(640, 400, [320.0, 200.0], [60.0, 40.0], 0.0, 200, 30);
        let det = MountDetector::default().detect_luma(&tiny);
        assert!(det.region.is_none());
        assert!(det.candidates.is_empty());
        assert_eq!(det.best_confidence(), None);

        let full = rotated_rect_gray(640, 400, [320.0, 200.0], [632.0, 392.0], 0.0, 200, 30);
        let det = MountDetector::default().detect_luma(&full);
        assert!(det.region.is_none());
        assert_eq!(det.candidates[0].rejection, Some(CandidateRejection::AreaRatio));
    }

    #[test]
    fn flat_and_noise_images_have_no_mount() {
        let flat = GrayImage::from_pixel(320, 240, image::Luma([90]));
        let det = MountDetector::default().detect_luma(&flat);
        assert!(det.region.is_none());
        assert!(det.candidates.is_empty());
        assert_eq!(det.edge_threshold, 0.0);

        let noise = noise_gray(320, 240, 7);
        let det = MountDetector::default().detect_luma(&noise);
        assert!(det.region.is_none());
        match det.into_region() {
            Err(SlideError::NoMountFound {
                candidates_examined,
                ..
            }) => assert!(candidates_examined <= 8),
            other => panic!("expected NoMountFound, got {:?}", other),
        }
    }

    #[test]
    fn corners_scale_back_from_working_resolution() {
        let img = rotated_rect_gray(2048, 1280, [1024.0, 640.0], [1600.0, 900.0], 0.0, 210, 20);
        let det = MountDetector::default().detect_luma(&img);
        assert_eq!(det.edge_mask.dimensions(), (1024, 640));
        let region = det.region.expect("mount should be found");
        let expected = rotated_rect_corners([1024.0, 640.0], [1600.0, 900.0], 0.0);
        for (got, want) in region.corners.iter().zip(expected.iter()) {
            assert!(distance(*got, *want) < 10.0, "corner {:?} vs {:?}", got, want);
        }
    }

    #[test]
    fn square_and_portrait_mounts_read_small_skew() {
        for deg in [3.0, 5.0, 8.0] {
            let img = rotated_rect_gray(640, 480, [320.0, 240.0], [360.0, 360.0], deg, 200, 30);
            let det = MountDetector::default().detect_luma(&img);
            let region = det.region.expect("square mount should be found");
            assert_abs_diff_eq!(region.skew_deg, deg, epsilon = 1.0);

            let expected = rotated_rect_corners([320.0, 240.0], [360.0, 360.0], deg);
            for (got, want) in region.corners.iter().zip(expected.iter()) {
                assert!(distance(*got, *want) < 6.0, "corner {:?} vs {:?}", got, want);
            }
        }

        let img = rotated_rect_gray(640, 480, [320.0, 240.0], [280.0, 400.0], 0.0, 200, 30);
        let region = MountDetector::default()
            .detect_luma(&img)
            .region
            .expect("portrait mount should be found");
        assert_abs_diff_eq!(region.skew_deg, 0.0, epsilon = 1.0);
        assert!(region.corners[0][0] < region.corners[1][0]);
        assert!(region.corners[0][1] < region.corners[3][1]);
    }

    #[test]
    fn rejected_mount_does_not_promote_inner_rectangle() {
        let mut img =
            rotated_rect_gray(1024, 768, [512.0, 384.0], [700.0, 520.0], 20.0, 200, 30);
        let inner = rotated_rect_gray(1024, 768, [512.0, 384.0], [440.0, 364.0], 0.0, 90, 0);
        for (dst, src) in img.pixels_mut().zip(inner.pixels()) {
            if src[0] == 90 {
                *dst = *src;
            }
        }

        let det = MountDetector::default().detect_luma(&img);
        assert!(det.region.is_none());
        assert_eq!(det.candidates.len(), 1);
        assert_eq!(det.candidates[0].rejection, Some(CandidateRejection::Skew));
        assert_abs_diff_eq!(det.candidates[0].skew_deg, 20.0, epsilon = 1.0);
    }
}
