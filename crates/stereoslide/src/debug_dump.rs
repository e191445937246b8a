//! Versioned debug dump schema for one conversion run.
//!
//! The dump reuses the production result structures (candidates, regions,
//! frame pairs, config) and adds only run metadata. Raster artifacts are not
//! part of the JSON; [`render_overlay`] draws the geometric ones onto the scan.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use serde::{Deserialize, Serialize};

use crate::config::ConvertConfig;
use crate::enhance::EnhanceStage;
use crate::error::{ConvertError, PipelineStage};
use crate::geometry::Point;
use crate::homography::matrix3_to_array;
use crate::mount::{MountCandidate, MountRegion};
use crate::pipeline::{Conversion, DebugArtifacts};
use crate::raster::RawScan;
use crate::split::FramePair;

pub const DEBUG_SCHEMA_V1: &str = "stereoslide.debug.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugDump {
    pub schema_version: String,
    pub scan: ScanDebug,
    pub config: ConvertConfig,
    pub outcome: OutcomeDebug,
    pub mount: MountDebug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<FramePair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentDebug>,
    pub stages: Vec<EnhanceStage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDebug {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeDebug {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountDebug {
    pub working_scale: [f64; 2],
    pub edge_threshold: f32,
    pub candidates: Vec<MountCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<MountRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentDebug {
    pub swapped: bool,
    pub canonical_size: [u32; 2],
    pub left_to_canonical: [[f64; 3]; 3],
    pub right_to_canonical: [[f64; 3]; 3],
}

impl DebugDump {
    /// Summarize a run. Artifacts come from the success or the failure,
    /// whichever the run produced; without them only the outcome is filled.
    pub fn from_run(
        path: Option<&Path>,
        scan: &RawScan,
        config: &ConvertConfig,
        result: &Result<Conversion, ConvertError>,
    ) -> Self {
        let (outcome, artifacts) = match result {
            Ok(conv) => (
                OutcomeDebug {
                    ok: true,
                    failed_stage: None,
                    error: None,
                    output_size: Some(conv.report.output_size),
                },
                conv.artifacts.as_deref(),
            ),
            Err(err) => (
                OutcomeDebug {
                    ok: false,
                    failed_stage: Some(err.stage),
                    error: Some(err.kind.to_string()),
                    output_size: None,
                },
                err.artifacts.as_deref(),
            ),
        };

        let (w, h) = scan.dimensions();
        let empty = DebugArtifacts::default();
        let a = artifacts.unwrap_or(&empty);
        Self {
            schema_version: DEBUG_SCHEMA_V1.to_string(),
            scan: ScanDebug {
                path: path.map(|p| p.display().to_string()),
                width: w,
                height: h,
                channels: scan.channels(),
            },
            config: config.clone(),
            outcome,
            mount: MountDebug {
                working_scale: a.working_scale,
                edge_threshold: a.edge_threshold,
                candidates: a.candidates.clone(),
                selected: a.mount.clone(),
            },
            frames: a.frames.clone(),
            alignment: a.alignment.as_ref().map(|al| AlignmentDebug {
                swapped: al.swapped,
                canonical_size: al.left.canonical_size,
                left_to_canonical: matrix3_to_array(&al.left.to_canonical),
                right_to_canonical: matrix3_to_array(&al.right.to_canonical),
            }),
            stages: a.stages.iter().map(|s| s.stage).collect(),
        }
    }
}

const CANDIDATE_COLOR: Rgb<u8> = Rgb([255, 160, 0]);
const MOUNT_COLOR: Rgb<u8> = Rgb([0, 220, 0]);
const LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_COLOR: Rgb<u8> = Rgb([0, 120, 255]);

fn draw_quad(img: &mut RgbImage, q: &[Point; 4], color: Rgb<u8>) {
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        draw_line_segment_mut(
            img,
            (a[0] as f32, a[1] as f32),
            (b[0] as f32, b[1] as f32),
            color,
        );
    }
}

/// Draw rejected candidates, the accepted mount and both frame quads onto a
/// copy of the scan.
pub fn render_overlay(scan: &RawScan, artifacts: &DebugArtifacts) -> RgbImage {
    let mut img = scan.pixels().clone();
    for c in artifacts.candidates.iter().filter(|c| c.rejection.is_some()) {
        draw_quad(&mut img, &c.corners, CANDIDATE_COLOR);
    }
    if let Some(m) = &artifacts.mount {
        draw_quad(&mut img, &m.corners, MOUNT_COLOR);
    }
    if let Some(f) = &artifacts.frames {
        draw_quad(&mut img, &f.left.corners, LEFT_COLOR);
        draw_quad(&mut img, &f.right.corners, RIGHT_COLOR);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlideError;

    #[test]
    fn failed_run_dump_records_stage() {
        let scan = RawScan::new(RgbImage::new(8, 8));
        let config = ConvertConfig::default();
        let result = Err(ConvertError::new(
            PipelineStage::MountDetection,
            SlideError::NoMountFound {
                best_confidence: None,
                candidates_examined: 0,
            },
            None,
        ));
        let dump = DebugDump::from_run(None, &scan, &config, &result);
        assert_eq!(dump.schema_version, DEBUG_SCHEMA_V1);
        assert!(!dump.outcome.ok);
        assert_eq!(dump.outcome.failed_stage, Some(PipelineStage::MountDetection));

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["outcome"]["failed_stage"], "mount_detection");
        assert!(json.get("frames").is_none());
    }

    #[test]
    fn overlay_marks_mount_outline() {
        let scan = RawScan::new(RgbImage::new(20, 20));
        let artifacts = DebugArtifacts {
            mount: Some(MountRegion {
                corners: [[2.0, 2.0], [17.0, 2.0], [17.0, 17.0], [2.0, 17.0]],
                confidence: 1.0,
                skew_deg: 0.0,
                area_ratio: 0.5,
                edge_support: 1.0,
                rectangularity: 1.0,
            }),
            ..DebugArtifacts::default()
        };
        let img = render_overlay(&scan, &artifacts);
        assert_eq!(img.get_pixel(10, 2), &MOUNT_COLOR);
        assert_eq!(img.get_pixel(10, 10), &Rgb([0, 0, 0]));
    }
}
