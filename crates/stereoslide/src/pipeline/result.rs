use image::GrayImage;

use crate::align::Alignment;
use crate::compose::VRStereoFrame;
use crate::enhance::{EnhanceStage, StageSnapshot};
use crate::mount::{MountCandidate, MountRegion};
use crate::split::FramePair;

/// Serializable summary of a successful conversion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversionReport {
    /// Scan dimensions [width, height].
    pub scan_size: [u32; 2],
    /// Channel count of the decoded source.
    pub source_channels: u8,
    pub mount: MountRegion,
    pub frames: FramePair,
    /// Canonical per-eye size [Wc, Hc].
    pub canonical_size: [u32; 2],
    /// True when the scan-left frame became the right eye.
    pub swapped: bool,
    /// Scan → canonical homography of each eye (3x3, row-major).
    pub left_to_canonical: [[f64; 3]; 3],
    pub right_to_canonical: [[f64; 3]; 3],
    /// Enhancement stages applied, in order.
    pub stages: Vec<EnhanceStage>,
    /// Output dimensions [2·Wc, Hc].
    pub output_size: [u32; 2],
}

/// Intermediate artifacts collected when `debug` is enabled.
///
/// Collected up to the failing stage when a run fails.
#[derive(Debug, Clone, Default)]
pub struct DebugArtifacts {
    /// Working-resolution edge mask used for mount detection.
    pub edge_mask: Option<GrayImage>,
    /// Working → scan scale of the edge mask.
    pub working_scale: [f64; 2],
    /// Absolute gradient threshold of the edge mask.
    pub edge_threshold: f32,
    pub candidates: Vec<MountCandidate>,
    pub mount: Option<MountRegion>,
    pub frames: Option<FramePair>,
    /// Rectified pair and transforms as produced by alignment (before enhancement).
    pub alignment: Option<Alignment>,
    /// Pair after each enhancement stage.
    pub stages: Vec<StageSnapshot>,
}

/// Output of one successful run.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub frame: VRStereoFrame,
    pub report: ConversionReport,
    pub artifacts: Option<Box<DebugArtifacts>>,
}
