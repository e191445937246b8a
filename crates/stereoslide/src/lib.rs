//! stereoslide: converts scans of mounted stereo slides into side-by-side
//! stereo images for headset viewing.
//!
//! The pipeline stages are:
//!
//! 1. **Mount detection** – gradient edge mask, connected components,
//!    minimum-area rectangle fit, scored against area/skew/confidence gates.
//! 2. **Pair split** – dark dividing strip search along the de-skewed mount,
//!    fixed-ratio fallback, symmetry validation.
//! 3. **Alignment** – per-frame homography onto a shared canonical rectangle,
//!    bilinear resampling, eye swap for upside-down slides.
//! 4. **Enhancement** – optional dust removal, aging correction and noise
//!    reduction, in that order.
//! 5. **Composition** – horizontal concatenation of both eyes.
//!
//! # Public API
//! - [`SlideConverter`] as the primary entry point
//! - [`ConvertConfig`] and the per-stage configs for tuning
//! - the individual stages ([`MountDetector`], [`PairSplitter`],
//!   [`PairAligner`], [`EnhancementPipeline`], [`VRComposer`]) for callers
//!   that drive the pipeline themselves

mod align;
mod api;
mod compose;
mod config;
pub mod debug_dump;
mod enhance;
mod error;
mod geometry;
mod homography;
mod mount;
mod pipeline;
mod raster;
mod split;

#[cfg(test)]
mod test_utils;

pub use align::{
    AlignConfig, Alignment, AlignmentTransform, PairAligner, RectifiedPair, ScanOrientation,
};
pub use api::SlideConverter;
pub use compose::{VRComposer, VRStereoFrame};
pub use config::{ConfigError, ConvertConfig};
pub use debug_dump::DebugDump;
pub use enhance::{
    denoise, AgingParams, DustParams, EnhanceConfig, EnhanceStage, EnhancementPipeline,
    NoiseMethod, NoiseStrength, StageSnapshot,
};
pub use error::{
    AsymmetryReason, ConvertError, PipelineStage, QuadDefect, QuadRole, SlideError,
};
pub use geometry::Point;
pub use mount::{
    CandidateRejection, MountCandidate, MountDetectConfig, MountDetection, MountDetector,
    MountRegion,
};
pub use pipeline::{Conversion, ConversionReport, DebugArtifacts};
pub use raster::RawScan;
pub use split::{FramePair, FrameRegion, PairSplitter, SplitConfig, SplitMethod};
