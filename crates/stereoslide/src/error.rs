//! Error taxonomy of the conversion core.
//!
//! Detection, splitting, alignment and composition failures are
//! [`SlideError`] values. The pipeline wraps them in [`ConvertError`], which
//! records the failing [`PipelineStage`] and, in debug mode, the artifacts
//! collected up to the failure.

use serde::{Deserialize, Serialize};

use crate::pipeline::DebugArtifacts;

/// Which quadrilateral a geometric failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadRole {
    Mount,
    LeftFrame,
    RightFrame,
}

impl std::fmt::Display for QuadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mount => f.write_str("mount"),
            Self::LeftFrame => f.write_str("left frame"),
            Self::RightFrame => f.write_str("right frame"),
        }
    }
}

/// Why four corners cannot be used as a rectification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadDefect {
    NonFinite,
    NonConvex,
    CollinearCorners,
    TooSmall,
    Singular,
}

impl std::fmt::Display for QuadDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite => f.write_str("non-finite corner coordinates"),
            Self::NonConvex => f.write_str("corners do not form a convex quadrilateral"),
            Self::CollinearCorners => f.write_str("adjacent corners are (nearly) collinear"),
            Self::TooSmall => f.write_str("quadrilateral area is too small"),
            Self::Singular => f.write_str("perspective transform is singular"),
        }
    }
}

/// Why the two frame regions were rejected as a stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsymmetryReason {
    /// Relative width difference `|w_l - w_r| / max(w_l, w_r)` exceeds δ.
    WidthDifference { relative: f64, tolerance: f64 },
    /// One frame's aspect ratio deviates from the expected one by more than δ.
    AspectMismatch {
        role: QuadRole,
        aspect: f64,
        expected: f64,
        tolerance: f64,
    },
    /// The inset margin consumed a frame entirely.
    EmptyFrame { role: QuadRole },
}

impl std::fmt::Display for AsymmetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WidthDifference {
                relative,
                tolerance,
            } => write!(
                f,
                "frame widths differ by {:.1}% (tolerance {:.1}%)",
                relative * 100.0,
                tolerance * 100.0
            ),
            Self::AspectMismatch {
                role,
                aspect,
                expected,
                tolerance,
            } => write!(
                f,
                "{} aspect {:.3} deviates from expected {:.3} (tolerance {:.1}%)",
                role,
                aspect,
                expected,
                tolerance * 100.0
            ),
            Self::EmptyFrame { role } => write!(f, "{} is empty after inset", role),
        }
    }
}

/// Core detection / alignment / composition failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideError {
    /// No mount candidate passed the area, skew and confidence gates.
    NoMountFound {
        best_confidence: Option<f32>,
        candidates_examined: usize,
    },
    /// The split produced frames that cannot form a stereo pair.
    AsymmetricFrames {
        left_size: [f64; 2],
        right_size: [f64; 2],
        reason: AsymmetryReason,
    },
    /// A region's corners cannot be rectified.
    DegenerateQuad { role: QuadRole, defect: QuadDefect },
    /// The rectified grids do not share dimensions.
    ShapeMismatch { left: [u32; 2], right: [u32; 2] },
}

impl std::fmt::Display for SlideError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMountFound {
                best_confidence,
                candidates_examined,
            } => {
                write!(
                    f,
                    "no mount found ({} candidates examined",
                    candidates_examined
                )?;
                if let Some(c) = best_confidence {
                    write!(f, ", best confidence {:.3}", c)?;
                }
                f.write_str(")")
            }
            Self::AsymmetricFrames {
                left_size,
                right_size,
                reason,
            } => write!(
                f,
                "asymmetric frames (left {:.0}x{:.0}, right {:.0}x{:.0}): {}",
                left_size[0], left_size[1], right_size[0], right_size[1], reason
            ),
            Self::DegenerateQuad { role, defect } => {
                write!(f, "degenerate {} quadrilateral: {}", role, defect)
            }
            Self::ShapeMismatch { left, right } => write!(
                f,
                "rectified frames differ in shape: left {}x{}, right {}x{}",
                left[0], left[1], right[0], right[1]
            ),
        }
    }
}

impl std::error::Error for SlideError {}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    MountDetection,
    Split,
    Alignment,
    Enhancement,
    Composition,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MountDetection => "mount detection",
            Self::Split => "pair split",
            Self::Alignment => "alignment",
            Self::Enhancement => "enhancement",
            Self::Composition => "composition",
        };
        f.write_str(s)
    }
}

/// A failed run: the error, where it happened, and (in debug mode) what had
/// been computed so far.
#[derive(Debug)]
pub struct ConvertError {
    pub stage: PipelineStage,
    pub kind: SlideError,
    pub artifacts: Option<Box<DebugArtifacts>>,
}

impl ConvertError {
    pub(crate) fn new(
        stage: PipelineStage,
        kind: SlideError,
        artifacts: Option<Box<DebugArtifacts>>,
    ) -> Self {
        Self {
            stage,
            kind,
            artifacts,
        }
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.kind)
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
