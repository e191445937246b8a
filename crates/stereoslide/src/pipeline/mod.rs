//! Conversion pipeline.
//!
//! This module is the glue layer that wires the stages together:
//! mount detection -> pair split -> alignment -> enhancement -> composition.
//!
//! Algorithmic primitives live in `crate::mount`, `crate::split`,
//! `crate::align`, `crate::enhance` and `crate::compose`. The pipeline layer
//! focuses on stage boundaries, error tagging and debug collection.

mod result;
mod run;

pub use result::{Conversion, ConversionReport, DebugArtifacts};

pub(crate) use run::{convert, convert_batch, Stages};

use crate::align::{Alignment, PairAligner};
use crate::compose::VRComposer;
use crate::config::ConvertConfig;
use crate::enhance::EnhancementPipeline;
use crate::error::{ConvertError, PipelineStage, SlideError};
use crate::homography::matrix3_to_array;
use crate::mount::MountDetector;
use crate::raster::RawScan;
use crate::split::PairSplitter;
