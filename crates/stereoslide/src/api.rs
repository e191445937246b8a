//! High-level conversion API.
//!
//! [`SlideConverter`] is the primary entry point. It wraps a validated
//! [`ConvertConfig`] and the stage objects built from it; create once,
//! convert many scans.

use std::path::Path;

use crate::config::{ConfigError, ConvertConfig};
use crate::error::ConvertError;
use crate::mount::MountDetection;
use crate::pipeline::{self, Conversion, Stages};
use crate::raster::RawScan;

/// Primary conversion interface.
///
/// # Examples
///
/// ```no_run
/// use stereoslide::{RawScan, SlideConverter};
///
/// let img = image::open("slide.tif").unwrap();
/// let converter = SlideConverter::default();
/// let conversion = converter.convert(&RawScan::from_dynamic(&img)).unwrap();
/// conversion.frame.image().save("slide_vr.jpg").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SlideConverter {
    config: ConvertConfig,
    stages: Stages,
}

impl SlideConverter {
    /// Validate `config` and build the pipeline.
    pub fn new(config: ConvertConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Build the pipeline without validating `config`.
    pub fn with_config(config: ConvertConfig) -> Self {
        let stages = Stages::from_config(&config);
        Self { config, stages }
    }

    /// Load a JSON config file and build the pipeline.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::with_config(ConvertConfig::from_json_file(path)?))
    }

    /// Access the current configuration.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Run the full pipeline on one scan.
    pub fn convert(&self, scan: &RawScan) -> Result<Conversion, ConvertError> {
        pipeline::convert(scan, &self.stages)
    }

    /// Convert independent scans in parallel. Each slide fails or succeeds on
    /// its own; results are in input order.
    pub fn convert_batch(&self, scans: &[RawScan]) -> Vec<Result<Conversion, ConvertError>> {
        pipeline::convert_batch(scans, &self.stages)
    }

    /// Run mount detection only.
    pub fn detect_mount(&self, scan: &RawScan) -> MountDetection {
        self.stages.detector.detect(scan)
    }
}

impl Default for SlideConverter {
    fn default() -> Self {
        Self::with_config(ConvertConfig::default())
    }
}
