//! Optional restoration stages applied to a rectified pair.
//!
//! Stages always run in the fixed order dust removal → aging correction →
//! noise reduction. Every stage is a pure function of its input frame; a
//! stage that hits a numerical edge case returns `None` and the frame passes
//! through unchanged. With every stage disabled the pipeline is the identity.

mod aging;
mod denoise;
mod dust;

use image::RgbImage;

use crate::align::RectifiedPair;

pub use denoise::denoise;

/// Smoothing strategy for the noise-reduction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMethod {
    Bilateral,
    Nlm,
    Gaussian,
}

/// Strength preset shared by all noise-reduction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseStrength {
    Low,
    #[default]
    Medium,
    High,
}

/// Dust detection and fill parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DustParams {
    /// Luma deviation from the local median above which a pixel is an outlier.
    pub contrast_threshold: u8,
    /// Outlier blobs larger than this (pixels) are image content, not dust.
    pub max_blob_area: usize,
    /// Radius of the local median window.
    pub median_radius: u32,
    /// Largest neighbourhood radius searched for clean fill pixels.
    pub fill_radius: u32,
}

impl Default for DustParams {
    fn default() -> Self {
        Self {
            contrast_threshold: 40,
            max_blob_area: 64,
            median_radius: 2,
            fill_radius: 6,
        }
    }
}

/// Tonal stretch parameters for aging correction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AgingParams {
    /// Percent of pixels clipped at each end of every channel histogram.
    pub clip_percentile: f32,
    /// Channels spanning fewer levels than this are left unchanged.
    pub min_span: u8,
}

impl Default for AgingParams {
    fn default() -> Self {
        Self {
            clip_percentile: 0.5,
            min_span: 8,
        }
    }
}

/// Enhancement stage selection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub remove_dust: bool,
    pub remove_aging: bool,
    /// `None` disables noise reduction.
    pub noise_reduction: Option<NoiseMethod>,
    pub noise_strength: NoiseStrength,
    pub dust: DustParams,
    pub aging: AgingParams,
}

/// One enhancement stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceStage {
    DustRemoval,
    AgingCorrection,
    NoiseReduction,
}

/// The pair as it left one stage (debug mode only).
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub stage: EnhanceStage,
    pub pair: RectifiedPair,
}

/// Applies the configured stages to both frames of a pair.
#[derive(Debug, Clone, Default)]
pub struct EnhancementPipeline {
    config: EnhanceConfig,
}

impl EnhancementPipeline {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    /// Enabled stages in execution order.
    pub fn stages(&self) -> Vec<EnhanceStage> {
        let mut stages = Vec::with_capacity(3);
        if self.config.remove_dust {
            stages.push(EnhanceStage::DustRemoval);
        }
        if self.config.remove_aging {
            stages.push(EnhanceStage::AgingCorrection);
        }
        if self.config.noise_reduction.is_some() {
            stages.push(EnhanceStage::NoiseReduction);
        }
        stages
    }

    /// Run every enabled stage.
    pub fn run(&self, pair: RectifiedPair) -> RectifiedPair {
        self.run_with_snapshots(pair, false).0
    }

    /// Run every enabled stage, optionally keeping a copy of the pair after each.
    pub fn run_with_snapshots(
        &self,
        mut pair: RectifiedPair,
        keep_snapshots: bool,
    ) -> (RectifiedPair, Vec<StageSnapshot>) {
        let mut snapshots = Vec::new();
        for stage in self.stages() {
            let (left, right) = rayon::join(
                || self.apply_stage(stage, &pair.left),
                || self.apply_stage(stage, &pair.right),
            );
            pair = RectifiedPair {
                left: left.unwrap_or(pair.left),
                right: right.unwrap_or(pair.right),
            };
            if keep_snapshots {
                snapshots.push(StageSnapshot {
                    stage,
                    pair: pair.clone(),
                });
            }
        }
        (pair, snapshots)
    }

    /// Apply one stage to one frame. `None` means the frame is unchanged.
    pub fn apply_stage(&self, stage: EnhanceStage, frame: &RgbImage) -> Option<RgbImage> {
        let out = match stage {
            EnhanceStage::DustRemoval => dust::remove_dust(frame, &self.config.dust),
            EnhanceStage::AgingCorrection => aging::correct_aging(frame, &self.config.aging),
            EnhanceStage::NoiseReduction => {
                let method = self.config.noise_reduction?;
                denoise(frame, method, self.config.noise_strength)
            }
        };
        match out {
            Some(img) if img.dimensions() == frame.dimensions() => Some(img),
            Some(_) => {
                tracing::debug!("{:?} changed frame dimensions; skipped", stage);
                None
            }
            None => {
                tracing::debug!("{:?} left the frame unchanged", stage);
                None
            }
        }
    }
}
