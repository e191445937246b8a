//! Conversion configuration tree.
//!
//! Every stage keeps its parameters next to its implementation; this module
//! only aggregates them. Omitted JSON fields take their defaults.

use std::path::Path;

use crate::align::AlignConfig;
use crate::enhance::EnhanceConfig;
use crate::mount::MountDetectConfig;
use crate::split::SplitConfig;

/// Configuration loading / validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(e) => write!(f, "cannot read config: {}", e),
            Self::Parse(e) => write!(f, "cannot parse config: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Read(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Top-level configuration for one conversion run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub mount: MountDetectConfig,
    pub split: SplitConfig,
    pub align: AlignConfig,
    pub enhance: EnhanceConfig,
    /// Collect intermediate artifacts alongside the result.
    pub debug: bool,
}

fn check(cond: bool, msg: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::Invalid(msg()))
    }
}

fn unit_range(r: [f64; 2]) -> bool {
    r[0].is_finite() && r[1].is_finite() && 0.0 <= r[0] && r[0] < r[1] && r[1] <= 1.0
}

impl ConvertConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Parse and validate a JSON config string.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mount;
        check(unit_range(m.area_ratio_range), || {
            format!(
                "mount.area_ratio_range must satisfy 0 <= a_min < a_max <= 1, got {:?}",
                m.area_ratio_range
            )
        })?;
        check((0.0..=45.0).contains(&m.max_skew_deg), || {
            format!("mount.max_skew_deg must be in [0, 45], got {}", m.max_skew_deg)
        })?;
        check((0.0..=1.0).contains(&m.min_confidence), || {
            format!("mount.min_confidence must be in [0, 1], got {}", m.min_confidence)
        })?;
        check(m.grad_threshold > 0.0 && m.grad_threshold <= 1.0, || {
            format!("mount.grad_threshold must be in (0, 1], got {}", m.grad_threshold)
        })?;
        check(m.blur_sigma >= 0.0 && m.blur_sigma.is_finite(), || {
            format!("mount.blur_sigma must be >= 0, got {}", m.blur_sigma)
        })?;
        check(m.detection_max_dim >= 64, || {
            format!("mount.detection_max_dim must be >= 64, got {}", m.detection_max_dim)
        })?;
        check(m.max_candidates >= 1, || "mount.max_candidates must be >= 1".to_string())?;

        let s = &self.split;
        check(unit_range(s.divider_search_window), || {
            format!(
                "split.divider_search_window must satisfy 0 <= lo < hi <= 1, got {:?}",
                s.divider_search_window
            )
        })?;
        check(s.divider_rel_intensity > 0.0 && s.divider_rel_intensity <= 1.0, || {
            format!(
                "split.divider_rel_intensity must be in (0, 1], got {}",
                s.divider_rel_intensity
            )
        })?;
        check(s.fallback_split_ratio > 0.0 && s.fallback_split_ratio < 1.0, || {
            format!(
                "split.fallback_split_ratio must be in (0, 1), got {}",
                s.fallback_split_ratio
            )
        })?;
        check(s.frame_inset_px >= 0.0 && s.frame_inset_px.is_finite(), || {
            format!("split.frame_inset_px must be >= 0, got {}", s.frame_inset_px)
        })?;
        check(s.frame_aspect_tolerance > 0.0, || {
            format!(
                "split.frame_aspect_tolerance must be > 0, got {}",
                s.frame_aspect_tolerance
            )
        })?;
        if let Some(aspect) = s.expected_frame_aspect {
            check(aspect > 0.0 && aspect.is_finite(), || {
                format!("split.expected_frame_aspect must be > 0, got {}", aspect)
            })?;
        }

        let a = &self.align;
        check(
            a.canonical_size.iter().all(|&v| v > 0 && v <= 16384),
            || {
                format!(
                    "align.canonical_size must be within 1..=16384, got {:?}",
                    a.canonical_size
                )
            },
        )?;
        check((0.0..1.0).contains(&a.min_corner_sine), || {
            format!("align.min_corner_sine must be in [0, 1), got {}", a.min_corner_sine)
        })?;

        let e = &self.enhance;
        check((0.0..50.0).contains(&e.aging.clip_percentile), || {
            format!(
                "enhance.aging.clip_percentile must be in [0, 50), got {}",
                e.aging.clip_percentile
            )
        })?;
        check(e.dust.median_radius >= 1, || {
            "enhance.dust.median_radius must be >= 1".to_string()
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::ScanOrientation;
    use crate::enhance::{NoiseMethod, NoiseStrength};

    #[test]
    fn defaults_are_valid() {
        assert!(ConvertConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ConvertConfig::from_json_str(
            r#"{
                "mount": { "max_skew_deg": 10.0 },
                "align": { "canonical_size": [512, 512], "orientation": "rotated180" },
                "enhance": { "noise_reduction": "nlm", "noise_strength": "high", "remove_dust": true },
                "debug": true
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.mount.max_skew_deg, 10.0);
        assert_eq!(cfg.mount.area_ratio_range, [0.2, 0.95]);
        assert_eq!(cfg.align.canonical_size, [512, 512]);
        assert_eq!(cfg.align.orientation, ScanOrientation::Rotated180);
        assert_eq!(cfg.enhance.noise_reduction, Some(NoiseMethod::Nlm));
        assert_eq!(cfg.enhance.noise_strength, NoiseStrength::High);
        assert!(cfg.enhance.remove_dust);
        assert!(!cfg.enhance.remove_aging);
        assert_eq!(cfg.split.frame_inset_px, 15.0);
        assert!(cfg.debug);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = ConvertConfig::from_json_str(r#"{ "mount": { "area_ratio_range": [0.9, 0.2] } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut cfg = ConvertConfig::default();
        cfg.align.canonical_size = [0, 1024];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ConvertConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
