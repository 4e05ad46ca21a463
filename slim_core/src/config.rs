//! Caller-provided optimization parameters.

use crate::types::Quality;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Target quality in [1, 100]; lower compresses harder.
    pub quality: Quality,

    /// Strip non-essential metadata (GPS, XMP, text chunks). EXIF
    /// orientation and ICC profiles are preserved regardless.
    pub strip_metadata: bool,

    /// Emit progressive JPEG output.
    pub progressive_jpeg: bool,

    /// Allow palette quantization for PNG. When false, PNG optimization
    /// is lossless only.
    pub png_lossy: bool,

    /// Cap size reduction at this percentage. When set, the optimizer
    /// searches for the highest quality that stays within the cap.
    pub max_reduction: Option<f64>,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            strip_metadata: true,
            progressive_jpeg: false,
            png_lossy: true,
            max_reduction: None,
        }
    }
}

impl OptimizeConfig {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Quality::new(quality);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizeConfig::default();
        assert_eq!(config.quality.value(), 80);
        assert!(config.strip_metadata);
        assert!(!config.progressive_jpeg);
        assert!(config.png_lossy);
        assert!(config.max_reduction.is_none());
    }

    #[test]
    fn test_deserialize_partial_body() {
        let config: OptimizeConfig = serde_json::from_str(r#"{"quality": 40}"#).unwrap();
        assert_eq!(config.quality.value(), 40);
        assert!(config.strip_metadata);
    }

    #[test]
    fn test_deserialize_out_of_range_quality_clamps() {
        let config: OptimizeConfig = serde_json::from_str(r#"{"quality": 0}"#).unwrap();
        assert_eq!(config.quality.value(), 1);
    }
}
