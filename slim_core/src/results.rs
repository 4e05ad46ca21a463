//! Result records passed between the pipeline and its callers.

use crate::format_detect::Format;
use crate::types::Method;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Potential {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Output of one optimize call. Invariant: `optimized_size <=
/// original_size`; equality implies `method == Method::None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResult {
    pub success: bool,
    pub original_size: u64,
    pub optimized_size: u64,
    pub reduction_percent: f64,
    pub format: Format,
    pub method: Method,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Predictor output. `estimated_size` is derived from the reduction, so
/// the two never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub estimated_size: u64,
    pub reduction_percent: f64,
    pub potential: Potential,
    pub method: Method,
    pub already_optimized: bool,
    pub confidence: Confidence,
}

impl Prediction {
    /// Builds a prediction from a raw reduction estimate, clamping to
    /// [0, 95] and deriving the size from the clamped value.
    pub fn from_reduction(
        file_size: u64,
        reduction_percent: f64,
        potential: Potential,
        method: Method,
        already_optimized: bool,
        confidence: Confidence,
    ) -> Self {
        let reduction = reduction_percent.clamp(0.0, 95.0);
        let reduction = (reduction * 10.0).round() / 10.0;
        let estimated_size = (file_size as f64 * (1.0 - reduction / 100.0)).round() as u64;
        Self {
            estimated_size,
            reduction_percent: reduction,
            potential,
            method,
            already_optimized,
            confidence,
        }
    }
}

/// Full estimator response: header facts plus the prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub original_size: u64,
    pub original_format: Format,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_type: Option<crate::header_analysis::ColorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u8>,
    pub estimated_optimized_size: u64,
    pub estimated_reduction_percent: f64,
    pub optimization_potential: Potential,
    pub method: Method,
    pub already_optimized: bool,
    pub confidence: Confidence,
}

pub fn potential_from_reduction(reduction: f64) -> Potential {
    if reduction >= 40.0 {
        Potential::High
    } else if reduction >= 15.0 {
        Potential::Medium
    } else {
        Potential::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_clamps_to_95() {
        let p = Prediction::from_reduction(
            1000,
            140.0,
            Potential::High,
            Method::PngquantOxipng,
            false,
            Confidence::High,
        );
        assert_eq!(p.reduction_percent, 95.0);
        assert_eq!(p.estimated_size, 50);
    }

    #[test]
    fn test_prediction_negative_clamps_to_zero() {
        let p = Prediction::from_reduction(
            1000,
            -3.0,
            Potential::Low,
            Method::None,
            true,
            Confidence::Low,
        );
        assert_eq!(p.reduction_percent, 0.0);
        assert_eq!(p.estimated_size, 1000);
    }

    #[test]
    fn test_estimated_size_matches_reduction() {
        for reduction in [0.0, 5.0, 33.3, 95.0] {
            let p = Prediction::from_reduction(
                12345,
                reduction,
                Potential::Medium,
                Method::Oxipng,
                false,
                Confidence::Medium,
            );
            let expected = (12345.0 * (1.0 - p.reduction_percent / 100.0)).round() as u64;
            assert_eq!(p.estimated_size, expected);
        }
    }

    #[test]
    fn test_potential_buckets() {
        assert_eq!(potential_from_reduction(50.0), Potential::High);
        assert_eq!(potential_from_reduction(20.0), Potential::Medium);
        assert_eq!(potential_from_reduction(5.0), Potential::Low);
    }
}
