//! SVG / SVGZ predictor — bytes-based continuous model.
//!
//! Predicts absolute bytes saved: a structural base (what minification
//! always removes) plus the measured bloat fraction scaled by an
//! efficiency factor. SVGZ uses a much smaller factor because gzip has
//! already absorbed most textual redundancy.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::results::{Confidence, Potential, Prediction};
use crate::types::Method;

pub fn predict_svg(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let reduction = match info.svg_bloat_ratio.value() {
        Some(ratio) => {
            let base_bytes = 28.0;
            let bloat_bytes = info.file_size as f64 * ratio * 0.98;
            let saved = base_bytes + bloat_bytes;
            ((saved / info.file_size.max(1) as f64) * 100.0).clamp(3.0, 60.0)
        }
        None => {
            if info.has_metadata_chunks {
                30.0
            } else {
                8.0
            }
        }
    };

    let potential = if reduction >= 30.0 {
        Potential::High
    } else if reduction >= 10.0 {
        Potential::Medium
    } else {
        Potential::Low
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential,
        Method::Svgmin,
        reduction <= 5.0,
        Confidence::Medium,
    )
}

pub fn predict_svgz(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let reduction = match info.svg_bloat_ratio.value() {
        Some(ratio) => {
            let base_bytes = 5.0;
            let bloat_bytes = info.file_size as f64 * ratio * 0.38;
            let saved = base_bytes + bloat_bytes;
            ((saved / info.file_size.max(1) as f64) * 100.0).clamp(2.0, 30.0)
        }
        None => {
            if info.has_metadata_chunks {
                8.0
            } else {
                5.0
            }
        }
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        Potential::Low,
        Method::Svgmin,
        reduction <= 3.0,
        Confidence::Medium,
    )
}
