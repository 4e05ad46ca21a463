//! WebP predictor — bits-per-pixel source-quality estimate plus
//! interpolated reference curves.
//!
//! There is no quantization table to read, so source quality is inferred
//! from coding density: `bpp = file_size * 8 / pixels`. Reduction then
//! interpolates between curves calibrated at source qualities 60, 80,
//! and 95.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::results::{Confidence, Potential, Prediction};
use crate::types::Method;

pub fn predict(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    let pixels = info.pixels().max(1);
    let bpp = (info.file_size as f64 * 8.0) / pixels as f64;
    let est_source_q = bpp_to_quality(bpp);
    let delta = est_source_q as i32 - config.quality.value() as i32;

    let (reduction, potential) = if delta < 0 {
        (0.0, Potential::Low)
    } else if delta == 0 {
        (5.0, Potential::Low)
    } else {
        let r = interpolated_reduction(est_source_q, delta as f64);
        let potential = if r >= 40.0 {
            Potential::High
        } else {
            Potential::Medium
        };
        (r, potential)
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential,
        Method::Webp,
        delta <= 0,
        Confidence::Medium,
    )
}

/// Piecewise linear bpp → quality map (photographic content):
/// bpp ~2.1 → q60, ~3.0 → q80, ~5.2 → q95.
fn bpp_to_quality(bpp: f64) -> i32 {
    if bpp <= 0.1 {
        20
    } else if bpp <= 2.1 {
        ((60.0 - (2.1 - bpp) * 20.0).max(20.0)) as i32
    } else if bpp <= 3.0 {
        (60.0 + (bpp - 2.1) / 0.9 * 20.0) as i32
    } else if bpp <= 5.2 {
        (80.0 + (bpp - 3.0) / 2.2 * 15.0) as i32
    } else {
        ((95.0 + (bpp - 5.2) * 1.5).min(98.0)) as i32
    }
}

fn curve_60(d: f64) -> f64 {
    (7.0 + 0.92 * d).min(50.0)
}

fn curve_80(d: f64) -> f64 {
    if d <= 20.0 {
        5.5 + 1.33 * d
    } else if d <= 40.0 {
        32.0 + 1.1 * (d - 20.0)
    } else {
        (54.0 + 0.4 * (d - 40.0)).min(75.0)
    }
}

fn curve_95(d: f64) -> f64 {
    if d <= 15.0 {
        5.0 + 2.77 * d
    } else if d <= 35.0 {
        46.5 + 0.825 * (d - 15.0)
    } else if d <= 55.0 {
        63.0 + 0.475 * (d - 35.0)
    } else {
        (72.5 + 0.2 * (d - 55.0)).min(78.0)
    }
}

fn interpolated_reduction(est_source_q: i32, delta: f64) -> f64 {
    let q = est_source_q as f64;
    if q <= 60.0 {
        curve_60(delta)
    } else if q <= 80.0 {
        let t = (q - 60.0) / 20.0;
        curve_60(delta) * (1.0 - t) + curve_80(delta) * t
    } else if q <= 95.0 {
        let t = (q - 80.0) / 15.0;
        curve_80(delta) * (1.0 - t) + curve_95(delta) * t
    } else {
        (curve_95(delta) * 1.03).min(78.0)
    }
}
