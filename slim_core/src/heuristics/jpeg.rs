//! JPEG predictor — encoder-bonus + quality-delta model.
//!
//! Mirrors the optimizer: both the jpegtran (lossless) and mozjpeg
//! (lossy) methods are modeled and the larger predicted reduction wins,
//! because the optimizer keeps the smaller output. Curve constants are
//! calibrated from benchmark runs across source qualities 40-98 and
//! target qualities 40/60/80.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::results::{potential_from_reduction, Confidence, Prediction};
use crate::types::Method;

/// Mean observed reduction for screenshot-like content; flat regions
/// compress better at small deltas but saturate near 78% instead of the
/// photographic 93% ceiling.
const SCREENSHOT_MEAN: f64 = 69.0;

pub fn predict(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    let source_q = info.estimated_quality.unwrap_or(85) as f64;
    let target_q = config.quality.value() as f64;
    let delta = source_q - target_q;

    let jpegtran = jpegtran_reduction(source_q);
    let mozjpeg = mozjpeg_reduction(source_q, delta);

    let (mut reduction, method) = if mozjpeg >= jpegtran {
        (mozjpeg, Method::Mozjpeg)
    } else {
        (jpegtran, Method::Jpegtran)
    };

    // Screenshot correction: blend toward the empirical flat-content
    // mean when the content is overwhelmingly flat.
    if delta > 0.0 {
        if let Some(fpr) = info.flat_pixel_ratio.value() {
            if fpr > 0.75 {
                reduction = reduction * 0.4 + SCREENSHOT_MEAN * 0.6;
            }
        }
    }

    if info.has_exif && config.strip_metadata {
        reduction += 2.0;
    }
    if config.progressive_jpeg {
        reduction += 1.0;
    }
    if info.is_progressive {
        reduction *= 0.95;
    }

    // Tiny files: fixed marker/table overhead dominates, and below 2KB
    // coding efficiency drops further.
    if info.file_size < 5000 && info.file_size > 0 {
        let overhead = 700.0 + (2000.0 - info.file_size as f64).max(0.0) * 0.3;
        let max_reduction = ((1.0 - overhead / info.file_size as f64) * 100.0).max(0.0);
        reduction = reduction.min(max_reduction);
    }

    let already_optimized = delta < 0.0 && !info.has_exif;

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential_from_reduction(reduction),
        method,
        already_optimized,
        Confidence::Medium,
    )
}

/// Lossless Huffman optimization. Base reduction scales with
/// `100 - source_q` (lower quality leaves more zero runs); sources above
/// q90 get an exponential bonus from near-1 quantization redundancy.
fn jpegtran_reduction(source_q: f64) -> f64 {
    let mut reduction = 6.75 + 0.194 * (100.0 - source_q);
    if source_q > 90.0 {
        reduction += 0.668 * (0.293 * (source_q - 90.0)).exp();
    }
    reduction
}

/// Trellis quantization + optimized Huffman. Piecewise linear in delta
/// with breakpoints at 8, 20, and 40, scaled by a source-quality
/// factor; at delta ≈ 0 the encoder bonus tapers with source quality,
/// and below delta -3 re-encoding at a higher quality only grows the
/// file.
fn mozjpeg_reduction(source_q: f64, delta: f64) -> f64 {
    if delta > 0.0 {
        let encoder_bonus = 28.0;
        let sq_factor = 1.0 + (source_q - 75.0) * 0.008;
        let s1 = 1.1 + (source_q - 75.0) * 0.015;
        let extra = if delta <= 8.0 {
            s1 * delta
        } else if delta <= 20.0 {
            s1 * 8.0 + 2.8 * sq_factor * (delta - 8.0)
        } else if delta <= 40.0 {
            let base_20 = s1 * 8.0 + 2.5 * sq_factor * 12.0;
            base_20 + 0.65 * sq_factor * (delta - 20.0)
        } else {
            let base_20 = s1 * 8.0 + 2.5 * sq_factor * 12.0;
            let base_40 = base_20 + 0.65 * sq_factor * 20.0;
            base_40 + 0.2 * (delta - 40.0)
        };
        (encoder_bonus + extra).min(93.0)
    } else if delta >= -3.0 {
        // delta -1 is almost always IJG rounding, treat as full bonus;
        // only taper at -2/-3 where a real negative delta is possible.
        let encoder_bonus = (28.0 - 1.67 * (source_q - 78.0).max(0.0)).max(8.0);
        let taper = 1.0 + (delta + 1.0).min(0.0) / 5.0;
        encoder_bonus * taper
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detect::Format;
    use crate::heuristics::test_support::info;
    use crate::results::Potential;
    use crate::types::ProbeValue;

    fn jpeg_info(file_size: u64, source_q: u8) -> HeaderInfo {
        let mut header = info(Format::Jpeg, file_size);
        header.estimated_quality = Some(source_q);
        header
    }

    #[test]
    fn test_high_source_low_target_predicts_mozjpeg() {
        let header = jpeg_info(100_000, 95);
        let p = predict(&header, &OptimizeConfig::default().with_quality(40));
        assert_eq!(p.method, Method::Mozjpeg);
        assert!(p.reduction_percent > 40.0, "{}", p.reduction_percent);
        assert_eq!(p.potential, Potential::High);
    }

    #[test]
    fn test_low_source_high_target_predicts_jpegtran() {
        // Source q40, target 80: delta -40, mozjpeg contributes nothing.
        let header = jpeg_info(100_000, 40);
        let p = predict(&header, &OptimizeConfig::default().with_quality(80));
        assert_eq!(p.method, Method::Jpegtran);
        // 6.75 + 0.194 * 60 = 18.39
        assert!((p.reduction_percent - 18.4).abs() < 0.2, "{}", p.reduction_percent);
        assert!(p.already_optimized);
    }

    #[test]
    fn test_delta_zero_taper() {
        // source == target == 80: mozjpeg bonus max(8, 28 - 1.67*2) =
        // 24.66, beats jpegtran's 10.63.
        let header = jpeg_info(100_000, 80);
        let p = predict(&header, &OptimizeConfig::default().with_quality(80));
        assert_eq!(p.method, Method::Mozjpeg);
        assert!((p.reduction_percent - 24.7).abs() < 0.3, "{}", p.reduction_percent);
    }

    #[test]
    fn test_very_high_source_gets_exponential_jpegtran_bonus() {
        let q98 = jpegtran_reduction(98.0);
        let q90 = jpegtran_reduction(90.0);
        // The exponential term dominates the linear decrease.
        assert!(q98 > q90, "q98 {} vs q90 {}", q98, q90);
    }

    #[test]
    fn test_screenshot_blend() {
        let mut header = jpeg_info(100_000, 95);
        header.flat_pixel_ratio = ProbeValue::Value(0.9);
        let p_flat = predict(&header, &OptimizeConfig::default().with_quality(40));

        let plain = jpeg_info(100_000, 95);
        let p_plain = predict(&plain, &OptimizeConfig::default().with_quality(40));

        // 40/60 blend toward 69 pulls the photographic estimate down or
        // up toward the screenshot mean.
        let expected = p_plain.reduction_percent * 0.4 + SCREENSHOT_MEAN * 0.6;
        assert!((p_flat.reduction_percent - expected).abs() < 0.5);
    }

    #[test]
    fn test_exif_and_progressive_adjustments() {
        let base = jpeg_info(100_000, 95);
        let p_base = predict(&base, &OptimizeConfig::default().with_quality(60));

        let mut with_exif = jpeg_info(100_000, 95);
        with_exif.has_exif = true;
        let p_exif = predict(&with_exif, &OptimizeConfig::default().with_quality(60));
        assert!((p_exif.reduction_percent - p_base.reduction_percent - 2.0).abs() < 0.2);

        let mut progressive_in = jpeg_info(100_000, 95);
        progressive_in.is_progressive = true;
        let p_prog = predict(&progressive_in, &OptimizeConfig::default().with_quality(60));
        assert!(p_prog.reduction_percent < p_base.reduction_percent);
    }

    #[test]
    fn test_tiny_file_cap() {
        // 1KB file: overhead = 700 + 1000*0.3 = 1000 bytes => cap 0%.
        let header = jpeg_info(1000, 95);
        let p = predict(&header, &OptimizeConfig::default().with_quality(40));
        assert_eq!(p.reduction_percent, 0.0);

        // 4KB file: overhead 700 => cap 82.5%.
        let header = jpeg_info(4000, 95);
        let p = predict(&header, &OptimizeConfig::default().with_quality(40));
        assert!(p.reduction_percent <= 82.5 + 0.1);
    }

    #[test]
    fn test_missing_quality_defaults_to_85() {
        let mut header = jpeg_info(100_000, 85);
        header.estimated_quality = None;
        let with_default = predict(&header, &OptimizeConfig::default());
        let explicit = predict(&jpeg_info(100_000, 85), &OptimizeConfig::default());
        assert_eq!(with_default.reduction_percent, explicit.reduction_percent);
    }
}
