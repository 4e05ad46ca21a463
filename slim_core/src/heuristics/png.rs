//! PNG predictor — two-path model mirroring the optimizer.
//!
//! `png_lossy=true` predicts the better of the pngquant+oxipng and
//! oxipng-only paths; `png_lossy=false` predicts the lossless path
//! alone. Probe measurements dominate when they cover the whole file;
//! content heuristics take over for large files.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::results::{potential_from_reduction, Confidence, Potential, Prediction};
use crate::types::Method;

/// Fixed PNG overhead that no optimizer can remove: signature (8) +
/// IHDR (25) + IEND (12) + a minimal IDAT (22).
const MIN_PNG_SIZE: f64 = 67.0;

pub fn predict(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    if !config.png_lossy {
        let (mut reduction, confidence) = lossless_reduction(info);
        if info.has_metadata_chunks && config.strip_metadata {
            reduction += 3.0;
        }
        let reduction = tiny_file_cap(info, reduction);
        return Prediction::from_reduction(
            info.file_size,
            reduction,
            Potential::Low,
            Method::Oxipng,
            reduction < 3.0,
            confidence,
        );
    }

    let (mut reduction, potential, method, confidence, already_optimized) = if info.is_palette_mode
    {
        palette_estimate(info)
    } else {
        let (reduction, method, confidence) = two_path_estimate(info, config);
        (
            reduction,
            potential_from_reduction(reduction),
            method,
            confidence,
            false,
        )
    };

    if info.has_metadata_chunks && config.strip_metadata {
        reduction += 3.0;
    }
    let reduction = tiny_file_cap(info, reduction);

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential,
        method,
        already_optimized,
        confidence,
    )
}

/// APNG — lossless only; the palette quantizer would destroy animation.
pub fn predict_apng(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let reduction = if info.has_metadata_chunks { 5.0 } else { 2.0 };
    Prediction::from_reduction(
        info.file_size,
        reduction,
        Potential::Low,
        Method::Oxipng,
        reduction < 3.0,
        Confidence::Low,
    )
}

/// Already-palette input: savings come from palette shrinking and
/// re-compression, scaled by how small the palette already is.
fn palette_estimate(info: &HeaderInfo) -> (f64, Potential, Method, Confidence, bool) {
    let (reduction, potential) = match info.color_count {
        Some(count) if count < 16 => (15.0, Potential::Low),
        _ if info.file_size < 2000 => (30.0, Potential::Medium),
        _ => (40.0, Potential::Medium),
    };
    let already_optimized = !info.has_metadata_chunks;
    (
        reduction,
        potential,
        Method::PngquantOxipng,
        Confidence::Medium,
        already_optimized,
    )
}

/// Lossless-path estimate: probe-driven when available.
fn lossless_reduction(info: &HeaderInfo) -> (f64, Confidence) {
    let opr = info.oxipng_probe_ratio.value();
    let whole_file = info.whole_file_probes();
    let is_photo = is_photo_content(info);

    match opr {
        // Exact measurement from the actual file.
        Some(ratio) if whole_file => ((1.0 - ratio) * 100.0, Confidence::High),
        _ if is_photo => (3.0, Confidence::Medium),
        // Crop probe: discount for crop-to-whole-file scaling mismatch.
        Some(ratio) => ((1.0 - ratio) * 100.0 * 0.6, Confidence::Medium),
        None => (5.0, Confidence::Medium),
    }
}

fn is_flat_content(info: &HeaderInfo) -> bool {
    matches!(info.flat_pixel_ratio.value(), Some(fpr) if fpr > 0.75)
}

fn is_photo_content(info: &HeaderInfo) -> bool {
    matches!(
        (info.unique_color_ratio.value(), info.flat_pixel_ratio.value()),
        (Some(cr), Some(fpr)) if cr > 0.50 && fpr < 0.50
    )
}

/// Predict both paths, pick the larger reduction (the optimizer picks
/// the smaller output). Returns (reduction, method, confidence).
fn two_path_estimate(info: &HeaderInfo, config: &OptimizeConfig) -> (f64, Method, Confidence) {
    let opr = info.oxipng_probe_ratio.value();
    let qpr = info.png_quantize_ratio.value();
    let lpr = info.png_pngquant_probe_ratio.value();
    let cr = info.unique_color_ratio.value();
    let whole_file = info.whole_file_probes();

    if opr.is_none() && cr.is_none() {
        return (20.0, Method::PngquantOxipng, Confidence::Low);
    }

    let is_flat = is_flat_content(info);
    let is_photo = is_photo_content(info);

    let (lossless, _) = lossless_reduction(info);

    // --- Lossy path ---
    let mut lossy = 0.0;

    if let (Some(lpr), true) = (lpr, whole_file) {
        // Direct proxy measurement: quantize + recompress on the actual
        // file, gated by content type to account for pngquant exit-99
        // at runtime quality ranges. Photos only quantize acceptably at
        // aggressive settings; flat content and graphics almost always
        // succeed.
        let proxy = (1.0 - lpr) * 100.0;
        if is_flat {
            lossy = proxy;
        } else if is_photo {
            if config.quality.value() <= 50 {
                lossy = proxy;
            }
        } else {
            lossy = proxy;
        }
    } else if whole_file {
        if let Some(qpr) = qpr {
            // Thumbnail quantize probe only (image above the pngquant
            // probe pixel limit).
            if is_flat {
                // Without the proxy the pngquant bonus on flat content
                // is unpredictable; the lossless arm carries it.
                lossy = 0.0;
            } else if is_photo {
                if config.quality.value() <= 50 && qpr < 0.60 {
                    lossy = (1.0 - qpr) * 100.0;
                }
            } else if qpr < 0.70 {
                lossy = (1.0 - qpr) * 100.0;
            }
        }
    } else {
        // Large files: no whole-file probes, fall back to color-count
        // heuristics.
        if is_flat || is_photo {
            lossy = 0.0;
        } else if let Some(cr) = cr {
            if cr < 0.005 {
                lossy = 90.0;
            } else if cr < 0.20 {
                lossy = 55.0;
            } else if matches!(qpr, Some(q) if q < 0.50) {
                lossy = 55.0;
            }
        } else if matches!(qpr, Some(q) if q < 0.50) {
            lossy = 55.0;
        }
    }

    let (reduction, method) = if lossy > lossless {
        (lossy, Method::PngquantOxipng)
    } else {
        (lossless, Method::Oxipng)
    };
    let reduction = reduction.clamp(0.0, 95.0);

    let confidence = if lpr.is_some() && whole_file {
        Confidence::High
    } else if opr.is_some() && whole_file {
        Confidence::High
    } else if opr.is_some() {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    (reduction, method, confidence)
}

/// For files under 500 bytes the fixed container overhead bounds any
/// possible reduction.
fn tiny_file_cap(info: &HeaderInfo, reduction: f64) -> f64 {
    if info.file_size < 500 && info.file_size > 0 {
        let max_reduction = ((1.0 - MIN_PNG_SIZE / info.file_size as f64) * 100.0).max(0.0);
        reduction.min(max_reduction)
    } else {
        reduction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detect::Format;
    use crate::heuristics::test_support::info;
    use crate::types::ProbeValue;

    #[test]
    fn test_lossless_only_uses_whole_file_probe() {
        let mut header = info(Format::Png, 20_000);
        header.oxipng_probe_ratio = ProbeValue::Value(0.70);
        let config = OptimizeConfig {
            png_lossy: false,
            ..OptimizeConfig::default()
        };
        let p = predict(&header, &config);
        assert_eq!(p.method, Method::Oxipng);
        assert!((p.reduction_percent - 30.0).abs() < 0.2, "{}", p.reduction_percent);
        assert_eq!(p.confidence, Confidence::High);
    }

    #[test]
    fn test_crop_probe_gets_discounted() {
        let mut header = info(Format::Png, 200_000); // above whole-file limit
        header.oxipng_probe_ratio = ProbeValue::Value(0.50);
        let config = OptimizeConfig {
            png_lossy: false,
            ..OptimizeConfig::default()
        };
        let p = predict(&header, &config);
        // (1 - 0.5) * 100 * 0.6 = 30
        assert!((p.reduction_percent - 30.0).abs() < 0.2);
        assert_eq!(p.confidence, Confidence::Medium);
    }

    #[test]
    fn test_pngquant_proxy_dominates_when_present() {
        let mut header = info(Format::Png, 30_000);
        header.png_pngquant_probe_ratio = ProbeValue::Value(0.25);
        header.oxipng_probe_ratio = ProbeValue::Value(0.95);
        header.unique_color_ratio = ProbeValue::Value(0.05);
        header.flat_pixel_ratio = ProbeValue::Value(0.9);
        let p = predict(&header, &OptimizeConfig::default());
        assert_eq!(p.method, Method::PngquantOxipng);
        assert!((p.reduction_percent - 75.0).abs() < 0.2, "{}", p.reduction_percent);
        assert_eq!(p.confidence, Confidence::High);
    }

    #[test]
    fn test_photo_gated_on_quality() {
        let mut header = info(Format::Png, 30_000);
        header.png_pngquant_probe_ratio = ProbeValue::Value(0.30);
        header.oxipng_probe_ratio = ProbeValue::Value(0.97);
        header.unique_color_ratio = ProbeValue::Value(0.8);
        header.flat_pixel_ratio = ProbeValue::Value(0.2);

        // Photo at default quality 80: pngquant would refuse.
        let p_gentle = predict(&header, &OptimizeConfig::default());
        assert_eq!(p_gentle.method, Method::Oxipng);

        // Aggressive quality unlocks the lossy proxy.
        let p_aggressive = predict(&header, &OptimizeConfig::default().with_quality(40));
        assert_eq!(p_aggressive.method, Method::PngquantOxipng);
        assert!(p_aggressive.reduction_percent > 60.0);
    }

    #[test]
    fn test_large_file_color_heuristic() {
        let mut header = info(Format::Png, 2_000_000);
        header.unique_color_ratio = ProbeValue::Value(0.003);
        header.flat_pixel_ratio = ProbeValue::Value(0.6);
        let p = predict(&header, &OptimizeConfig::default());
        assert_eq!(p.method, Method::PngquantOxipng);
        assert!((p.reduction_percent - 90.0).abs() < 0.2);
        assert_eq!(p.confidence, Confidence::Low);
    }

    #[test]
    fn test_metadata_bonus_applied() {
        let mut header = info(Format::Png, 20_000);
        header.oxipng_probe_ratio = ProbeValue::Value(0.90);
        let mut with_meta = header.clone();
        with_meta.has_metadata_chunks = true;

        let base = predict(&header, &OptimizeConfig::default());
        let bumped = predict(&with_meta, &OptimizeConfig::default());
        assert!((bumped.reduction_percent - base.reduction_percent - 3.0).abs() < 0.2);
    }

    #[test]
    fn test_tiny_file_cap() {
        let mut header = info(Format::Png, 100);
        header.oxipng_probe_ratio = ProbeValue::Value(0.10);
        let p = predict(&header, &OptimizeConfig::default());
        // (1 - 67/100) * 100 = 33
        assert!(p.reduction_percent <= 33.1, "{}", p.reduction_percent);
    }

    #[test]
    fn test_palette_mode_small_palette() {
        let mut header = info(Format::Png, 5_000);
        header.is_palette_mode = true;
        header.color_count = Some(8);
        let p = predict(&header, &OptimizeConfig::default());
        assert!((p.reduction_percent - 15.0).abs() < 0.2);
        assert_eq!(p.potential, Potential::Low);
        assert!(p.already_optimized);
    }

    #[test]
    fn test_apng_low_expectations() {
        let header = info(Format::Apng, 50_000);
        let p = predict_apng(&header, &OptimizeConfig::default());
        assert_eq!(p.method, Method::Oxipng);
        assert!(p.reduction_percent <= 5.0);
        assert!(p.already_optimized);
    }

    #[test]
    fn test_no_probes_at_all_is_low_confidence() {
        let header = info(Format::Png, 200_000);
        let p = predict(&header, &OptimizeConfig::default());
        assert_eq!(p.confidence, Confidence::Low);
        assert!((p.reduction_percent - 20.0).abs() < 0.2);
    }
}
