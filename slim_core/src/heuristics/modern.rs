//! AVIF / HEIC / JXL predictors.
//!
//! AVIF mirrors its strip-only optimizer: savings exist only when there
//! is metadata to remove. HEIC and JXL mirror their strip-or-re-encode
//! optimizers with a bits-per-pixel model: coding density below the
//! target threshold means the file is already tighter than a re-encode
//! would produce.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::heif_codec::reencode_quality;
use crate::results::{potential_from_reduction, Confidence, Potential, Prediction};
use crate::types::Method;

pub fn predict_avif(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    let has_metadata = info.has_exif || info.has_icc_profile;
    let reduction = if has_metadata && config.strip_metadata {
        5.0
    } else {
        0.0
    };
    Prediction::from_reduction(
        info.file_size,
        reduction,
        Potential::Low,
        Method::MetadataStrip,
        !has_metadata,
        Confidence::Low,
    )
}

pub fn predict_heic(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    bpp_reencode_prediction(info, config, Method::HeicReencode)
}

pub fn predict_jxl(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    bpp_reencode_prediction(info, config, Method::JxlReencode)
}

/// Expected bits-per-pixel of a photographic re-encode at the given
/// encoder quality. Anchors: q30 ≈ 0.4 bpp, q95 ≈ 1.7 bpp.
fn target_bpp(encoder_quality: u8) -> f64 {
    0.4 + (encoder_quality.saturating_sub(30)) as f64 * 0.02
}

fn bpp_reencode_prediction(
    info: &HeaderInfo,
    config: &OptimizeConfig,
    reencode_method: Method,
) -> Prediction {
    let strip_floor: f64 = if (info.has_exif || info.has_icc_profile) && config.strip_metadata {
        5.0
    } else {
        0.0
    };

    let pixels = info.pixels();
    if pixels == 0 {
        // Dimensions unknown: no density signal at all.
        return Prediction::from_reduction(
            info.file_size,
            strip_floor.max(2.0),
            Potential::Low,
            Method::MetadataStrip,
            false,
            Confidence::Low,
        );
    }

    let bpp = (info.file_size as f64 * 8.0) / pixels as f64;
    let target = target_bpp(reencode_quality(config.quality.value()));

    if bpp <= target {
        // Already at or below the density a re-encode would reach.
        return Prediction::from_reduction(
            info.file_size,
            strip_floor,
            Potential::Low,
            Method::MetadataStrip,
            strip_floor < 3.0,
            Confidence::Medium,
        );
    }

    let reencode_reduction = ((1.0 - target / bpp) * 100.0).min(60.0);
    let (reduction, method) = if reencode_reduction > strip_floor {
        (reencode_reduction, reencode_method)
    } else {
        (strip_floor, Method::MetadataStrip)
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential_from_reduction(reduction),
        method,
        false,
        Confidence::Medium,
    )
}
