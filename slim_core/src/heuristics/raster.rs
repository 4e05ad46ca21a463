//! TIFF / BMP predictors.
//!
//! TIFF savings track how compressible the pixel data is under
//! deflate/LZW, which the flat-pixel ratio approximates. BMP is
//! uncompressed, so the only real lever is dropping an unused alpha
//! channel (32 → 24 bit ≈ 25%).

use crate::config::OptimizeConfig;
use crate::header_analysis::{ColorKind, HeaderInfo};
use crate::results::{potential_from_reduction, Confidence, Prediction};
use crate::types::Method;

pub fn predict_tiff(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let (reduction, confidence) = match info.flat_pixel_ratio.value() {
        Some(fpr) if fpr > 0.75 => (60.0, Confidence::Medium),
        Some(fpr) if fpr > 0.40 => (35.0, Confidence::Medium),
        Some(_) => (15.0, Confidence::Medium),
        None => (10.0, Confidence::Low),
    };

    // Grayscale stores a third of the bytes; deflate has less to find.
    let reduction = if info.color_type == Some(ColorKind::Grayscale) {
        reduction * 0.7
    } else {
        reduction
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential_from_reduction(reduction),
        Method::TiffDeflate,
        reduction < 3.0,
        confidence,
    )
}

pub fn predict_bmp(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let (reduction, confidence) = match info.color_type {
        // 4 bytes per pixel down to 3.
        Some(ColorKind::Rgba) => (25.0, Confidence::Medium),
        Some(_) => (2.0, Confidence::Medium),
        None => (2.0, Confidence::Low),
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential_from_reduction(reduction),
        Method::Bmp,
        reduction < 3.0,
        confidence,
    )
}
