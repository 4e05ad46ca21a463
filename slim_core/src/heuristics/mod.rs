//! Per-format savings predictors.
//!
//! Each predictor computes a `Prediction` from `HeaderInfo` and the
//! caller's config alone, and mirrors its optimizer's method choice so
//! `Prediction.method` names the pipeline the optimizer is likely to
//! pick. Constants are calibrated against optimizer output on a
//! benchmark corpus; they are not derivable from first principles.

mod gif;
mod jpeg;
mod modern;
mod png;
mod raster;
mod svg;
mod webp;

use crate::config::OptimizeConfig;
use crate::format_detect::Format;
use crate::header_analysis::HeaderInfo;
use crate::results::Prediction;

/// Dispatch on the analyzed format. Exhaustive: a new `Format` variant
/// without a predictor fails to compile.
pub fn predict_reduction(info: &HeaderInfo, config: &OptimizeConfig) -> Prediction {
    match info.format {
        Format::Png => png::predict(info, config),
        Format::Apng => png::predict_apng(info, config),
        Format::Jpeg => jpeg::predict(info, config),
        Format::Webp => webp::predict(info, config),
        Format::Gif => gif::predict(info, config),
        Format::Svg => svg::predict_svg(info, config),
        Format::Svgz => svg::predict_svgz(info, config),
        Format::Avif => modern::predict_avif(info, config),
        Format::Heic => modern::predict_heic(info, config),
        Format::Jxl => modern::predict_jxl(info, config),
        Format::Tiff => raster::predict_tiff(info, config),
        Format::Bmp => raster::predict_bmp(info, config),
    }
}
