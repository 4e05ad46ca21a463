//! Savings estimation without running the optimizer.
//!
//! Three layers, in increasing cost:
//! 1. header analysis — format, dimensions, color layout (~1 ms)
//! 2. format heuristics — predicted reduction from header signals
//! 3. thumbnail re-compression — JPEG only, when the predicted method is
//!    jpegtran (~15-30 ms)
//!
//! WebP is excluded from layer 3: a thumbnail re-compression measures
//! decoded-pixel compressibility, not re-compression of an
//! already-compressed file, and overestimates badly.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::{detect, Format};
use crate::header_analysis::{analyze, HeaderInfo};
use crate::heuristics::predict_reduction;
use crate::results::{Confidence, Estimate, Prediction};
use crate::types::Method;
use std::io::Cursor;
use tracing::debug;

/// Heuristic and thumbnail estimates within this many percentage points
/// of each other upgrade confidence to high.
const AGREEMENT_WINDOW: f64 = 15.0;

pub fn estimate(data: &[u8], config: &OptimizeConfig) -> Result<Estimate> {
    let format = detect(data)?;
    let info = analyze(data, format);
    let mut prediction = predict_reduction(&info, config);

    if format == Format::Jpeg && prediction.method == Method::Jpegtran {
        if let Some(ratio) = thumbnail_compress(data, config.quality.value()) {
            prediction = combine_with_thumbnail(prediction, ratio, &info);
        }
    }

    Ok(Estimate {
        original_size: info.file_size,
        original_format: format,
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        bit_depth: info.bit_depth,
        estimated_optimized_size: prediction.estimated_size,
        estimated_reduction_percent: prediction.reduction_percent,
        optimization_potential: prediction.potential,
        method: prediction.method,
        already_optimized: prediction.already_optimized,
        confidence: prediction.confidence,
    })
}

/// Decode, shrink to 64x64, save at q100 (baseline) and at the target
/// quality; the size ratio approximates whole-file behavior.
fn thumbnail_compress(data: &[u8], quality: u8) -> Option<f64> {
    let img = image::load_from_memory(data).ok()?;
    let thumb = img.thumbnail(64, 64).to_rgb8();

    let baseline = encode_jpeg(&thumb, 100)?;
    let compressed = encode_jpeg(&thumb, quality)?;
    if baseline.is_empty() {
        return None;
    }
    Some(compressed.len() as f64 / baseline.len() as f64)
}

fn encode_jpeg(img: &image::RgbImage, quality: u8) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    img.write_with_encoder(encoder).ok()?;
    Some(buf)
}

/// 50/50 blend of heuristic and thumbnail estimates; agreement within
/// the window means both signals point the same way.
fn combine_with_thumbnail(prediction: Prediction, ratio: f64, info: &HeaderInfo) -> Prediction {
    let thumbnail_reduction = ((1.0 - ratio) * 1000.0).round() / 10.0;
    let heuristic_reduction = prediction.reduction_percent;
    let combined = (heuristic_reduction + thumbnail_reduction) / 2.0;

    let confidence = if (heuristic_reduction - thumbnail_reduction).abs() < AGREEMENT_WINDOW {
        Confidence::High
    } else {
        Confidence::Medium
    };
    debug!(
        heuristic = heuristic_reduction,
        thumbnail = thumbnail_reduction,
        combined,
        "Combined heuristic with thumbnail probe"
    );

    Prediction::from_reduction(
        info.file_size,
        combined,
        prediction.potential,
        prediction.method,
        prediction.already_optimized,
        confidence,
    )
}
