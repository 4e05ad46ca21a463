//! JPEG optimization: MozJPEG cjpeg (lossy) + jpegtran (lossless).
//!
//! Pipeline:
//! 1. estimate input quality from the quantization tables
//! 2. input at or below target quality → jpegtran Huffman reoptimization
//! 3. otherwise decode to BMP and pipe through cjpeg at the target
//! 4. `max_reduction` caps are honored by bisecting quality upward

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::jpeg_analysis;
use crate::results::OptimizeResult;
use crate::tool_runner::run_tool;
use crate::types::Method;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use super::{finish, search_capped_quality};

pub fn optimize(
    data: &[u8],
    config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    let target_quality = config.quality.value();
    let input_quality = estimate_input_quality(data);

    if input_quality <= target_quality {
        // Already at or below the target: lossless only.
        let optimized = run_jpegtran(data, config, tool_timeout)?;
        return Ok(finish(data, optimized, Method::Jpegtran, Format::Jpeg));
    }

    let bmp = decode_to_bmp(data)?;
    let lossy = run_cjpeg(&bmp, target_quality, config.progressive_jpeg, tool_timeout)?;

    if let Some(cap) = config.max_reduction {
        let reduction = (1.0 - lossy.len() as f64 / data.len() as f64) * 100.0;
        if reduction > cap {
            debug!(reduction, cap, "mozjpeg output exceeds reduction cap, searching quality");
            let capped = search_capped_quality(data.len(), target_quality, cap, |q| {
                run_cjpeg(&bmp, q, config.progressive_jpeg, tool_timeout).ok()
            });
            return match capped {
                Some((quality, bytes)) => {
                    debug!(quality, "capped quality found");
                    Ok(finish(data, bytes, Method::Mozjpeg, Format::Jpeg))
                }
                // Even q=100 overshoots the cap: fall back to lossless.
                None => {
                    let lossless = run_jpegtran(data, config, tool_timeout)?;
                    Ok(finish(data, lossless, Method::Jpegtran, Format::Jpeg))
                }
            };
        }
    }

    Ok(finish(data, lossy, Method::Mozjpeg, Format::Jpeg))
}

/// Same inverse-IJG mapping the header analyzer uses. Undeterminable
/// tables mean "assume high quality" so the lossless path is taken.
fn estimate_input_quality(data: &[u8]) -> u8 {
    let tables = jpeg_analysis::extract_quantization_tables(data);
    match tables.first() {
        Some(table) => jpeg_analysis::estimate_quality_from_table(table),
        None => 100,
    }
}

/// cjpeg wants a raster input (BMP/PPM/Targa), not JPEG. Decode and
/// hand off RGB; RGBA and exotic modes are flattened.
fn decode_to_bmp(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)?;
    Ok(buf)
}

fn run_cjpeg(bmp: &[u8], quality: u8, progressive: bool, timeout: Duration) -> Result<Vec<u8>> {
    let quality = quality.to_string();
    let mut cmd = vec!["cjpeg", "-quality", quality.as_str()];
    if progressive {
        cmd.push("-progressive");
    }
    Ok(run_tool(&cmd, bmp, timeout, &[])?.stdout)
}

fn run_jpegtran(data: &[u8], config: &OptimizeConfig, timeout: Duration) -> Result<Vec<u8>> {
    let copy_mode = if config.strip_metadata { "none" } else { "all" };
    let mut cmd = vec!["jpegtran", "-optimize", "-copy", copy_mode];
    if config.progressive_jpeg {
        cmd.push("-progressive");
    }
    Ok(run_tool(&cmd, data, timeout, &[])?.stdout)
}
