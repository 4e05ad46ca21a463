//! PNG / APNG optimization: pngquant (lossy) + oxipng (lossless).
//!
//! Pipeline:
//! 1. APNG → lossless only (palette quantization destroys animation)
//! 2. strip metadata chunks first when requested
//! 3. lossy and lossless candidates run in parallel, the lossy winner
//!    gets a lossless squeeze, smallest result wins
//! 4. pngquant exit code 99 (quality threshold not met) is a normal
//!    fallback to lossless, not an error

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::image_formats::png as png_chunks;
use crate::metadata::strip_png_metadata;
use crate::results::OptimizeResult;
use crate::tool_runner::run_tool;
use crate::types::Method;
use std::time::Duration;
use tracing::debug;

use super::{finish, pick_smallest};

pub fn optimize(
    data: &[u8],
    config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    let animated = png_chunks::is_apng(data);
    let format = if animated { Format::Apng } else { Format::Png };
    let quality = config.quality.value();

    let clean = if config.strip_metadata {
        strip_png_metadata(data, true)
    } else {
        data.to_vec()
    };

    // Higher effort pays off at aggressive quality targets; level 2 is
    // the fast default otherwise.
    let oxipng_level = if quality < 70 { 4 } else { 2 };

    if animated || !config.png_lossy {
        let candidate = match run_oxipng(&clean, oxipng_level) {
            Some(optimized) => (optimized, Method::Oxipng),
            // Re-encode failure: the stripped stream is still a valid
            // candidate when stripping alone shrank the file.
            None => (clean, Method::MetadataStrip),
        };
        return Ok(finish(data, candidate.0, candidate.1, format));
    }

    let (max_colors, speed) = if quality < 50 { (64, 3) } else { (256, 4) };

    // Lossy and lossless baselines in parallel; completion order is
    // irrelevant, only sizes are compared.
    let (lossy, lossless) = std::thread::scope(|scope| {
        let lossy_task = scope.spawn(|| run_pngquant(&clean, quality, max_colors, speed, tool_timeout));
        let lossless_task = scope.spawn(|| run_oxipng(&clean, oxipng_level));
        (
            lossy_task.join().expect("pngquant candidate panicked"),
            lossless_task.join().expect("oxipng candidate panicked"),
        )
    });
    // A missing pngquant binary degrades to lossless-only; timeouts and
    // crash exits still propagate.
    let lossy = match lossy {
        Ok(result) => result,
        Err(crate::errors::SlimError::ToolNotFound(tool)) => {
            debug!(tool = %tool, "pngquant unavailable, lossless only");
            None
        }
        Err(e) => return Err(e),
    };

    let mut candidates: Vec<(Vec<u8>, Method)> = Vec::new();
    if let Some(lossless_out) = lossless {
        candidates.push((lossless_out, Method::Oxipng));
    }
    if let Some(lossy_out) = lossy {
        // Squeeze extra bytes from the quantized stream; pngquant output
        // can even be larger than input when dithering inflates it, the
        // size comparison below handles that.
        let squeezed = run_oxipng(&lossy_out, oxipng_level).unwrap_or(lossy_out);
        candidates.push((squeezed, Method::PngquantOxipng));
    }

    let (best, method) = match pick_smallest(candidates) {
        Some(best) => best,
        None => (clean, Method::MetadataStrip),
    };
    Ok(finish(data, best, method, format))
}

/// In-process lossless recompression. Failure drops the candidate.
pub(crate) fn run_oxipng(data: &[u8], level: u8) -> Option<Vec<u8>> {
    let options = oxipng::Options::from_preset(level);
    match oxipng::optimize_from_memory(data, &options) {
        Ok(out) => Some(out),
        Err(e) => {
            debug!(error = %e, "oxipng failed, dropping lossless candidate");
            None
        }
    }
}

/// pngquant over pipes. `Ok(None)` means exit code 99: the quality
/// threshold could not be met and the caller falls back to lossless.
/// Other failures propagate.
fn run_pngquant(
    data: &[u8],
    quality: u8,
    max_colors: u32,
    speed: u32,
    timeout: Duration,
) -> Result<Option<Vec<u8>>> {
    let max_colors = max_colors.to_string();
    let quality_range = format!("1-{}", quality);
    let speed = speed.to_string();
    let cmd = [
        "pngquant",
        max_colors.as_str(),
        "--quality",
        quality_range.as_str(),
        "--speed",
        speed.as_str(),
        "-",
        "--output",
        "-",
    ];
    let output = run_tool(&cmd, data, timeout, &[99])?;
    if output.exit_code == 99 {
        debug!(quality, "pngquant could not meet quality threshold");
        return Ok(None);
    }
    Ok(Some(output.stdout))
}
