//! WebP optimization: in-process libwebp re-encode, cwebp CLI fallback.
//!
//! Static images are re-encoded at the target quality with the slowest
//! method setting. When the in-process result looks poor (≥ 90% of the
//! input) an external cwebp pass may do better; the smaller output wins.
//! Animated WebP has no encoder in this stack and passes through
//! untouched.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::image_formats::webp as webp_container;
use crate::results::OptimizeResult;
use crate::tool_runner::{is_tool_available, run_tool};
use crate::types::Method;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

use super::{finish, search_capped_quality};

/// In-process result at or above this fraction of the input triggers the
/// cwebp fallback attempt.
const FALLBACK_THRESHOLD: f64 = 0.9;

pub fn optimize(
    data: &[u8],
    config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    if webp_container::is_animated(data) {
        // No animated re-encoder available; keep the input.
        return Ok(finish(data, data.to_vec(), Method::None, Format::Webp));
    }

    let Ok(img) = image::load_from_memory(data) else {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Webp));
    };

    let quality = config.quality.value();
    let mut best = encode_webp(&img, quality);
    let mut method = Method::Webp;

    let poor = best
        .as_ref()
        .map(|b| b.len() as f64 >= data.len() as f64 * FALLBACK_THRESHOLD)
        .unwrap_or(true);
    if poor {
        if let Some(fallback) = cwebp_fallback(data, quality, tool_timeout) {
            let better = match &best {
                Some(current) => fallback.len() < current.len(),
                None => true,
            };
            if better {
                best = Some(fallback);
                method = Method::Cwebp;
            }
        }
    }

    let Some(mut candidate) = best else {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Webp));
    };

    if let Some(cap) = config.max_reduction {
        let reduction = (1.0 - candidate.len() as f64 / data.len() as f64) * 100.0;
        if reduction > cap {
            match search_capped_quality(data.len(), quality, cap, |q| encode_webp(&img, q)) {
                Some((q, bytes)) => {
                    debug!(quality = q, "webp reduction capped");
                    candidate = bytes;
                    method = Method::Webp;
                }
                None => {
                    return Ok(finish(data, data.to_vec(), Method::None, Format::Webp));
                }
            }
        }
    }

    Ok(finish(data, candidate, method, Format::Webp))
}

/// libwebp encode with method 6 (slowest, best compression). Failure
/// drops the candidate.
fn encode_webp(img: &image::DynamicImage, quality: u8) -> Option<Vec<u8>> {
    let encoder = ::webp::Encoder::from_image(img).ok()?;
    let mut webp_config = ::webp::WebPConfig::new().ok()?;
    webp_config.quality = quality as f32;
    webp_config.method = 6;
    let memory = encoder.encode_advanced(&webp_config).ok()?;
    Some(memory.to_vec())
}

/// cwebp requires file paths, so this is the one place temp files
/// appear. Absent binary or any I/O problem just drops the candidate.
fn cwebp_fallback(data: &[u8], quality: u8, timeout: Duration) -> Option<Vec<u8>> {
    if !is_tool_available("cwebp") {
        return None;
    }
    let dir = tempfile::tempdir().ok()?;
    let in_path = dir.path().join("in.webp");
    let out_path = dir.path().join("out.webp");
    let mut infile = std::fs::File::create(&in_path).ok()?;
    infile.write_all(data).ok()?;
    drop(infile);

    let quality = quality.to_string();
    let cmd = [
        "cwebp",
        "-q",
        quality.as_str(),
        "-m",
        "6",
        in_path.to_str()?,
        "-o",
        out_path.to_str()?,
    ];
    run_tool(&cmd, b"", timeout, &[]).ok()?;
    std::fs::read(&out_path).ok()
}
