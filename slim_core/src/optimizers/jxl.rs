//! JPEG XL optimization via the libjxl command-line tools.
//!
//! The input is decoded once with djxl, then two cjxl candidates run:
//! a lossless re-save (the metadata-strip candidate) and a lossy
//! re-encode at `clamp(quality + 10, 30, 95)`. Smallest wins. The tools
//! work on files, so this pipeline stages through a temp directory.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::heif_codec::reencode_quality;
use crate::results::OptimizeResult;
use crate::tool_runner::{is_tool_available, run_tool};
use crate::types::Method;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{finish, pick_smallest};

pub fn optimize(
    data: &[u8],
    config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    if !is_tool_available("djxl") || !is_tool_available("cjxl") {
        debug!("djxl/cjxl unavailable, returning input");
        return Ok(finish(data, data.to_vec(), Method::None, Format::Jxl));
    }

    let Some(staging) = decode_to_png(data, tool_timeout) else {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Jxl));
    };

    let target = reencode_quality(config.quality.value());

    let mut candidates = Vec::new();
    if config.strip_metadata {
        if let Some(bytes) = encode_jxl(&staging, None, tool_timeout) {
            candidates.push((bytes, Method::MetadataStrip));
        }
    }
    if let Some(bytes) = encode_jxl(&staging, Some(target), tool_timeout) {
        candidates.push((bytes, Method::JxlReencode));
    }

    match pick_smallest(candidates) {
        Some((bytes, method)) => Ok(finish(data, bytes, method, Format::Jxl)),
        None => Ok(finish(data, data.to_vec(), Method::None, Format::Jxl)),
    }
}

struct Staging {
    _dir: tempfile::TempDir,
    png_path: std::path::PathBuf,
}

fn decode_to_png(data: &[u8], timeout: Duration) -> Option<Staging> {
    let dir = tempfile::tempdir().ok()?;
    let jxl_path = dir.path().join("in.jxl");
    let png_path = dir.path().join("decoded.png");
    std::fs::write(&jxl_path, data).ok()?;

    run_tool(
        &["djxl", path_str(&jxl_path)?, path_str(&png_path)?],
        b"",
        timeout,
        &[],
    )
    .ok()?;
    if !png_path.exists() {
        return None;
    }
    Some(Staging {
        _dir: dir,
        png_path,
    })
}

/// cjxl candidate: `quality: None` is a lossless re-save (`-d 0`),
/// otherwise `-q` at the given quality.
fn encode_jxl(staging: &Staging, quality: Option<u8>, timeout: Duration) -> Option<Vec<u8>> {
    let out_path = staging.png_path.with_extension("out.jxl");
    let png = path_str(&staging.png_path)?;
    let out = path_str(&out_path)?;

    let quality_arg;
    let cmd: Vec<&str> = match quality {
        Some(q) => {
            quality_arg = q.to_string();
            vec!["cjxl", png, out, "-q", quality_arg.as_str()]
        }
        None => vec!["cjxl", png, out, "-d", "0"],
    };
    run_tool(&cmd, b"", timeout, &[]).ok()?;
    let bytes = std::fs::read(&out_path).ok()?;
    let _ = std::fs::remove_file(&out_path);
    Some(bytes)
}

fn path_str(path: &Path) -> Option<&str> {
    path.to_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tools_returns_input() {
        // When either tool is absent the optimizer degrades to a no-op.
        let data = vec![0xFF, 0x0A, 0x00, 0x01, 0x02];
        let result = optimize(&data, &OptimizeConfig::default(), Duration::from_secs(5)).unwrap();
        assert!(result.optimized_size <= result.original_size);
        if result.method == Method::None {
            assert_eq!(result.bytes, data);
        }
    }
}
