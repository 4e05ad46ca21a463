//! Per-format optimizers and the dispatch router.
//!
//! Every optimizer produces candidate encodings and funnels them through
//! [`finish`], which enforces the service-wide guarantee: output is
//! strictly smaller than input, or the input itself comes back with
//! `Method::None`.

pub mod avif;
pub mod bmp;
pub mod gif;
pub mod heic;
pub mod jpeg;
pub mod jxl;
pub mod png;
pub mod svg;
pub mod tiff;
pub mod webp;

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::{detect, Format};
use crate::results::OptimizeResult;
use crate::types::Method;
use std::time::Duration;
use tracing::info;

/// Detect the format and dispatch to its optimizer. The match is
/// exhaustive: adding a `Format` variant without an optimizer is a
/// compile error, not a runtime KeyError.
pub fn optimize_image(
    data: &[u8],
    config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    let format = detect(data)?;
    let result = match format {
        Format::Png | Format::Apng => png::optimize(data, config, tool_timeout),
        Format::Jpeg => jpeg::optimize(data, config, tool_timeout),
        Format::Webp => webp::optimize(data, config, tool_timeout),
        Format::Gif => gif::optimize(data, config, tool_timeout),
        Format::Svg | Format::Svgz => svg::optimize(data, config),
        Format::Avif => avif::optimize(data, config),
        Format::Heic => heic::optimize(data, config),
        Format::Jxl => jxl::optimize(data, config, tool_timeout),
        Format::Tiff => tiff::optimize(data, config),
        Format::Bmp => bmp::optimize(data, config),
    }?;

    info!(
        format = %result.format,
        method = %result.method,
        original_size = result.original_size,
        optimized_size = result.optimized_size,
        reduction_percent = result.reduction_percent,
        "Optimization finished"
    );
    Ok(result)
}

/// Apply the never-larger guarantee to a candidate encoding.
pub(crate) fn finish(
    original: &[u8],
    candidate: Vec<u8>,
    method: Method,
    format: Format,
) -> OptimizeResult {
    let original_size = original.len() as u64;
    let candidate_size = candidate.len() as u64;

    if candidate_size >= original_size {
        return OptimizeResult {
            success: true,
            original_size,
            optimized_size: original_size,
            reduction_percent: 0.0,
            format,
            method: Method::None,
            bytes: original.to_vec(),
            message: Some("Image is already optimized".to_string()),
        };
    }

    let reduction = (1.0 - candidate_size as f64 / original_size as f64) * 100.0;
    OptimizeResult {
        success: true,
        original_size,
        optimized_size: candidate_size,
        reduction_percent: (reduction * 10.0).round() / 10.0,
        format,
        method,
        bytes: candidate,
        message: None,
    }
}

/// Smallest candidate wins; on equal sizes the lossless/simpler method
/// tag is preferred.
pub(crate) fn pick_smallest(candidates: Vec<(Vec<u8>, Method)>) -> Option<(Vec<u8>, Method)> {
    candidates.into_iter().min_by(|(a, ma), (b, mb)| {
        a.len()
            .cmp(&b.len())
            .then_with(|| mb.is_lossless().cmp(&ma.is_lossless()))
    })
}

/// Binary search for the lowest quality in `[floor_q, 100]` whose
/// reduction stays within `cap` percent (≤ 5 iterations). Returns None
/// when even q=100 violates the cap. Pure: the encode closure carries
/// any state.
pub(crate) fn search_capped_quality<F>(
    original_len: usize,
    floor_q: u8,
    cap: f64,
    mut encode: F,
) -> Option<(u8, Vec<u8>)>
where
    F: FnMut(u8) -> Option<Vec<u8>>,
{
    let reduction = |bytes: &[u8]| (1.0 - bytes.len() as f64 / original_len as f64) * 100.0;

    let out_100 = encode(100)?;
    if reduction(&out_100) > cap {
        return None;
    }

    let mut lo = floor_q;
    let mut hi = 100u8;
    let mut best = (100u8, out_100);

    for _ in 0..5 {
        if hi - lo <= 1 {
            break;
        }
        let mid = lo + (hi - lo) / 2;
        let Some(out_mid) = encode(mid) else {
            lo = mid;
            continue;
        };
        if reduction(&out_mid) > cap {
            lo = mid;
        } else {
            hi = mid;
            best = (mid, out_mid);
        }
    }

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_smaller_candidate() {
        let original = vec![0u8; 100];
        let result = finish(&original, vec![0u8; 60], Method::Oxipng, Format::Png);
        assert_eq!(result.optimized_size, 60);
        assert_eq!(result.method, Method::Oxipng);
        assert_eq!(result.reduction_percent, 40.0);
        assert!(result.success);
    }

    #[test]
    fn test_finish_equal_size_returns_original_with_none() {
        let original = vec![1u8; 50];
        let result = finish(&original, vec![2u8; 50], Method::Oxipng, Format::Png);
        assert_eq!(result.method, Method::None);
        assert_eq!(result.bytes, original);
        assert_eq!(result.reduction_percent, 0.0);
    }

    #[test]
    fn test_finish_larger_candidate_rejected() {
        let original = vec![0u8; 50];
        let result = finish(&original, vec![0u8; 80], Method::Mozjpeg, Format::Jpeg);
        assert_eq!(result.method, Method::None);
        assert_eq!(result.optimized_size, 50);
    }

    #[test]
    fn test_pick_smallest_prefers_lossless_on_tie() {
        let picked = pick_smallest(vec![
            (vec![0u8; 40], Method::PngquantOxipng),
            (vec![0u8; 40], Method::Oxipng),
        ])
        .unwrap();
        assert_eq!(picked.1, Method::Oxipng);
    }

    #[test]
    fn test_pick_smallest_by_size() {
        let picked = pick_smallest(vec![
            (vec![0u8; 40], Method::Oxipng),
            (vec![0u8; 30], Method::PngquantOxipng),
        ])
        .unwrap();
        assert_eq!(picked.1, Method::PngquantOxipng);
    }

    #[test]
    fn test_capped_search_finds_boundary_quality() {
        // Synthetic encoder: size grows linearly with quality, so
        // reduction shrinks as quality rises. cap=30% is first satisfied
        // at q=70 (size 700 of 1000).
        let encode = |q: u8| Some(vec![0u8; q as usize * 10]);
        let (q, out) = search_capped_quality(1000, 40, 30.0, encode).unwrap();
        let reduction = (1.0 - out.len() as f64 / 1000.0) * 100.0;
        assert!(reduction <= 30.0, "reduction {}", reduction);
        // Binary search with 5 iterations lands close to the exact
        // boundary (q=70) from above.
        assert!((70..=76).contains(&q), "quality {}", q);
    }

    #[test]
    fn test_capped_search_none_when_q100_violates() {
        // Even maximum quality compresses by 50%: cap unreachable.
        let encode = |_q: u8| Some(vec![0u8; 500]);
        assert!(search_capped_quality(1000, 40, 30.0, encode).is_none());
    }

    #[test]
    fn test_capped_search_bounded_iterations() {
        let mut calls = 0;
        let encode = |q: u8| {
            // Counted via closure state below.
            Some(vec![0u8; q as usize * 10])
        };
        let _ = search_capped_quality(1000, 1, 30.0, |q| {
            calls += 1;
            encode(q)
        });
        assert!(calls <= 6, "calls {}", calls); // q=100 probe + 5 bisections
    }

    #[test]
    fn test_optimize_image_unsupported_format() {
        let err = optimize_image(
            &[0x00, 0x01, 0x02, 0x03],
            &OptimizeConfig::default(),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert_eq!(err.code(), "unsupported_format");
    }
}
