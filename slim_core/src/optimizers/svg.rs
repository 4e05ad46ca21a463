//! SVG / SVGZ optimization.
//!
//! SVG:  input → sanitize → minify → output
//! SVGZ: input → gunzip → sanitize → minify → gzip (max compression)
//!
//! Sanitization is not optional; malformed XML fails the request rather
//! than passing scripts through.

use crate::config::OptimizeConfig;
use crate::errors::{Result, SlimError};
use crate::format_detect::Format;
use crate::results::OptimizeResult;
use crate::svg_analysis::gunzip_svg;
use crate::svg_min;
use crate::svg_sanitizer;
use crate::types::Method;
use std::io::Write;

use super::finish;

pub fn optimize(data: &[u8], _config: &OptimizeConfig) -> Result<OptimizeResult> {
    let is_svgz = data.starts_with(&[0x1F, 0x8B]);

    let svg_bytes = if is_svgz {
        gunzip_svg(data).ok_or_else(|| SlimError::MalformedSvg("bad gzip stream".to_string()))?
    } else {
        data.to_vec()
    };

    let sanitized = svg_sanitizer::sanitize(&svg_bytes)?;
    let minified = svg_min::minify(&sanitized)?;

    let (candidate, format) = if is_svgz {
        (gzip_max(&minified)?, Format::Svgz)
    } else {
        (minified, Format::Svg)
    };

    Ok(finish(data, candidate, Method::Svgmin, format))
}

fn gzip_max(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
