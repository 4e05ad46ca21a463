//! AVIF optimization — lossless metadata strip only.
//!
//! AVIF is already lossy; every decode/re-encode cycle at a quality
//! setting compounds generation loss, so the only candidate produced
//! here is a lossless re-save without metadata. The candidate is kept
//! only when it is strictly smaller than the input.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::heif_codec;
use crate::results::OptimizeResult;
use crate::types::Method;
use libheif_rs::CompressionFormat;

use super::finish;

pub fn optimize(data: &[u8], config: &OptimizeConfig) -> Result<OptimizeResult> {
    if !config.strip_metadata {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Avif));
    }

    let candidate = heif_codec::decode(data)
        .and_then(|image| heif_codec::encode(&image, CompressionFormat::Av1, None));

    match candidate {
        Some(stripped) => Ok(finish(data, stripped, Method::MetadataStrip, Format::Avif)),
        None => Ok(finish(data, data.to_vec(), Method::None, Format::Avif)),
    }
}
