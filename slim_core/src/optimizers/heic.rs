//! HEIC optimization — lossless metadata strip and lossy re-encode in
//! parallel, smallest result wins.
//!
//! The re-encode targets `clamp(quality + 10, 30, 95)`: one step softer
//! than the caller's target because HEVC at equal numeric quality is
//! visually harsher than JPEG. ICC profiles ride through the codec
//! wrappers.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::heif_codec;
use crate::results::OptimizeResult;
use crate::types::Method;
use libheif_rs::CompressionFormat;

use super::{finish, pick_smallest};

pub fn optimize(data: &[u8], config: &OptimizeConfig) -> Result<OptimizeResult> {
    let target = heif_codec::reencode_quality(config.quality.value());

    // Decoded images hold codec-owned buffers and cannot cross threads;
    // each candidate decodes its own copy from the input bytes.
    let (stripped, reencoded) = std::thread::scope(|scope| {
        let strip_task = scope.spawn(|| {
            if !config.strip_metadata {
                return None;
            }
            heif_codec::decode(data)
                .and_then(|image| heif_codec::encode(&image, CompressionFormat::Hevc, None))
        });
        let reencode_task = scope.spawn(|| {
            heif_codec::decode(data)
                .and_then(|image| heif_codec::encode(&image, CompressionFormat::Hevc, Some(target)))
        });
        (
            strip_task.join().expect("heic strip candidate panicked"),
            reencode_task.join().expect("heic re-encode candidate panicked"),
        )
    });

    let mut candidates = Vec::new();
    if let Some(bytes) = stripped {
        candidates.push((bytes, Method::MetadataStrip));
    }
    if let Some(bytes) = reencoded {
        candidates.push((bytes, Method::HeicReencode));
    }

    match pick_smallest(candidates) {
        Some((bytes, method)) => Ok(finish(data, bytes, method, Format::Heic)),
        None => Ok(finish(data, data.to_vec(), Method::None, Format::Heic)),
    }
}
