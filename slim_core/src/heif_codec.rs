//! libheif decode/encode wrappers shared by the AVIF and HEIC
//! optimizers.

use libheif_rs::{
    ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
};
use tracing::debug;

/// Decode the primary image of an AVIF/HEIC payload to interleaved RGB.
/// The source ICC profile is re-attached to the pixel buffer so a later
/// encode carries it through.
pub fn decode(data: &[u8]) -> Option<Image> {
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).ok()?;
    let handle = ctx.primary_image_handle().ok()?;
    let icc_profile = handle.color_profile_raw();
    let mut image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .ok()?;
    if let Some(ref profile) = icc_profile {
        if let Err(e) = image.set_color_profile_raw(profile) {
            debug!(error = %e, "could not carry ICC profile through decode");
        }
    }
    Some(image)
}

/// Encode to AVIF (AV1) or HEIC (HEVC). `quality: None` selects the
/// encoder's lossless mode. Any failure drops the candidate.
pub fn encode(image: &Image, format: CompressionFormat, quality: Option<u8>) -> Option<Vec<u8>> {
    let lib_heif = LibHeif::new();
    let mut ctx = HeifContext::new().ok()?;
    let mut encoder = lib_heif.encoder_for_format(format).ok()?;
    let encoder_quality = match quality {
        Some(q) => EncoderQuality::Lossy(q),
        None => EncoderQuality::LossLess,
    };
    if let Err(e) = encoder.set_quality(encoder_quality) {
        debug!(error = %e, "heif encoder rejected quality setting");
        return None;
    }

    ctx.encode_image(image, &mut encoder, None).ok()?;
    ctx.write_to_bytes().ok()
}

/// Quality mapping for modern-format re-encodes: conservative by one
/// step relative to the caller's target, clamped to the useful range.
pub fn reencode_quality(target: u8) -> u8 {
    (target.saturating_add(10)).clamp(30, 95)
}
