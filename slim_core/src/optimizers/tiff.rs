//! TIFF optimization — try deflate and LZW re-encodes, keep the
//! smallest.
//!
//! Re-encoding goes through a full decode; the encoder writes minimal
//! tags, so metadata does not survive regardless of `strip_metadata`
//! (pixel data is untouched either way).

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::results::OptimizeResult;
use crate::types::Method;
use std::io::Cursor;
use tiff::encoder::{colortype, compression, TiffEncoder};

use super::{finish, pick_smallest};

pub fn optimize(data: &[u8], _config: &OptimizeConfig) -> Result<OptimizeResult> {
    let Ok(img) = image::load_from_memory(data) else {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Tiff));
    };
    let rgb = img.to_rgb8();

    let mut candidates = Vec::new();
    if let Some(bytes) = encode_deflate(&rgb) {
        candidates.push((bytes, Method::TiffDeflate));
    }
    if let Some(bytes) = encode_lzw(&rgb) {
        candidates.push((bytes, Method::TiffLzw));
    }

    match pick_smallest(candidates) {
        Some((bytes, method)) => Ok(finish(data, bytes, method, Format::Tiff)),
        None => Ok(finish(data, data.to_vec(), Method::None, Format::Tiff)),
    }
}

fn encode_deflate(rgb: &image::RgbImage) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut buf).ok()?;
    encoder
        .write_image_with_compression::<colortype::RGB8, _>(
            rgb.width(),
            rgb.height(),
            compression::Deflate::default(),
            rgb.as_raw(),
        )
        .ok()?;
    Some(buf.into_inner())
}

fn encode_lzw(rgb: &image::RgbImage) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut buf).ok()?;
    encoder
        .write_image_with_compression::<colortype::RGB8, _>(
            rgb.width(),
            rgb.height(),
            compression::Lzw,
            rgb.as_raw(),
        )
        .ok()?;
    Some(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detect::detect;

    fn uncompressed_tiff() -> Vec<u8> {
        // Flat content stored uncompressed: both re-encodes should beat
        // it easily.
        let img = image::RgbImage::from_pixel(64, 64, image::Rgb([12, 200, 64]));
        let mut buf = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder
            .write_image::<colortype::RGB8>(64, 64, img.as_raw())
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_reencode_beats_uncompressed() {
        let data = uncompressed_tiff();
        let result = optimize(&data, &OptimizeConfig::default()).unwrap();
        assert!(matches!(
            result.method,
            Method::TiffDeflate | Method::TiffLzw
        ));
        assert!(result.optimized_size < result.original_size);
        assert_eq!(detect(&result.bytes).unwrap(), Format::Tiff);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_undecodable_tiff_returns_original() {
        let data = b"II\x2A\x00garbage after the magic".to_vec();
        let result = optimize(&data, &OptimizeConfig::default()).unwrap();
        assert_eq!(result.method, Method::None);
        assert_eq!(result.bytes, data);
    }
}
