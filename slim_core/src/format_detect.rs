//! Format detection from magic bytes.
//!
//! Pure analysis layer: classification never trusts file extensions or
//! caller-provided MIME types, only the bytes themselves.

use crate::errors::{Result, SlimError};
use crate::image_formats::{jxl, png};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Png,
    Apng,
    Jpeg,
    Webp,
    Gif,
    Svg,
    Svgz,
    Avif,
    Heic,
    Tiff,
    Bmp,
    Jxl,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Apng => "apng",
            Format::Jpeg => "jpeg",
            Format::Webp => "webp",
            Format::Gif => "gif",
            Format::Svg => "svg",
            Format::Svgz => "svgz",
            Format::Avif => "avif",
            Format::Heic => "heic",
            Format::Tiff => "tiff",
            Format::Bmp => "bmp",
            Format::Jxl => "jxl",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Png => "image/png",
            Format::Apng => "image/apng",
            Format::Jpeg => "image/jpeg",
            Format::Webp => "image/webp",
            Format::Gif => "image/gif",
            Format::Svg | Format::Svgz => "image/svg+xml",
            Format::Avif => "image/avif",
            Format::Heic => "image/heic",
            Format::Tiff => "image/tiff",
            Format::Bmp => "image/bmp",
            Format::Jxl => "image/jxl",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect image format from magic bytes.
///
/// Rules are evaluated in order; the first match wins. JXL's bare
/// codestream signature `FF 0A` must be checked before JPEG's `FF D8 FF`.
pub fn detect(data: &[u8]) -> Result<Format> {
    if data.len() < 4 {
        return Err(SlimError::UnsupportedFormat(
            "file too small to identify format".to_string(),
        ));
    }

    if jxl::is_codestream(data) {
        return Ok(Format::Jxl);
    }

    if jxl::is_container(data) {
        return Ok(Format::Jxl);
    }

    if data.len() >= 8 && data[..8] == png::SIGNATURE {
        if png::is_apng(data) {
            return Ok(Format::Apng);
        }
        return Ok(Format::Png);
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok(Format::Jpeg);
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Ok(Format::Gif);
    }

    if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
        return Ok(Format::Webp);
    }

    if data.starts_with(b"BM") {
        return Ok(Format::Bmp);
    }

    if data.starts_with(b"II\x2A\x00") || data.starts_with(b"MM\x00\x2A") {
        return Ok(Format::Tiff);
    }

    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return detect_isobmff(data);
    }

    if data.starts_with(&[0x1F, 0x8B]) {
        if let Some(payload) = gunzip_prefix(data) {
            if is_svg_content(&payload) {
                return Ok(Format::Svgz);
            }
        }
    }

    if is_svg_content(data) {
        return Ok(Format::Svg);
    }

    Err(SlimError::UnsupportedFormat(format!(
        "unrecognized file format (leading bytes: {})",
        hex_prefix(data, 16)
    )))
}

fn brand_to_format(brand: &[u8]) -> Option<Format> {
    match brand {
        b"jxl " => Some(Format::Jxl),
        b"avif" | b"avis" => Some(Format::Avif),
        b"heic" | b"heix" | b"mif1" => Some(Format::Heic),
        _ => None,
    }
}

/// AVIF / HEIC / JXL from the ISO-BMFF ftyp box: major brand first, then
/// the compatible-brands list.
fn detect_isobmff(data: &[u8]) -> Result<Format> {
    let major_brand = &data[8..12];
    if let Some(fmt) = brand_to_format(major_brand) {
        return Ok(fmt);
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let box_end = box_size.min(data.len());
    let mut offset = 16; // size + "ftyp" + major brand + minor version

    while offset + 4 <= box_end {
        if let Some(fmt) = brand_to_format(&data[offset..offset + 4]) {
            return Ok(fmt);
        }
        offset += 4;
    }

    Err(SlimError::UnsupportedFormat(format!(
        "ISO-BMFF file with unrecognized brand: {}",
        String::from_utf8_lossy(major_brand)
    )))
}

/// Decompress enough of a gzip stream to sniff the payload. Bad streams
/// return None rather than erroring; the outer rules continue.
fn gunzip_prefix(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut payload = vec![0u8; 512];
    match decoder.read(&mut payload) {
        Ok(n) if n > 0 => {
            payload.truncate(n);
            Some(payload)
        }
        _ => None,
    }
}

/// SVG sniff after stripping a UTF-8 BOM and leading whitespace.
pub fn is_svg_content(data: &[u8]) -> bool {
    let text = data.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(data);
    let stripped: &[u8] = match text.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(pos) => &text[pos..],
        None => return false,
    };
    let head = &stripped[..stripped.len().min(256)];
    let lower: Vec<u8> = head.iter().map(|b| b.to_ascii_lowercase()).collect();
    lower.starts_with(b"<?xml") || lower.starts_with(b"<svg")
}

fn hex_prefix(data: &[u8], n: usize) -> String {
    data.iter()
        .take(n)
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_jxl_codestream_before_jpeg() {
        // FF 0A must hit the JXL rule, not fall through as a JPEG prefix.
        assert_eq!(detect(&[0xFF, 0x0A, 0x00, 0x00]).unwrap(), Format::Jxl);
    }

    #[test]
    fn test_detect_jxl_container() {
        let mut data = crate::image_formats::jxl::CONTAINER_SIG.to_vec();
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(detect(&data).unwrap(), Format::Jxl);
    }

    #[test]
    fn test_detect_png() {
        let mut data = crate::image_formats::png::SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 24]);
        assert_eq!(detect(&data).unwrap(), Format::Png);
    }

    #[test]
    fn test_detect_apng() {
        let mut data = crate::image_formats::png::SIGNATURE.to_vec();
        // acTL chunk before IDAT
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(b"acTL");
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"IDAT");
        data.extend_from_slice(&[0u8; 5]);
        assert_eq!(detect(&data).unwrap(), Format::Apng);
    }

    #[test]
    fn test_detect_jpeg() {
        assert_eq!(detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).unwrap(), Format::Jpeg);
    }

    #[test]
    fn test_detect_gif_both_versions() {
        assert_eq!(detect(b"GIF87a\x01\x00").unwrap(), Format::Gif);
        assert_eq!(detect(b"GIF89a\x01\x00").unwrap(), Format::Gif);
    }

    #[test]
    fn test_detect_webp() {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"WEBP");
        assert_eq!(detect(&data).unwrap(), Format::Webp);
    }

    #[test]
    fn test_detect_bmp() {
        assert_eq!(detect(b"BM\x00\x00\x00\x00").unwrap(), Format::Bmp);
    }

    #[test]
    fn test_detect_tiff_both_endians() {
        assert_eq!(detect(b"II\x2A\x00\x00\x00").unwrap(), Format::Tiff);
        assert_eq!(detect(b"MM\x00\x2A\x00\x00").unwrap(), Format::Tiff);
    }

    #[test]
    fn test_detect_avif_major_brand() {
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"ftypavif");
        data.extend_from_slice(&[0u8; 4]);
        assert_eq!(detect(&data).unwrap(), Format::Avif);
    }

    #[test]
    fn test_detect_heic_brands() {
        for brand in [b"heic", b"heix", b"mif1"] {
            let mut data = Vec::new();
            data.extend_from_slice(&16u32.to_be_bytes());
            data.extend_from_slice(b"ftyp");
            data.extend_from_slice(brand);
            data.extend_from_slice(&[0u8; 4]);
            assert_eq!(detect(&data).unwrap(), Format::Heic, "brand {:?}", brand);
        }
    }

    #[test]
    fn test_detect_brand_from_compatible_list() {
        let mut data = Vec::new();
        data.extend_from_slice(&24u32.to_be_bytes());
        data.extend_from_slice(b"ftypXXXX"); // unknown major brand
        data.extend_from_slice(&[0u8; 4]); // minor version
        data.extend_from_slice(b"mif1"); // compatible brand
        data.extend_from_slice(b"avif");
        assert_eq!(detect(&data).unwrap(), Format::Heic);
    }

    #[test]
    fn test_detect_unknown_brand_is_unsupported() {
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"ftypmp42");
        data.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            detect(&data),
            Err(SlimError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_svg_plain_and_with_bom() {
        assert_eq!(detect(b"<svg xmlns=\"x\"/>").unwrap(), Format::Svg);
        assert_eq!(
            detect(b"<?xml version=\"1.0\"?><svg/>").unwrap(),
            Format::Svg
        );
        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"  \n<svg/>");
        assert_eq!(detect(&bom).unwrap(), Format::Svg);
    }

    #[test]
    fn test_detect_svgz() {
        let data = gzip(b"<?xml version=\"1.0\"?><svg></svg>");
        assert_eq!(detect(&data).unwrap(), Format::Svgz);
    }

    #[test]
    fn test_gzip_of_non_svg_is_unsupported() {
        let data = gzip(b"just some text payload, definitely not markup");
        assert!(detect(&data).is_err());
    }

    #[test]
    fn test_detect_too_small() {
        assert!(matches!(
            detect(&[0xFF, 0xD8]),
            Err(SlimError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_garbage() {
        assert!(detect(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]).is_err());
    }
}
