//! Format-aware selective metadata stripping.
//!
//! Preserves what affects rendering (EXIF orientation, ICC profile) and
//! removes the rest (GPS, XMP, editorial text, comments, thumbnails).
//! Stripping never touches pixel data; on any parse problem the original
//! bytes come back unchanged.

use crate::format_detect::Format;
use crate::image_formats::png;
use std::io::Cursor;
use tracing::debug;

const ORIENTATION_TAG: u16 = 0x0112;

/// Strip non-essential metadata. Total: failure falls back to the input.
pub fn strip_metadata_selective(
    data: &[u8],
    format: Format,
    preserve_orientation: bool,
    preserve_icc: bool,
) -> Vec<u8> {
    match format {
        Format::Jpeg => strip_jpeg_metadata(data, preserve_orientation, preserve_icc),
        Format::Png | Format::Apng => strip_png_metadata(data, preserve_icc),
        Format::Tiff => strip_tiff_metadata(data),
        // WebP, GIF, SVG, BMP: their optimizers handle metadata inline.
        _ => data.to_vec(),
    }
}

/// PNG chunk filter: drop tEXt/iTXt/zTXt (and iCCP when not preserving
/// ICC), copy everything else byte-for-byte. A truncated trailing chunk
/// is copied verbatim rather than dropped.
pub fn strip_png_metadata(data: &[u8], preserve_icc: bool) -> Vec<u8> {
    let Some(iter) = png::ChunkIter::new(data) else {
        return data.to_vec();
    };

    let mut output = Vec::with_capacity(data.len());
    output.extend_from_slice(&png::SIGNATURE);

    let mut iter = iter;
    for chunk in iter.by_ref() {
        let drop = matches!(&chunk.chunk_type, b"tEXt" | b"iTXt" | b"zTXt")
            || (!preserve_icc && &chunk.chunk_type == b"iCCP");
        if !drop {
            output.extend_from_slice(chunk.raw);
        }
    }
    output.extend_from_slice(iter.trailing());

    output
}

/// JPEG segment filter: keep the structural segments and the entropy
/// stream, drop APPn/COM except APP0 (JFIF) and, when preserving, an
/// APP2 ICC profile. EXIF is replaced by a minimal APP1 holding only the
/// orientation tag.
pub fn strip_jpeg_metadata(data: &[u8], preserve_orientation: bool, preserve_icc: bool) -> Vec<u8> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return data.to_vec();
    }

    let orientation = if preserve_orientation {
        read_exif_orientation(data)
    } else {
        None
    };

    let mut output = Vec::with_capacity(data.len());
    output.extend_from_slice(&[0xFF, 0xD8]);
    if let Some(orientation) = orientation {
        let exif = build_orientation_exif(orientation);
        output.extend_from_slice(&[0xFF, 0xE1]);
        output.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
        output.extend_from_slice(&exif);
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            // Lost sync; keep the remainder untouched.
            output.extend_from_slice(&data[pos..]);
            return output;
        }
        let marker = data[pos + 1];

        // Standalone markers without a length field.
        if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            output.extend_from_slice(&data[pos..pos + 2]);
            pos += 2;
            continue;
        }
        if pos + 4 > data.len() {
            output.extend_from_slice(&data[pos..]);
            return output;
        }
        let length = ((data[pos + 2] as usize) << 8) | (data[pos + 3] as usize);
        let segment_end = (pos + 2 + length).min(data.len()).max(pos + 4);
        let payload = &data[(pos + 4).min(data.len())..segment_end.min(data.len())];

        let keep = match marker {
            0xE0 => true, // JFIF
            0xE2 => preserve_icc && payload.starts_with(b"ICC_PROFILE\0"),
            0xE1..=0xEF => false,
            0xFE => false, // COM
            _ => true,
        };
        if keep {
            output.extend_from_slice(&data[pos..segment_end]);
        } else {
            debug!(marker = format!("FF{:02X}", marker), bytes = length + 2, "Dropped JPEG segment");
        }
        pos = segment_end;

        // Everything from SOS onward is entropy-coded data; copy it
        // wholesale.
        if marker == 0xDA {
            output.extend_from_slice(&data[pos..]);
            return output;
        }
    }

    output
}

/// Read the EXIF orientation (tag 0x0112) from the first APP1 segment.
pub fn read_exif_orientation(data: &[u8]) -> Option<u16> {
    let mut pos = 2;
    while pos + 4 < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xDA {
            return None;
        }
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let length = ((data[pos + 2] as usize) << 8) | (data[pos + 3] as usize);
        let segment_end = (pos + 2 + length).min(data.len());
        if marker == 0xE1 && segment_end > pos + 4 {
            let payload = &data[pos + 4..segment_end];
            if let Some(tiff) = payload.strip_prefix(b"Exif\0\0") {
                return parse_tiff_orientation(tiff);
            }
        }
        pos = segment_end.max(pos + 2);
    }
    None
}

fn parse_tiff_orientation(tiff: &[u8]) -> Option<u16> {
    if tiff.len() < 14 {
        return None;
    }
    let little_endian = match &tiff[..2] {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    let read_u16 = |buf: &[u8], at: usize| -> Option<u16> {
        let bytes = [*buf.get(at)?, *buf.get(at + 1)?];
        Some(if little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    };
    let read_u32 = |buf: &[u8], at: usize| -> Option<u32> {
        let bytes = [
            *buf.get(at)?,
            *buf.get(at + 1)?,
            *buf.get(at + 2)?,
            *buf.get(at + 3)?,
        ];
        Some(if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    };

    if read_u16(tiff, 2)? != 42 {
        return None;
    }
    let ifd_offset = read_u32(tiff, 4)? as usize;
    let entry_count = read_u16(tiff, ifd_offset)? as usize;

    for i in 0..entry_count {
        let entry = ifd_offset + 2 + i * 12;
        if read_u16(tiff, entry)? == ORIENTATION_TAG {
            let value = read_u16(tiff, entry + 8)?;
            if (1..=8).contains(&value) {
                return Some(value);
            }
            return None;
        }
    }
    None
}

/// Minimal EXIF APP1 payload: TIFF header plus a single-entry IFD0
/// carrying only the orientation.
pub fn build_orientation_exif(orientation: u16) -> Vec<u8> {
    let mut exif = Vec::with_capacity(32);
    exif.extend_from_slice(b"Exif\0\0");
    exif.extend_from_slice(b"II");
    exif.extend_from_slice(&42u16.to_le_bytes());
    exif.extend_from_slice(&8u32.to_le_bytes()); // IFD0 offset
    exif.extend_from_slice(&1u16.to_le_bytes()); // entry count
    exif.extend_from_slice(&ORIENTATION_TAG.to_le_bytes());
    exif.extend_from_slice(&3u16.to_le_bytes()); // SHORT
    exif.extend_from_slice(&1u32.to_le_bytes()); // count
    exif.extend_from_slice(&orientation.to_le_bytes());
    exif.extend_from_slice(&0u16.to_le_bytes()); // value padding
    exif.extend_from_slice(&0u32.to_le_bytes()); // next IFD
    exif
}

/// TIFF: full decode, re-encode with minimal tags. The encoder writes no
/// EXIF, so everything non-pixel is dropped.
fn strip_tiff_metadata(data: &[u8]) -> Vec<u8> {
    let Ok(img) = image::load_from_memory(data) else {
        return data.to_vec();
    };
    let mut buf = Vec::new();
    if img
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Tiff)
        .is_err()
    {
        return data.to_vec();
    }
    buf
}
