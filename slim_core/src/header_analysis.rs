//! Header analysis: format-specific parsing plus cheap content probes.
//!
//! Produces one `HeaderInfo` per request. Formats whose headers alone
//! suffice (GIF, WebP, BMFF, JXL) are never pixel-decoded here; PNG,
//! JPEG, TIFF, and BMP decode only as far as the content probes need.

use crate::format_detect::Format;
use crate::image_formats::{bmff, bmp, gif, jxl, png, webp};
use crate::jpeg_analysis;
use crate::probes;
use crate::svg_analysis;
use crate::types::ProbeValue;
use serde::{Deserialize, Serialize};

/// Files below this keep a copy of the raw bytes on the record so
/// downstream probes can re-run against the whole file.
const RAW_DATA_LIMIT: usize = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKind {
    Rgb,
    Rgba,
    Palette,
    Grayscale,
    Cmyk,
}

/// Parsed image header information. Immutable once produced; created
/// once per request and consumed by a single predictor or optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub format: Format,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub color_type: Option<ColorKind>,
    pub bit_depth: Option<u8>,
    pub has_icc_profile: bool,
    pub has_exif: bool,
    /// PNG text chunks, SVG comments / editor metadata.
    pub has_metadata_chunks: bool,
    /// JPEG only.
    pub estimated_quality: Option<u8>,
    /// JPEG only.
    pub is_progressive: bool,
    /// PNG only.
    pub is_palette_mode: bool,
    /// PNG palette mode only.
    pub color_count: Option<usize>,
    pub unique_color_ratio: ProbeValue,
    pub flat_pixel_ratio: ProbeValue,
    pub png_quantize_ratio: ProbeValue,
    pub oxipng_probe_ratio: ProbeValue,
    pub png_pngquant_probe_ratio: ProbeValue,
    pub svg_bloat_ratio: ProbeValue,
    pub frame_count: u32,
    #[serde(skip)]
    pub raw_data: Option<Vec<u8>>,
}

impl HeaderInfo {
    fn new(format: Format, file_size: u64) -> Self {
        Self {
            format,
            file_size,
            width: 0,
            height: 0,
            color_type: None,
            bit_depth: None,
            has_icc_profile: false,
            has_exif: false,
            has_metadata_chunks: false,
            estimated_quality: None,
            is_progressive: false,
            is_palette_mode: false,
            color_count: None,
            unique_color_ratio: ProbeValue::Unmeasured,
            flat_pixel_ratio: ProbeValue::Unmeasured,
            png_quantize_ratio: ProbeValue::Unmeasured,
            oxipng_probe_ratio: ProbeValue::Unmeasured,
            png_pngquant_probe_ratio: ProbeValue::Unmeasured,
            svg_bloat_ratio: ProbeValue::Unmeasured,
            frame_count: 1,
            raw_data: None,
        }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the oxipng/pngquant probes measured the actual file
    /// rather than a crop.
    pub fn whole_file_probes(&self) -> bool {
        (self.file_size as usize) < probes::WHOLE_FILE_PROBE_LIMIT
    }
}

/// Extract header information for a detected format. Total: any input
/// that `detect` accepted yields a record, with fields left at their
/// defaults when parsing fails partway.
pub fn analyze(data: &[u8], format: Format) -> HeaderInfo {
    let mut info = HeaderInfo::new(format, data.len() as u64);
    if data.len() < RAW_DATA_LIMIT {
        info.raw_data = Some(data.to_vec());
    }

    match format {
        Format::Svg | Format::Svgz => analyze_svg(data, &mut info),
        Format::Png | Format::Apng => analyze_png(data, &mut info),
        Format::Jpeg => analyze_jpeg(data, &mut info),
        Format::Gif => analyze_gif(data, &mut info),
        Format::Webp => analyze_webp(data, &mut info),
        Format::Avif | Format::Heic => analyze_bmff(data, &mut info),
        Format::Jxl => analyze_jxl(data, &mut info),
        Format::Tiff | Format::Bmp => analyze_raster(data, &mut info),
    }

    info
}

fn analyze_svg(data: &[u8], info: &mut HeaderInfo) {
    let text_bytes = if info.format == Format::Svgz {
        match svg_analysis::gunzip_svg(data) {
            Some(bytes) => bytes,
            None => return,
        }
    } else {
        data.to_vec()
    };
    let text = String::from_utf8_lossy(&text_bytes);
    let analysis = svg_analysis::analyze(&text);
    info.width = analysis.width;
    info.height = analysis.height;
    info.has_metadata_chunks = analysis.has_metadata;
    info.svg_bloat_ratio = ProbeValue::from_option(analysis.bloat_ratio);
}

fn analyze_png(data: &[u8], info: &mut HeaderInfo) {
    let Some((width, height, bit_depth, color_type)) = png::ihdr(data) else {
        return;
    };
    info.width = width;
    info.height = height;
    info.bit_depth = Some(bit_depth);
    info.color_type = Some(match color_type {
        0 | 4 => ColorKind::Grayscale,
        3 => ColorKind::Palette,
        6 => ColorKind::Rgba,
        _ => ColorKind::Rgb,
    });
    info.is_palette_mode = color_type == 3;
    info.has_metadata_chunks = png::has_text_chunks(data);
    if let Some(iter) = png::ChunkIter::new(data) {
        for chunk in iter {
            match &chunk.chunk_type {
                b"iCCP" => info.has_icc_profile = true,
                b"eXIf" => info.has_exif = true,
                b"acTL" => {
                    if chunk.data.len() >= 4 {
                        let frames = u32::from_be_bytes([
                            chunk.data[0],
                            chunk.data[1],
                            chunk.data[2],
                            chunk.data[3],
                        ]);
                        info.frame_count = frames.max(1);
                    }
                }
                b"IDAT" => break,
                _ => {}
            }
        }
    }

    if info.is_palette_mode {
        info.color_count = png::palette_color_count(data);
        // Small palette PNGs still get the exact lossless measurement.
        if info.whole_file_probes() {
            info.oxipng_probe_ratio = ProbeValue::from_option(probes::oxipng_probe_whole(data));
        }
    } else {
        png_content_probes(data, info);
    }
}

/// Content probes for non-palette PNGs: color ratio, flatness, quantize
/// and re-compression measurements. Any individual failure is recorded
/// as `Failed` and the rest continue.
fn png_content_probes(data: &[u8], info: &mut HeaderInfo) {
    if info.whole_file_probes() {
        info.oxipng_probe_ratio = ProbeValue::from_option(probes::oxipng_probe_whole(data));
    }

    let Ok(img) = image::load_from_memory(data) else {
        // Probes were attempted but the decode failed; mark the
        // pixel-dependent ones accordingly.
        info.flat_pixel_ratio = ProbeValue::Failed;
        info.unique_color_ratio = ProbeValue::Failed;
        info.png_quantize_ratio = ProbeValue::Failed;
        return;
    };

    if let Some(crop) = probes::center_crop(&img) {
        info.flat_pixel_ratio = ProbeValue::Value(probes::flat_pixel_ratio(&crop));
        if !info.oxipng_probe_ratio.is_measured() {
            info.oxipng_probe_ratio = ProbeValue::from_option(probes::oxipng_probe_crop(&crop));
        }
    }

    if info.whole_file_probes() && info.pixels() < probes::PNGQUANT_PROBE_PIXEL_LIMIT {
        info.png_pngquant_probe_ratio = ProbeValue::from_option(probes::pngquant_probe(data));
    }

    let thumb = probes::thumbnail(&img);
    info.unique_color_ratio = ProbeValue::Value(probes::unique_color_ratio(&thumb));
    info.png_quantize_ratio = ProbeValue::from_option(probes::quantize_probe(&thumb));
}

fn analyze_jpeg(data: &[u8], info: &mut HeaderInfo) {
    let header = jpeg_analysis::analyze(data);
    info.width = header.width;
    info.height = header.height;
    info.estimated_quality = header.estimated_quality;
    info.is_progressive = header.is_progressive;
    info.has_exif = header.has_exif;
    info.has_icc_profile = header.has_icc_profile;
    info.bit_depth = Some(8);
    info.color_type = Some(match header.component_count {
        1 => ColorKind::Grayscale,
        4 => ColorKind::Cmyk,
        _ => ColorKind::Rgb,
    });

    crop_flatness_probe(data, info);
}

fn analyze_gif(data: &[u8], info: &mut HeaderInfo) {
    if let Some((w, h)) = gif::dimensions(data) {
        info.width = w;
        info.height = h;
    }
    info.frame_count = gif::frame_count(data).max(1);
    info.color_type = Some(ColorKind::Palette);
    info.bit_depth = Some(8);
}

fn analyze_webp(data: &[u8], info: &mut HeaderInfo) {
    if let Some((w, h)) = webp::dimensions(data) {
        info.width = w;
        info.height = h;
    }
    info.frame_count = if webp::is_animated(data) {
        webp::frame_count(data)
    } else {
        1
    };
    info.has_icc_profile = data.windows(4).any(|w| w == b"ICCP");
    info.has_exif = data.windows(4).any(|w| w == b"EXIF");
    info.bit_depth = Some(8);
    info.color_type = Some(ColorKind::Rgb);
}

fn analyze_bmff(data: &[u8], info: &mut HeaderInfo) {
    if let Some((w, h)) = bmff::dimensions(data) {
        info.width = w;
        info.height = h;
    }
    info.has_icc_profile = bmff::has_icc_profile(data);
    info.has_exif = bmff::has_exif(data);
    info.bit_depth = Some(8);
}

fn analyze_jxl(data: &[u8], info: &mut HeaderInfo) {
    let codestream: &[u8] = if jxl::is_container(data) {
        // The jxlc box carries the codestream inside the container.
        match find_jxlc(data) {
            Some(cs) => cs,
            None => return,
        }
    } else {
        data
    };
    if let Some((w, h)) = jxl_codestream_dimensions(codestream) {
        info.width = w;
        info.height = h;
    }
    info.bit_depth = Some(8);
}

fn find_jxlc(data: &[u8]) -> Option<&[u8]> {
    let mut offset = 0usize;
    while offset + 8 <= data.len() {
        let size = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        if size < 8 {
            return None;
        }
        let end = (offset + size).min(data.len());
        if &data[offset + 4..offset + 8] == b"jxlc" {
            return Some(&data[offset + 8..end]);
        }
        offset = end;
    }
    None
}

/// Decode the JXL SizeHeader that immediately follows the `FF 0A`
/// signature. Bits are read LSB-first within each byte.
fn jxl_codestream_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[..2] != jxl::CODESTREAM_SIG {
        return None;
    }
    let mut reader = BitReader::new(&data[2..]);

    let small = reader.read(1)?;
    let height;
    let width;
    if small == 1 {
        height = (reader.read(5)? + 1) * 8;
        width = jxl_read_xsize(&mut reader, height, true)?;
    } else {
        height = jxl_read_size(&mut reader)?;
        width = jxl_read_xsize(&mut reader, height, false)?;
    }
    Some((width, height))
}

fn jxl_read_size(reader: &mut BitReader) -> Option<u32> {
    let selector = reader.read(2)?;
    let bits = [9, 13, 18, 30][selector as usize];
    Some(reader.read(bits)? + 1)
}

fn jxl_read_xsize(reader: &mut BitReader, ysize: u32, small: bool) -> Option<u32> {
    let ratio = reader.read(3)?;
    match ratio {
        0 => {
            if small {
                Some((reader.read(5)? + 1) * 8)
            } else {
                jxl_read_size(reader)
            }
        }
        1 => Some(ysize),
        2 => Some((ysize as u64 * 12 / 10) as u32),
        3 => Some((ysize as u64 * 4 / 3) as u32),
        4 => Some((ysize as u64 * 3 / 2) as u32),
        5 => Some((ysize as u64 * 16 / 9) as u32),
        6 => Some((ysize as u64 * 5 / 4) as u32),
        _ => Some(ysize * 2),
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read(&mut self, bits: usize) -> Option<u32> {
        let mut value = 0u32;
        for i in 0..bits {
            let byte = self.data.get(self.bit_pos / 8)?;
            let bit = (byte >> (self.bit_pos % 8)) & 1;
            value |= (bit as u32) << i;
            self.bit_pos += 1;
        }
        Some(value)
    }
}

fn analyze_raster(data: &[u8], info: &mut HeaderInfo) {
    if info.format == Format::Bmp {
        if let Some((w, h, bpp)) = bmp::header(data) {
            info.width = w;
            info.height = h;
            info.bit_depth = Some(8);
            info.color_type = Some(match bpp {
                32 => ColorKind::Rgba,
                8 => ColorKind::Palette,
                _ => ColorKind::Rgb,
            });
        }
    }

    // TIFF dimensions and color need a header decode; the image crate
    // reads IFDs lazily.
    if info.format == Format::Tiff {
        if let Ok(img) = image::load_from_memory(data) {
            info.width = img.width();
            info.height = img.height();
            info.color_type = Some(match img.color() {
                image::ColorType::L8 | image::ColorType::L16 => ColorKind::Grayscale,
                image::ColorType::La8 | image::ColorType::La16 => ColorKind::Grayscale,
                image::ColorType::Rgba8 | image::ColorType::Rgba16 => ColorKind::Rgba,
                _ => ColorKind::Rgb,
            });
            info.bit_depth = Some(match img.color() {
                image::ColorType::L16 | image::ColorType::La16 => 16,
                image::ColorType::Rgb16 | image::ColorType::Rgba16 => 16,
                _ => 8,
            });
        }
    }

    crop_flatness_probe(data, info);
}

/// Flat-pixel ratio from a central crop, for content classification of
/// formats where the predictor wants it (JPEG, TIFF, BMP).
fn crop_flatness_probe(data: &[u8], info: &mut HeaderInfo) {
    match image::load_from_memory(data) {
        Ok(img) => {
            if let Some(crop) = probes::center_crop(&img) {
                info.flat_pixel_ratio = ProbeValue::Value(probes::flat_pixel_ratio(&crop));
            }
        }
        Err(_) => info.flat_pixel_ratio = ProbeValue::Failed,
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// analyze() is total on arbitrary bytes for every format tag and
        /// always records the exact input length.
        #[test]
        fn prop_analyze_total(
            data in proptest::collection::vec(any::<u8>(), 0..1024),
            fmt_idx in 0usize..12
        ) {
            let formats = [
                Format::Png, Format::Apng, Format::Jpeg, Format::Webp,
                Format::Gif, Format::Svg, Format::Svgz, Format::Avif,
                Format::Heic, Format::Tiff, Format::Bmp, Format::Jxl,
            ];
            let info = analyze(&data, formats[fmt_idx]);
            prop_assert_eq!(info.file_size, data.len() as u64);
            prop_assert!(info.frame_count >= 1);
        }
    }
}
