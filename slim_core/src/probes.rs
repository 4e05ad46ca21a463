//! Content probes for header analysis.
//!
//! Cheap measurements that let predictors reason about lossy-vs-lossless
//! savings without running the full optimizer. Every probe is
//! best-effort: failures return `None` at this layer and are recorded as
//! `ProbeValue::Failed` by the analyzer.

use crate::tool_runner::{is_tool_available, run_tool};
use image::{DynamicImage, GenericImageView, RgbImage};
use std::io::Cursor;
use std::time::Duration;

/// L1 color distance below which an adjacent pixel pair counts as flat.
const FLAT_THRESHOLD: u32 = 24;

/// Probe geometry: crops and thumbnails are at most this many pixels on
/// a side.
pub const PROBE_EDGE: u32 = 64;

/// Files below this run whole-file re-compression probes instead of
/// crop-sampled ones.
pub const WHOLE_FILE_PROBE_LIMIT: usize = 50_000;

/// pngquant whole-file probe additionally requires fewer pixels than
/// this.
pub const PNGQUANT_PROBE_PIXEL_LIMIT: u64 = 250_000;

/// Central crop at original resolution, used for pixel-level metrics.
/// Returns None when the image is too small for a meaningful sample.
pub fn center_crop(img: &DynamicImage) -> Option<RgbImage> {
    let (w, h) = img.dimensions();
    let crop_size = PROBE_EDGE.min(w).min(h);
    if crop_size < 8 {
        return None;
    }
    let x = (w / 2).saturating_sub(crop_size / 2);
    let y = (h / 2).saturating_sub(crop_size / 2);
    Some(img.crop_imm(x, y, crop_size, crop_size).to_rgb8())
}

/// Downscaled thumbnail for color statistics.
pub fn thumbnail(img: &DynamicImage) -> RgbImage {
    img.thumbnail(PROBE_EDGE, PROBE_EDGE).to_rgb8()
}

/// Fraction of adjacent pixel pairs (horizontal and vertical) whose L1
/// color distance is below the flat threshold.
///
/// Solid fills approach 1.0; photographic noise sits below 0.5. The
/// measure separates screenshot-like content from photos.
pub fn flat_pixel_ratio(rgb: &RgbImage) -> f64 {
    let (w, h) = rgb.dimensions();
    if w < 2 || h < 2 {
        return 0.0;
    }

    let mut flat = 0u64;
    let mut total = 0u64;

    for y in 0..h {
        for x in 0..w - 1 {
            if pair_is_flat(rgb.get_pixel(x, y).0, rgb.get_pixel(x + 1, y).0) {
                flat += 1;
            }
            total += 1;
        }
    }
    for y in 0..h - 1 {
        for x in 0..w {
            if pair_is_flat(rgb.get_pixel(x, y).0, rgb.get_pixel(x, y + 1).0) {
                flat += 1;
            }
            total += 1;
        }
    }

    flat as f64 / total as f64
}

fn pair_is_flat(a: [u8; 3], b: [u8; 3]) -> bool {
    let dist = a[0].abs_diff(b[0]) as u32 + a[1].abs_diff(b[1]) as u32 + a[2].abs_diff(b[2]) as u32;
    dist < FLAT_THRESHOLD
}

/// Unique RGB triples divided by pixel count, on a thumbnail. Low for
/// flat graphics, high for photos.
pub fn unique_color_ratio(rgb: &RgbImage) -> f64 {
    let total = (rgb.width() * rgb.height()) as usize;
    if total == 0 {
        return 0.0;
    }
    let mut colors: Vec<u32> = rgb
        .pixels()
        .map(|p| ((p.0[0] as u32) << 16) | ((p.0[1] as u32) << 8) | p.0[2] as u32)
        .collect();
    colors.sort_unstable();
    colors.dedup();
    colors.len() as f64 / total as f64
}

/// Quantize the thumbnail to 256 colors and compare indexed-PNG size to
/// truecolor-PNG size. Low ratios mean palette-friendly content.
pub fn quantize_probe(rgb: &RgbImage) -> Option<f64> {
    let baseline = encode_png_rgb(rgb)?;
    if baseline.is_empty() {
        return None;
    }

    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let pixels: Vec<rgb::RGBA<u8>> = rgb
        .pixels()
        .map(|p| rgb::RGBA::new(p.0[0], p.0[1], p.0[2], 255))
        .collect();

    let mut attr = imagequant::Attributes::new();
    attr.set_max_colors(256).ok()?;
    let mut liq_image = attr.new_image(pixels, w, h, 0.0).ok()?;
    let mut quantized = attr.quantize(&mut liq_image).ok()?;
    let (palette, indices) = quantized.remapped(&mut liq_image).ok()?;

    let indexed = encode_png_indexed(w as u32, h as u32, &palette, &indices)?;
    Some(indexed.len() as f64 / baseline.len() as f64)
}

/// Lossless re-compression probe on the whole file: exact measurement of
/// `optimized / original`.
pub fn oxipng_probe_whole(data: &[u8]) -> Option<f64> {
    let options = oxipng::Options::from_preset(2);
    let optimized = oxipng::optimize_from_memory(data, &options).ok()?;
    if data.is_empty() {
        return None;
    }
    Some(optimized.len() as f64 / data.len() as f64)
}

/// Lossless re-compression probe on the central crop. A coarse content
/// signal only; crop ratios do not scale linearly to whole-file ratios.
pub fn oxipng_probe_crop(rgb_crop: &RgbImage) -> Option<f64> {
    let baseline = encode_png_rgb(rgb_crop)?;
    if baseline.is_empty() {
        return None;
    }
    let options = oxipng::Options::from_preset(2);
    let optimized = oxipng::optimize_from_memory(&baseline, &options).ok()?;
    Some(optimized.len() as f64 / baseline.len() as f64)
}

/// Lossy proxy probe: pngquant (permissive quality, so it only fails on
/// unquantizable input) then lossless re-compression, on the whole file.
/// The single strongest predictor of the lossy path when available.
pub fn pngquant_probe(data: &[u8]) -> Option<f64> {
    if data.is_empty() || !is_tool_available("pngquant") {
        return None;
    }
    let output = run_tool(
        &["pngquant", "--quality", "0-100", "-", "--output", "-"],
        data,
        Duration::from_secs(5),
        &[],
    )
    .ok()?;

    let options = oxipng::Options::from_preset(2);
    let optimized = oxipng::optimize_from_memory(&output.stdout, &options).ok()?;
    Some(optimized.len() as f64 / data.len() as f64)
}

pub fn encode_png_rgb(rgb: &RgbImage) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(rgb.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

fn encode_png_indexed(
    width: u32,
    height: u32,
    palette: &[rgb::RGBA<u8>],
    indices: &[u8],
) -> Option<Vec<u8>> {
    if palette.is_empty() || palette.len() > 256 {
        return None;
    }
    let mut palette_bytes = Vec::with_capacity(palette.len() * 3);
    let mut alpha_bytes = Vec::with_capacity(palette.len());
    for color in palette {
        palette_bytes.extend([color.r, color.g, color.b]);
        alpha_bytes.push(color.a);
    }
    while matches!(alpha_bytes.last(), Some(&255)) {
        alpha_bytes.pop();
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette_bytes);
        if !alpha_bytes.is_empty() {
            encoder.set_trns(alpha_bytes);
        }
        encoder.set_compression(png::Compression::Best);
        let mut writer = encoder.write_header().ok()?;
        writer.write_image_data(indices).ok()?;
        writer.finish().ok()?;
    }
    Some(out)
}
