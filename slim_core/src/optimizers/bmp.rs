//! BMP optimization — 32-bit images with a fully opaque alpha channel
//! are down-converted to 24-bit RGB and re-encoded.

use crate::config::OptimizeConfig;
use crate::errors::Result;
use crate::format_detect::Format;
use crate::results::OptimizeResult;
use crate::types::Method;
use std::io::Cursor;

use super::finish;

pub fn optimize(data: &[u8], _config: &OptimizeConfig) -> Result<OptimizeResult> {
    let Ok(img) = image::load_from_memory(data) else {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Bmp));
    };

    let flattened = match &img {
        image::DynamicImage::ImageRgba8(rgba) => {
            if rgba.pixels().all(|p| p.0[3] == 255) {
                image::DynamicImage::ImageRgb8(img.to_rgb8())
            } else {
                // Real transparency: keep the alpha channel.
                img
            }
        }
        _ => img,
    };

    let mut buf = Vec::new();
    if flattened
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
        .is_err()
    {
        return Ok(finish(data, data.to_vec(), Method::None, Format::Bmp));
    }

    Ok(finish(data, buf, Method::Bmp, Format::Bmp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detect::detect;

    fn bmp_rgba_opaque() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(32, 32, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
            .unwrap();
        buf
    }

    #[test]
    fn test_opaque_32bit_downconverts() {
        let data = bmp_rgba_opaque();
        let result = optimize(&data, &OptimizeConfig::default()).unwrap();
        assert!(result.optimized_size < result.original_size);
        assert_eq!(result.method, Method::Bmp);
        assert_eq!(detect(&result.bytes).unwrap(), Format::Bmp);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
        // Pixel values survive the down-conversion.
        let rgb = decoded.to_rgb8();
        assert_eq!(rgb.get_pixel(5, 5).0, [10, 20, 30]);
    }

    #[test]
    fn test_undecodable_bmp_returns_original() {
        let data = b"BM broken header".to_vec();
        let result = optimize(&data, &OptimizeConfig::default()).unwrap();
        assert_eq!(result.method, Method::None);
        assert_eq!(result.bytes, data);
    }
}
