//! Method tags for optimization results and predictions.
//!
//! Optimizers and predictors must agree on spelling, so the tag is a
//! closed enum with a stable string form rather than free text.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// No candidate beat the input; original bytes returned.
    None,
    Oxipng,
    #[serde(rename = "pngquant + oxipng")]
    PngquantOxipng,
    Mozjpeg,
    Jpegtran,
    /// In-process libwebp re-encode.
    Webp,
    Cwebp,
    Gifsicle,
    Svgmin,
    MetadataStrip,
    HeicReencode,
    JxlReencode,
    TiffDeflate,
    TiffLzw,
    Bmp,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::None => "none",
            Method::Oxipng => "oxipng",
            Method::PngquantOxipng => "pngquant + oxipng",
            Method::Mozjpeg => "mozjpeg",
            Method::Jpegtran => "jpegtran",
            Method::Webp => "webp",
            Method::Cwebp => "cwebp",
            Method::Gifsicle => "gifsicle",
            Method::Svgmin => "svgmin",
            Method::MetadataStrip => "metadata-strip",
            Method::HeicReencode => "heic-reencode",
            Method::JxlReencode => "jxl-reencode",
            Method::TiffDeflate => "tiff-deflate",
            Method::TiffLzw => "tiff-lzw",
            Method::Bmp => "bmp",
        }
    }

    /// True for methods that never alter pixel data. Used as the
    /// tie-break when two candidates land on the same size.
    pub fn is_lossless(self) -> bool {
        matches!(
            self,
            Method::None
                | Method::Oxipng
                | Method::Jpegtran
                | Method::Gifsicle
                | Method::Svgmin
                | Method::MetadataStrip
                | Method::TiffDeflate
                | Method::TiffLzw
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_string_forms() {
        assert_eq!(Method::None.as_str(), "none");
        assert_eq!(Method::PngquantOxipng.as_str(), "pngquant + oxipng");
        assert_eq!(Method::MetadataStrip.as_str(), "metadata-strip");
        assert_eq!(Method::Webp.to_string(), "webp");
    }

    #[test]
    fn test_lossless_classification() {
        assert!(Method::Oxipng.is_lossless());
        assert!(Method::Jpegtran.is_lossless());
        assert!(!Method::Mozjpeg.is_lossless());
        assert!(!Method::PngquantOxipng.is_lossless());
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Method::PngquantOxipng).unwrap();
        assert_eq!(json, "\"pngquant + oxipng\"");
        let back: Method = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Method::PngquantOxipng);
    }
}
