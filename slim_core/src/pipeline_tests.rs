//! End-to-end pipeline tests: optimize and estimate driven through the
//! public surface, checking the cross-cutting guarantees rather than any
//! single module.

use crate::config::OptimizeConfig;
use crate::format_detect::{detect, Format};
use crate::header_analysis::analyze;
use crate::heuristics::predict_reduction;
use crate::optimizers::optimize_image;
use crate::service::SlimService;
use crate::settings::Settings;
use crate::types::Method;
use std::io::Cursor;
use std::time::Duration;

fn png_bytes(img: image::RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn red_square(size: u32) -> Vec<u8> {
    png_bytes(image::RgbImage::from_pixel(
        size,
        size,
        image::Rgb([255, 0, 0]),
    ))
}

fn textured(size: u32) -> Vec<u8> {
    png_bytes(image::RgbImage::from_fn(size, size, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 5) as u8, ((x ^ y) * 3) as u8])
    }))
}

const TIMEOUT: Duration = Duration::from_secs(20);

#[test]
fn test_red_png_lossless_scenario() {
    // Plain 100x100 red PNG, quality=80, png_lossy=false: lossless
    // method, modest reduction, output decodes at the same size.
    let data = red_square(100);
    let config = OptimizeConfig {
        png_lossy: false,
        ..OptimizeConfig::default()
    };
    let result = optimize_image(&data, &config, TIMEOUT).unwrap();
    assert!(result.reduction_percent >= 0.0);
    assert!(matches!(
        result.method,
        Method::Oxipng | Method::MetadataStrip | Method::None
    ));
    let decoded = image::load_from_memory(&result.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
}

#[test]
fn test_optimize_preserves_detected_format() {
    let inputs: Vec<Vec<u8>> = vec![red_square(40), textured(64), b"<svg><rect/></svg>".to_vec()];
    for data in inputs {
        let before = detect(&data).unwrap();
        let result = optimize_image(&data, &OptimizeConfig::default(), TIMEOUT).unwrap();
        let after = detect(&result.bytes).unwrap();
        // APNG/PNG share the container; SVGZ round-trips are exercised
        // separately.
        assert_eq!(before, after, "format changed through optimization");
    }
}

#[test]
fn test_svgz_roundtrip_stays_svgz() {
    use std::io::Write;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(format!("<svg><!--{}--><rect/></svg>", "p".repeat(300)).as_bytes())
        .unwrap();
    let data = encoder.finish().unwrap();
    assert_eq!(detect(&data).unwrap(), Format::Svgz);

    let result = optimize_image(&data, &OptimizeConfig::default(), TIMEOUT).unwrap();
    if result.method != Method::None {
        assert_eq!(detect(&result.bytes).unwrap(), Format::Svgz);
    }
}

#[test]
fn test_script_svg_scenario() {
    let data = b"<svg><script>alert(1)</script><rect/></svg>";
    let result = optimize_image(data, &OptimizeConfig::default(), TIMEOUT).unwrap();
    let text = String::from_utf8_lossy(&result.bytes);
    assert!(!text.contains("<script>"));
    assert!(!text.contains("alert"));
    assert!(text.contains("rect"));
}

#[test]
fn test_never_larger_across_formats_and_configs() {
    let svg = b"<svg><circle r=\"9\"/></svg>".to_vec();
    let inputs = vec![red_square(8), red_square(100), textured(64), svg];
    for data in inputs {
        for quality in [10u8, 50, 80, 100] {
            let config = OptimizeConfig::default().with_quality(quality);
            let result = optimize_image(&data, &config, TIMEOUT).unwrap();
            assert!(
                result.bytes.len() <= data.len(),
                "q{}: output {} > input {}",
                quality,
                result.bytes.len(),
                data.len()
            );
            if result.bytes.len() == data.len() {
                assert_eq!(result.method, Method::None);
            }
        }
    }
}

#[test]
fn test_estimator_tracks_analyzer_totality() {
    // Every detected input must analyze and predict without error, with
    // the documented invariants holding.
    let svg = b"<svg viewBox=\"0 0 5 5\"/>".to_vec();
    let inputs = vec![red_square(30), textured(100), svg];
    for data in inputs {
        let format = detect(&data).unwrap();
        let info = analyze(&data, format);
        assert_eq!(info.file_size, data.len() as u64);
        let prediction = predict_reduction(&info, &OptimizeConfig::default());
        assert!((0.0..=95.0).contains(&prediction.reduction_percent));
        assert!(prediction.estimated_size <= info.file_size);
    }
}

#[test]
fn test_service_optimize_then_estimate_consistency() {
    let service = SlimService::new(Settings::default());
    let data = textured(80);
    let config = OptimizeConfig {
        png_lossy: false,
        ..OptimizeConfig::default()
    };

    let estimate = service.estimate(&data, &config).unwrap();
    let result = service.optimize(&data, &config).unwrap();

    assert_eq!(estimate.original_format, result.format);
    assert_eq!(estimate.original_size, result.original_size);
    // Both respect the same bounds even when they disagree on magnitude.
    assert!(estimate.estimated_optimized_size <= estimate.original_size);
    assert!(result.optimized_size <= result.original_size);
}

#[test]
fn test_gate_saturation_surfaces_backpressure() {
    let settings = Settings {
        compression_slots: 1,
        max_queue_depth: 1,
        ..Settings::default()
    };
    let service = SlimService::new(settings);
    let _held = service.gate().acquire().unwrap();
    let err = service
        .optimize(&red_square(10), &OptimizeConfig::default())
        .unwrap_err();
    assert_eq!(err.code(), "service_overloaded");
}
