//! Service boundary: the two inbound operations with admission control.
//!
//! Estimation is cheap and bypasses the gate; optimization is CPU-heavy
//! and must hold a slot for its whole duration. The gate is owned here
//! and handed to nothing else.

use crate::config::OptimizeConfig;
use crate::errors::{Result, SlimError};
use crate::estimator;
use crate::gate::CompressionGate;
use crate::optimizers::optimize_image;
use crate::results::{Estimate, OptimizeResult};
use crate::settings::Settings;
use std::time::Duration;

pub struct SlimService {
    settings: Settings,
    gate: CompressionGate,
}

impl SlimService {
    pub fn new(settings: Settings) -> Self {
        let gate = CompressionGate::new(settings.compression_slots, settings.max_queue_depth);
        Self { settings, gate }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gate(&self) -> &CompressionGate {
        &self.gate
    }

    /// Optimize: size check → gate admission → format dispatch. The gate
    /// slot is held until the result (or error) is produced.
    pub fn optimize(&self, data: &[u8], config: &OptimizeConfig) -> Result<OptimizeResult> {
        self.check_size(data)?;
        let _slot = self.gate.acquire()?;
        optimize_image(
            data,
            config,
            Duration::from_secs(self.settings.tool_timeout_seconds),
        )
    }

    /// Estimate: size check only, no gate.
    pub fn estimate(&self, data: &[u8], config: &OptimizeConfig) -> Result<Estimate> {
        self.check_size(data)?;
        estimator::estimate(data, config)
    }

    fn check_size(&self, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        if size > self.settings.max_file_size_bytes {
            return Err(SlimError::FileTooLarge {
                size,
                limit: self.settings.max_file_size_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(20, 20, image::Rgb([40, 90, 200]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn service_with_limit(limit: u64) -> SlimService {
        let settings = Settings {
            max_file_size_bytes: limit,
            ..Settings::default()
        };
        SlimService::new(settings)
    }

    #[test]
    fn test_file_too_large_rejected_before_work() {
        let service = service_with_limit(16);
        let data = small_png();
        let err = service.estimate(&data, &OptimizeConfig::default()).unwrap_err();
        assert!(matches!(err, SlimError::FileTooLarge { .. }));
        let err = service.optimize(&data, &OptimizeConfig::default()).unwrap_err();
        assert!(matches!(err, SlimError::FileTooLarge { .. }));
    }

    #[test]
    fn test_estimate_does_not_touch_the_gate() {
        let service = service_with_limit(1 << 20);
        let _hold_everything: Vec<_> = (0..service.settings().compression_slots)
            .map(|_| service.gate().acquire().unwrap())
            .collect();
        // All slots busy; estimation still succeeds.
        let est = service
            .estimate(&small_png(), &OptimizeConfig::default())
            .unwrap();
        assert!(est.original_size > 0);
    }

    #[test]
    fn test_optimize_releases_slot_after_error() {
        let service = service_with_limit(1 << 20);
        // Unsupported bytes: dispatch fails, but the slot must come back.
        let _ = service.optimize(&[9, 9, 9, 9], &OptimizeConfig::default());
        assert_eq!(service.gate().active_jobs(), 0);
        assert_eq!(service.gate().queued_jobs(), 0);
    }

    #[test]
    fn test_optimize_end_to_end_lossless_png() {
        let service = service_with_limit(1 << 20);
        let config = OptimizeConfig {
            png_lossy: false,
            ..OptimizeConfig::default()
        };
        let data = small_png();
        let result = service.optimize(&data, &config).unwrap();
        assert!(result.optimized_size <= result.original_size);
        assert!(result.bytes.len() <= data.len());
    }
}
