//! GIF predictor — bucketed bytes-per-pixel model.
//!
//! gifsicle's savings depend on how much LZW slack and frame redundancy
//! exist. Bytes-per-pixel separates gradient/photographic GIFs (high
//! bpp, little slack) from flat graphics (low bpp, lots of slack); file
//! size adjusts within a bucket.

use crate::config::OptimizeConfig;
use crate::header_analysis::HeaderInfo;
use crate::results::{Confidence, Potential, Prediction};
use crate::types::Method;

pub fn predict(info: &HeaderInfo, _config: &OptimizeConfig) -> Prediction {
    let (reduction, potential) = if info.frame_count > 1 {
        (15.0, Potential::Medium)
    } else {
        let pixels = info.pixels().max(1);
        let bpp = info.file_size as f64 / pixels as f64;

        let reduction = if info.file_size < 1000 {
            10.0
        } else if bpp >= 0.10 {
            2.0
        } else if bpp >= 0.03 {
            if info.file_size < 2500 {
                10.0
            } else {
                14.0
            }
        } else if info.file_size < 2500 {
            12.0
        } else {
            15.0
        };
        let potential = if reduction >= 10.0 {
            Potential::Medium
        } else {
            Potential::Low
        };
        (reduction, potential)
    };

    Prediction::from_reduction(
        info.file_size,
        reduction,
        potential,
        Method::Gifsicle,
        false,
        Confidence::Medium,
    )
}
