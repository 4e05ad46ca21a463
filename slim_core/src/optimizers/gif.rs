//! GIF optimization via gifsicle.
//!
//! `--optimize=3` shrinks frame bounding boxes, optimizes disposal
//! methods, and re-compresses LZW per frame. Lossless: the quality
//! setting is ignored. Static and animated GIFs take the same path.

use crate::config::OptimizeConfig;
use crate::errors::{Result, SlimError};
use crate::format_detect::Format;
use crate::results::OptimizeResult;
use crate::tool_runner::run_tool;
use crate::types::Method;
use std::time::Duration;
use tracing::debug;

use super::finish;

pub fn optimize(
    data: &[u8],
    _config: &OptimizeConfig,
    tool_timeout: Duration,
) -> Result<OptimizeResult> {
    let output = match run_tool(&["gifsicle", "--optimize=3"], data, tool_timeout, &[]) {
        Ok(output) => output.stdout,
        Err(SlimError::ToolNotFound(tool)) => {
            debug!(tool = %tool, "gifsicle unavailable, returning input");
            return Ok(finish(data, data.to_vec(), Method::None, Format::Gif));
        }
        Err(e) => return Err(e),
    };
    Ok(finish(data, output, Method::Gifsicle, Format::Gif))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detect::detect;
    use crate::image_formats::gif as gif_container;
    use crate::tool_runner::is_tool_available;

    fn sample_gif(frames: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut buf, 16, 16, &[]).unwrap();
            if frames > 1 {
                encoder.set_repeat(gif::Repeat::Infinite).unwrap();
            }
            for i in 0..frames {
                let mut pixels = vec![0u8; 16 * 16 * 4];
                for px in pixels.chunks_exact_mut(4) {
                    px[0] = (i * 60) as u8;
                    px[1] = 120;
                    px[2] = 200;
                    px[3] = 255;
                }
                let frame = gif::Frame::from_rgba(16, 16, &mut pixels);
                encoder.write_frame(&frame).unwrap();
            }
        }
        buf
    }

    #[test]
    fn test_gifsicle_optimizes_animated_gif() {
        if !is_tool_available("gifsicle") {
            return;
        }
        let data = sample_gif(3);
        let result = optimize(&data, &OptimizeConfig::default(), Duration::from_secs(10)).unwrap();
        assert!(result.optimized_size <= result.original_size);
        if result.method == Method::Gifsicle {
            assert_eq!(detect(&result.bytes).unwrap(), Format::Gif);
            assert!(gif_container::frame_count(&result.bytes) >= 1);
        }
    }

    #[test]
    fn test_missing_gifsicle_returns_input() {
        if is_tool_available("gifsicle") {
            return;
        }
        let data = sample_gif(1);
        let result = optimize(&data, &OptimizeConfig::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(result.method, Method::None);
        assert_eq!(result.bytes, data);
    }
}
