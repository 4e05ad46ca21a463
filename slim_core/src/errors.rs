//! Error taxonomy for the optimization and estimation pipelines.
//!
//! Every failure mode visible at the service boundary maps to one stable
//! variant here. Probe failures never surface through this type; they are
//! absorbed into `ProbeValue::Failed` at the callsite.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlimError {
    #[error("Image format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("File exceeds maximum allowed size ({size} > {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Failed to read image: {0}")]
    ImageRead(String),

    #[error("{tool} failed with exit code {exit_code}: {stderr_tail}")]
    Optimization {
        tool: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("{tool} timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Compression queue full, retry after {retry_after}s")]
    Backpressure { retry_after: u32 },

    #[error("Malformed SVG XML: {0}")]
    MalformedSvg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl SlimError {
    /// Stable machine-readable tag, mirrored into CLI/JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            SlimError::UnsupportedFormat(_) => "unsupported_format",
            SlimError::FileTooLarge { .. } => "file_too_large",
            SlimError::ImageRead(_) => "image_read_failed",
            SlimError::Optimization { .. } => "optimization_failed",
            SlimError::ToolTimeout { .. } => "tool_timeout",
            SlimError::ToolNotFound(_) => "tool_not_found",
            SlimError::Backpressure { .. } => "service_overloaded",
            SlimError::MalformedSvg(_) => "malformed_svg",
            SlimError::Io(_) => "io_error",
            SlimError::Image(_) => "image_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SlimError>;
