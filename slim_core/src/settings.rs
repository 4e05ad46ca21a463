//! Service settings loaded from environment variables.
//!
//! All knobs have computed defaults so a bare `Settings::from_env()` is
//! always usable. Env prefix is `SLIMIMG_`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound on accepted input size in bytes.
    pub max_file_size_bytes: u64,

    /// Per-tool subprocess timeout in seconds.
    pub tool_timeout_seconds: u64,

    /// Concurrent optimization slots. Defaults to CPU count.
    pub compression_slots: usize,

    /// Maximum queued + active optimizations. Defaults to 2 * slots.
    pub max_queue_depth: usize,

    /// Default quality when the caller does not set one.
    pub default_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_file_size_bytes: 32 * 1024 * 1024,
            tool_timeout_seconds: 60,
            compression_slots: cpus,
            max_queue_depth: 2 * cpus,
            default_quality: 80,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(mb) = read_env::<u64>("SLIMIMG_MAX_FILE_SIZE_MB") {
            settings.max_file_size_bytes = mb * 1024 * 1024;
        }
        if let Some(secs) = read_env::<u64>("SLIMIMG_TOOL_TIMEOUT_SECONDS") {
            settings.tool_timeout_seconds = secs;
        }
        if let Some(slots) = read_env::<usize>("SLIMIMG_COMPRESSION_SLOTS") {
            if slots > 0 {
                settings.compression_slots = slots;
                settings.max_queue_depth = 2 * slots;
            }
        }
        if let Some(depth) = read_env::<usize>("SLIMIMG_MAX_QUEUE_DEPTH") {
            if depth > 0 {
                settings.max_queue_depth = depth;
            }
        }
        if let Some(q) = read_env::<u8>("SLIMIMG_DEFAULT_QUALITY") {
            settings.default_quality = q.clamp(1, 100);
        }

        settings
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
