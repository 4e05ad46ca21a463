use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use slim_core::{OptimizeConfig, Settings, SlimService};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Extensions considered when walking a directory; the actual format is
/// always re-detected from the bytes.
const CANDIDATE_EXTENSIONS: [&str; 15] = [
    "png", "apng", "jpg", "jpeg", "webp", "gif", "svg", "svgz", "avif", "heic", "heif", "tif",
    "tiff", "bmp", "jxl",
];

#[derive(Parser)]
#[command(name = "slimimg")]
#[command(version, about = "Image optimizer and savings estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a file or directory of images
    Run {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (single input) or directory (directory input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, default_value_t = 80)]
        quality: u8,

        /// Keep all metadata instead of stripping
        #[arg(long)]
        keep_metadata: bool,

        /// Emit progressive JPEG output
        #[arg(long)]
        progressive: bool,

        /// Lossless-only PNG (no palette quantization)
        #[arg(long)]
        png_lossless: bool,

        /// Cap size reduction at this percentage
        #[arg(long)]
        max_reduction: Option<f64>,

        #[arg(short, long, default_value_t = true)]
        recursive: bool,
    },

    /// Predict savings without optimizing
    Estimate {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long, default_value_t = 80)]
        quality: u8,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,
    },

    /// Detect image format from magic bytes
    Detect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Report availability of external encoder tools
    Tools,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

fn main() -> Result<()> {
    let _ = slim_core::init_logging("slimimg", slim_core::LogConfig::default());
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output,
            quality,
            keep_metadata,
            progressive,
            png_lossless,
            max_reduction,
            recursive,
        } => {
            let config = OptimizeConfig {
                strip_metadata: !keep_metadata,
                progressive_jpeg: progressive,
                png_lossy: !png_lossless,
                max_reduction,
                ..OptimizeConfig::default().with_quality(quality)
            };
            let service = SlimService::new(Settings::from_env());
            if input.is_dir() {
                run_directory(&service, &input, output.as_deref(), &config, recursive)
            } else {
                run_single(&service, &input, output.as_deref(), &config)
            }
        }
        Commands::Estimate {
            input,
            quality,
            output,
        } => {
            let config = OptimizeConfig::default().with_quality(quality);
            let service = SlimService::new(Settings::from_env());
            let data = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let estimate = service.estimate(&data, &config)?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimate)?),
                OutputFormat::Human => print_estimate(&estimate),
            }
            Ok(())
        }
        Commands::Detect { input } => {
            let data = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let format = slim_core::detect(&data)?;
            println!("{} ({})", format, format.mime_type());
            Ok(())
        }
        Commands::Tools => {
            for (tool, available) in slim_core::installed_tools() {
                println!(
                    "{:<10} {}",
                    tool,
                    if available { "found" } else { "missing" }
                );
            }
            Ok(())
        }
    }
}

fn run_single(
    service: &SlimService,
    input: &Path,
    output: Option<&Path>,
    config: &OptimizeConfig,
) -> Result<()> {
    let data =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let result = service.optimize(&data, config)?;

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(input),
    };
    std::fs::write(&out_path, &result.bytes)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    info!(
        "{} -> {} [{}] {} -> {} bytes ({:.1}%)",
        input.display(),
        out_path.display(),
        result.method,
        result.original_size,
        result.optimized_size,
        result.reduction_percent
    );
    Ok(())
}

fn run_directory(
    service: &SlimService,
    input: &Path,
    output: Option<&Path>,
    config: &OptimizeConfig,
    recursive: bool,
) -> Result<()> {
    let files = collect_candidates(input, recursive);
    if files.is_empty() {
        bail!(
            "No image files found in {} (looked for: {})",
            input.display(),
            CANDIDATE_EXTENSIONS.join(", ")
        );
    }
    info!("Found {} candidate files", files.len());

    let started = Instant::now();
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:32} {pos}/{len} {msg}").expect("static template"),
    );

    let succeeded = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let bytes_in = AtomicU64::new(0);
    let bytes_out = AtomicU64::new(0);

    files.par_iter().for_each(|file| {
        match process_one(service, input, file, output, config) {
            Ok(Some((original, optimized))) => {
                succeeded.fetch_add(1, Ordering::Relaxed);
                bytes_in.fetch_add(original, Ordering::Relaxed);
                bytes_out.fetch_add(optimized, Ordering::Relaxed);
            }
            Ok(None) => {
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                error!("{}: {}", file.display(), e);
            }
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    let total_in = bytes_in.load(Ordering::Relaxed);
    let total_out = bytes_out.load(Ordering::Relaxed);
    let saved_percent = if total_in > 0 {
        (1.0 - total_out as f64 / total_in as f64) * 100.0
    } else {
        0.0
    };
    info!(
        "Done in {:.1}s: {} optimized, {} already optimal, {} failed; {} -> {} bytes ({:.1}% saved)",
        started.elapsed().as_secs_f64(),
        succeeded.load(Ordering::Relaxed),
        skipped.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        total_in,
        total_out,
        saved_percent
    );

    if failed.load(Ordering::Relaxed) > 0 {
        warn!("Some files failed; see log for details");
    }
    Ok(())
}

/// Returns Ok(Some((in, out))) on a real reduction, Ok(None) when the
/// input was already optimal.
fn process_one(
    service: &SlimService,
    base: &Path,
    file: &Path,
    output: Option<&Path>,
    config: &OptimizeConfig,
) -> Result<Option<(u64, u64)>> {
    let data = std::fs::read(file)?;
    let result = service.optimize(&data, config)?;

    let out_path = match output {
        Some(out_dir) => {
            let relative = file.strip_prefix(base).unwrap_or(file);
            let path = out_dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => default_output_path(file),
    };
    std::fs::write(&out_path, &result.bytes)?;

    if result.method == slim_core::Method::None {
        info!("{} already optimized", file.display());
        return Ok(None);
    }
    info!(
        "{} [{}] {:.1}%",
        file.display(),
        result.method,
        result.reduction_percent
    );
    Ok(Some((result.original_size, result.optimized_size)))
}

fn collect_candidates(input: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| CANDIDATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    // Small files first: quick wins surface early in the progress bar.
    files.sort_by_key(|path| std::fs::metadata(path).map(|m| m.len()).unwrap_or(u64::MAX));
    files
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if ext.is_empty() {
        format!("{}.slim", stem)
    } else {
        format!("{}.slim.{}", stem, ext)
    };
    input.with_file_name(name)
}

fn print_estimate(estimate: &slim_core::Estimate) {
    println!("format:            {}", estimate.original_format);
    println!("dimensions:        {}x{}", estimate.width, estimate.height);
    println!("original size:     {} bytes", estimate.original_size);
    println!(
        "estimated size:    {} bytes ({:.1}% reduction)",
        estimate.estimated_optimized_size, estimate.estimated_reduction_percent
    );
    println!("method:            {}", estimate.method);
    println!("potential:         {:?}", estimate.optimization_potential);
    println!("confidence:        {:?}", estimate.confidence);
    println!("already optimized: {}", estimate.already_optimized);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path_inserts_slim() {
        let path = default_output_path(Path::new("/tmp/photo.png"));
        assert_eq!(path, PathBuf::from("/tmp/photo.slim.png"));
    }

    #[test]
    fn test_default_output_path_without_extension() {
        let path = default_output_path(Path::new("/tmp/photo"));
        assert_eq!(path, PathBuf::from("/tmp/photo.slim"));
    }

    #[test]
    fn test_collect_candidates_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b.JPG"), b"xy").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"xyz").unwrap();
        let files = collect_candidates(dir.path(), true);
        assert_eq!(files.len(), 2);
        // Sorted smallest first.
        assert!(files[0].ends_with("a.png"));
    }
}
