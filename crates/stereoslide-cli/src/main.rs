//! stereoslide CLI: scanned stereo slide to side-by-side VR image.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use stereoslide::debug_dump::{render_overlay, DebugDump};
use stereoslide::{
    ConvertConfig, DebugArtifacts, NoiseMethod, NoiseStrength, RawScan, ScanOrientation,
    SlideConverter,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "stereoslide")]
#[command(about = "Convert scans of mounted stereo slides into side-by-side stereo images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one scan.
    Convert(CliConvertArgs),

    /// Convert many scans into a directory, in parallel.
    Batch(CliBatchArgs),

    /// Run mount detection only and print the candidates as JSON.
    Inspect {
        /// Path to the scanned slide.
        #[arg(long)]
        image: PathBuf,

        #[command(flatten)]
        tuning: CliTuningArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct CliConvertArgs {
    /// Path to the scanned slide.
    #[arg(long)]
    image: PathBuf,

    /// Output image path. `.jpg` is appended unless the extension is png/jpg/jpeg.
    #[arg(long)]
    out: PathBuf,

    /// Path to write the conversion report (JSON).
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory for the debug dump and intermediate images.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[command(flatten)]
    tuning: CliTuningArgs,
}

#[derive(Debug, Clone, Args)]
struct CliBatchArgs {
    /// Scanned slides to convert.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output directory; each result is written as `<stem>_vr.jpg`, with a
    /// `_2`, `_3`, … suffix on the stem when inputs share a file stem.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    tuning: CliTuningArgs,
}

/// Pipeline tuning shared by all subcommands. Flags override the config file.
#[derive(Debug, Clone, Args)]
struct CliTuningArgs {
    /// JSON config file (any subset of the full config).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable noise reduction with the given method.
    #[arg(long, value_enum)]
    noise_reduction: Option<NoiseMethodArg>,

    /// Noise reduction strength.
    #[arg(long, value_enum)]
    noise_strength: Option<NoiseStrengthArg>,

    /// Enable dust and scratch removal.
    #[arg(long)]
    remove_dust: bool,

    /// Enable color-aging correction.
    #[arg(long)]
    remove_aging: bool,

    /// The slide was scanned upside down.
    #[arg(long)]
    rotated_180: bool,

    /// Per-eye canonical width in pixels.
    #[arg(long)]
    canonical_width: Option<u32>,

    /// Per-eye canonical height in pixels.
    #[arg(long)]
    canonical_height: Option<u32>,

    /// Maximum accepted mount skew in degrees.
    #[arg(long)]
    max_skew_deg: Option<f64>,

    /// Relative tolerance on frame width symmetry and aspect ratio.
    #[arg(long)]
    aspect_tolerance: Option<f64>,

    /// Collect intermediate artifacts (implied by --debug-dir).
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NoiseMethodArg {
    Bilateral,
    Nlm,
    Gaussian,
}

impl NoiseMethodArg {
    fn to_core(self) -> NoiseMethod {
        match self {
            Self::Bilateral => NoiseMethod::Bilateral,
            Self::Nlm => NoiseMethod::Nlm,
            Self::Gaussian => NoiseMethod::Gaussian,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NoiseStrengthArg {
    Low,
    Medium,
    High,
}

impl NoiseStrengthArg {
    fn to_core(self) -> NoiseStrength {
        match self {
            Self::Low => NoiseStrength::Low,
            Self::Medium => NoiseStrength::Medium,
            Self::High => NoiseStrength::High,
        }
    }
}

impl CliTuningArgs {
    fn build_config(&self) -> CliResult<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_json_file(path)?,
            None => ConvertConfig::default(),
        };

        if let Some(method) = self.noise_reduction {
            config.enhance.noise_reduction = Some(method.to_core());
        }
        if let Some(strength) = self.noise_strength {
            config.enhance.noise_strength = strength.to_core();
        }
        config.enhance.remove_dust |= self.remove_dust;
        config.enhance.remove_aging |= self.remove_aging;
        if self.rotated_180 {
            config.align.orientation = ScanOrientation::Rotated180;
        }
        if let Some(w) = self.canonical_width {
            config.align.canonical_size[0] = w;
        }
        if let Some(h) = self.canonical_height {
            config.align.canonical_size[1] = h;
        }
        if let Some(deg) = self.max_skew_deg {
            config.mount.max_skew_deg = deg;
        }
        if let Some(tol) = self.aspect_tolerance {
            config.split.frame_aspect_tolerance = tol;
        }
        config.debug |= self.debug;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(args) => run_convert(&args),
        Commands::Batch(args) => run_batch(&args),
        Commands::Inspect { image, tuning } => run_inspect(&image, &tuning),
    }
}

fn load_scan(path: &Path) -> CliResult<RawScan> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let scan = RawScan::from_dynamic(&img);
    tracing::info!(
        "Loaded {} ({}x{}, {} channel(s))",
        path.display(),
        scan.width(),
        scan.height(),
        scan.channels()
    );
    Ok(scan)
}

fn output_path(out: &Path) -> PathBuf {
    let known = out
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false);
    if known {
        out.to_path_buf()
    } else {
        let mut s = out.as_os_str().to_owned();
        s.push(".jpg");
        PathBuf::from(s)
    }
}

// ── convert ────────────────────────────────────────────────────────────

fn run_convert(args: &CliConvertArgs) -> CliResult<()> {
    let mut config = args.tuning.build_config()?;
    config.debug |= args.debug_dir.is_some();
    let scan = load_scan(&args.image)?;
    let converter = SlideConverter::with_config(config.clone());

    let result = converter.convert(&scan);

    if let Some(dir) = &args.debug_dir {
        std::fs::create_dir_all(dir)?;
        let dump = DebugDump::from_run(Some(&args.image), &scan, &config, &result);
        std::fs::write(
            dir.join("debug_dump.json"),
            serde_json::to_string_pretty(&dump)?,
        )?;
        let artifacts = match &result {
            Ok(conv) => conv.artifacts.as_deref(),
            Err(err) => err.artifacts.as_deref(),
        };
        if let Some(a) = artifacts {
            write_debug_images(dir, &scan, a)?;
        }
        tracing::info!("Debug output written to {}", dir.display());
    }

    let conversion = result?;
    let out = output_path(&args.out);
    conversion.frame.image().save(&out)?;
    tracing::info!(
        "Stereo frame {}x{} written to {}",
        conversion.frame.width(),
        conversion.frame.height(),
        out.display()
    );

    if let Some(report_path) = &args.report {
        std::fs::write(
            report_path,
            serde_json::to_string_pretty(&conversion.report)?,
        )?;
        tracing::info!("Report written to {}", report_path.display());
    }

    Ok(())
}

fn write_debug_images(dir: &Path, scan: &RawScan, a: &DebugArtifacts) -> CliResult<()> {
    if let Some(mask) = &a.edge_mask {
        mask.save(dir.join("edge_mask.png"))?;
    }
    render_overlay(scan, a).save(dir.join("overlay.png"))?;
    if let Some(al) = &a.alignment {
        al.pair.left.save(dir.join("aligned_left.png"))?;
        al.pair.right.save(dir.join("aligned_right.png"))?;
    }
    for (i, snap) in a.stages.iter().enumerate() {
        let name = serde_json::to_value(snap.stage)?
            .as_str()
            .unwrap_or("stage")
            .to_string();
        snap.pair
            .left
            .save(dir.join(format!("{}_{}_left.png", i + 1, name)))?;
        snap.pair
            .right
            .save(dir.join(format!("{}_{}_right.png", i + 1, name)))?;
    }
    Ok(())
}

// ── batch ──────────────────────────────────────────────────────────────

fn run_batch(args: &CliBatchArgs) -> CliResult<()> {
    let config = args.tuning.build_config()?;
    let converter = SlideConverter::with_config(config);
    std::fs::create_dir_all(&args.out_dir)?;

    let names = batch_output_names(&args.images);
    let outcomes: Vec<(PathBuf, Result<PathBuf, String>)> = args
        .images
        .par_iter()
        .zip(names.par_iter())
        .map(|(path, name)| {
            let out = args.out_dir.join(name);
            let res = convert_one(&converter, path, &out)
                .map(|()| out)
                .map_err(|e| e.to_string());
            (path.clone(), res)
        })
        .collect();

    let mut failed = 0usize;
    for (path, res) in &outcomes {
        match res {
            Ok(out) => tracing::info!("{} -> {}", path.display(), out.display()),
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {}", path.display(), e);
            }
        }
    }
    tracing::info!(
        "Converted {}/{} slides",
        outcomes.len() - failed,
        outcomes.len()
    );

    if failed > 0 {
        return Err(format!("{} of {} slides failed", failed, outcomes.len()).into());
    }
    Ok(())
}

/// `<stem>_vr.jpg` per input; repeated stems get `_2`, `_3`, … in input
/// order so no two outputs share a file.
fn batch_output_names(images: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    images
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("slide");
            let mut name = format!("{}_vr.jpg", stem);
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{}_{}_vr.jpg", stem, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn convert_one(converter: &SlideConverter, path: &Path, out: &Path) -> CliResult<()> {
    let scan = load_scan(path)?;
    let conversion = converter.convert(&scan)?;
    conversion.frame.image().save(out)?;
    Ok(())
}

// ── inspect ────────────────────────────────────────────────────────────

fn run_inspect(image: &Path, tuning: &CliTuningArgs) -> CliResult<()> {
    let converter = SlideConverter::with_config(tuning.build_config()?);
    let scan = load_scan(image)?;
    let detection = converter.detect_mount(&scan);

    match &detection.region {
        Some(m) => tracing::info!(
            "Mount found: confidence {:.3}, skew {:.2}°, area ratio {:.3}",
            m.confidence,
            m.skew_deg,
            m.area_ratio
        ),
        None => tracing::warn!(
            "No mount accepted ({} candidates examined)",
            detection.candidates.len()
        ),
    }

    let json = serde_json::json!({
        "working_scale": detection.working_scale,
        "edge_threshold": detection.edge_threshold,
        "region": detection.region,
        "candidates": detection.candidates,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_names_disambiguate_repeated_stems() {
        let images = [
            PathBuf::from("roll1/slide.tif"),
            PathBuf::from("roll2/slide.tif"),
            PathBuf::from("roll2/other.png"),
            PathBuf::from("roll3/slide.jpg"),
        ];
        assert_eq!(
            batch_output_names(&images),
            vec![
                "slide_vr.jpg",
                "slide_2_vr.jpg",
                "other_vr.jpg",
                "slide_3_vr.jpg"
            ]
        );
    }

    #[test]
    fn output_extension_is_kept_or_appended() {
        assert_eq!(output_path(Path::new("out.PNG")), PathBuf::from("out.PNG"));
        assert_eq!(output_path(Path::new("out.jpeg")), PathBuf::from("out.jpeg"));
        assert_eq!(output_path(Path::new("out.tif")), PathBuf::from("out.tif.jpg"));
        assert_eq!(output_path(Path::new("out")), PathBuf::from("out.jpg"));
    }
}
