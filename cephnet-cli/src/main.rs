use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use walkdir::WalkDir;

use cephnet_core::{
    AugmentationConfig, EvalSample, LandmarkSet, Point, SplitError, augment, evaluate,
    landmark_name, split_items,
};
use cephnet_utils::{
    config::AppSettings, configure_telemetry, init_logging, load_image, normalize_path,
};

/// Dataset and evaluation utilities for the cephalometric landmark pipeline.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Optional settings JSON (defaults to built-in pipeline parameters).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, global = true)]
    telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    telemetry_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Partition item identifiers into train/val/test subsets.
    Split(SplitArgs),
    /// Aggregate ground-truth/predicted coordinate pairs into a metrics report.
    Evaluate(EvaluateArgs),
    /// Apply the training augmentation chain to an annotated image.
    Augment(AugmentArgs),
}

#[derive(Debug, clap::Args)]
struct SplitArgs {
    /// Identifier list file (one per line) or a directory of images.
    #[arg(short, long)]
    input: PathBuf,

    /// Override the training fraction.
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Override the validation fraction.
    #[arg(long)]
    val_ratio: Option<f64>,

    /// Override the shuffle seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the partition to a JSON file instead of stdout.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct EvaluateArgs {
    /// JSON file with an array of evaluation samples
    /// (`{ground_truth, predicted, landmark_index}`).
    #[arg(short, long)]
    pairs: PathBuf,

    /// Override the SDR thresholds (comma-separated pixel values).
    #[arg(long, value_delimiter = ',')]
    thresholds: Option<Vec<f64>>,

    /// Write the report to a JSON file instead of stdout.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct AugmentArgs {
    /// Path to the source image.
    #[arg(short, long)]
    image: PathBuf,

    /// JSON file with the 19 landmark coordinates (`[[x, y], ...]`).
    #[arg(short, long)]
    landmarks: PathBuf,

    /// Seed for the augmentation draws.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of augmented variants to produce.
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Directory to write augmented images and landmark files.
    #[arg(short, long)]
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct SplitGroups {
    train: Vec<String>,
    val: Vec<String>,
    test: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SplitRecord {
    num_items: usize,
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    split: Option<SplitGroups>,
    /// Fallback group when the input is too small for a three-way split.
    #[serde(skip_serializing_if = "Option::is_none")]
    all: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AugmentRecord {
    image: String,
    landmarks: Vec<[f32; 2]>,
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_ref())?;
    apply_telemetry_overrides(&mut settings, &cli);

    configure_telemetry(settings.telemetry.enabled, settings.telemetry.level_filter());
    if settings.telemetry.enabled {
        info!(
            "Telemetry logging enabled (level={:?})",
            settings.telemetry.level_filter()
        );
    }

    match cli.command {
        Command::Split(args) => run_split(&settings, &args),
        Command::Evaluate(args) => run_evaluate(&settings, &args),
        Command::Augment(args) => run_augment(&settings, &args),
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<AppSettings> {
    match path {
        Some(path) => {
            let path = normalize_path(path)?;
            info!("Loading settings from {}", path.display());
            AppSettings::load_from_path(&path)
        }
        None => Ok(AppSettings::default()),
    }
}

/// Fold the telemetry flags into the loaded settings.
fn apply_telemetry_overrides(settings: &mut AppSettings, cli: &Cli) {
    if cli.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = cli.telemetry_level.as_deref() {
        let normalized = level.trim().to_ascii_lowercase();
        if !normalized.is_empty() {
            if normalized == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = normalized;
        }
    }
}

fn run_split(settings: &AppSettings, args: &SplitArgs) -> Result<()> {
    let input = normalize_path(&args.input)?;
    let ids = collect_identifiers(&input)?;
    anyhow::ensure!(!ids.is_empty(), "no identifiers found at {}", input.display());

    let train_ratio = args.train_ratio.unwrap_or(settings.split.train_ratio);
    let val_ratio = args.val_ratio.unwrap_or(settings.split.val_ratio);
    let seed = args.seed.unwrap_or(settings.split.seed);

    info!(
        "Splitting {} item(s) with ratios {:.2}/{:.2} (seed {})",
        ids.len(),
        train_ratio,
        val_ratio,
        seed
    );

    let record = match split_items(&ids, train_ratio, val_ratio, seed) {
        Ok(split) => {
            info!(
                "Partition sizes: train={}, val={}, test={}",
                split.train.len(),
                split.val.len(),
                split.test.len()
            );
            SplitRecord {
                num_items: ids.len(),
                seed,
                split: Some(SplitGroups {
                    train: split.train,
                    val: split.val,
                    test: split.test,
                }),
                all: None,
            }
        }
        Err(err @ SplitError::TooFewItems { .. }) => {
            // Too small to divide three ways; keep everything in one group.
            warn!("{err}; emitting a single undivided group");
            SplitRecord {
                num_items: ids.len(),
                seed,
                split: None,
                all: Some(ids),
            }
        }
        Err(err) => return Err(err.into()),
    };

    emit_json(&record, args.json.as_ref())
}

fn run_evaluate(settings: &AppSettings, args: &EvaluateArgs) -> Result<()> {
    let pairs_path = normalize_path(&args.pairs)?;
    let contents = fs::read_to_string(&pairs_path)
        .with_context(|| format!("failed to read pairs file {}", pairs_path.display()))?;
    let samples: Vec<EvalSample> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse pairs JSON at {}", pairs_path.display()))?;

    let thresholds = args
        .thresholds
        .clone()
        .unwrap_or_else(|| settings.metrics.sdr_thresholds.clone());

    let report = evaluate(&samples, &thresholds)
        .with_context(|| format!("failed to evaluate {} sample(s)", samples.len()))?;

    info!(
        "MRE: {:.2} +/- {:.2} pixels over {} sample(s)",
        report.mre, report.std, report.num_samples
    );
    for (key, value) in &report.sdr {
        info!("  {key}: {value:.1}%");
    }
    for (index, entry) in &report.per_landmark_mre {
        let name = landmark_name(*index).unwrap_or("?");
        match entry {
            Some(mre) => info!("  {index:2}. {name:25}: {mre:5.2}"),
            None => info!("  {index:2}. {name:25}: no samples"),
        }
    }

    emit_json(&report, args.json.as_ref())
}

fn run_augment(settings: &AppSettings, args: &AugmentArgs) -> Result<()> {
    let image_path = normalize_path(&args.image)?;
    let landmarks_path = normalize_path(&args.landmarks)?;

    let image = load_image(&image_path)?.to_luma8();
    let contents = fs::read_to_string(&landmarks_path).with_context(|| {
        format!("failed to read landmarks file {}", landmarks_path.display())
    })?;
    let coords: Vec<[f32; 2]> = serde_json::from_str(&contents).with_context(|| {
        format!("failed to parse landmarks JSON at {}", landmarks_path.display())
    })?;
    let points: Vec<Point> = coords.iter().map(|[x, y]| Point::new(*x, *y)).collect();
    // Validate the slot count up front; augment itself is count-agnostic.
    LandmarkSet::from_points(&points)
        .map_err(|err| anyhow::anyhow!("landmark file is incomplete: {err}"))?;

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("failed to create output directory {}", args.output_dir.display())
    })?;

    let config: AugmentationConfig = (&settings.augmentation).into();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sample");

    for variant in 0..args.count.max(1) {
        let (augmented, moved) = augment::apply(&image, &points, &config, &mut rng);

        let image_out = args.output_dir.join(format!("{stem}_aug{variant:02}.png"));
        augmented
            .save(&image_out)
            .with_context(|| format!("failed to write {}", image_out.display()))?;

        let record = AugmentRecord {
            image: image_out.display().to_string(),
            landmarks: moved.iter().map(|p| [p.x, p.y]).collect(),
        };
        let json_out = args.output_dir.join(format!("{stem}_aug{variant:02}.json"));
        fs::write(&json_out, serde_json::to_string_pretty(&record)?)
            .with_context(|| format!("failed to write {}", json_out.display()))?;

        info!("Wrote {}", image_out.display());
    }

    Ok(())
}

/// Read identifiers from a list file, or collect image filenames from a
/// directory (jpg, jpeg, png, bmp).
fn collect_identifiers(input: &Path) -> Result<Vec<String>> {
    if input.is_file() {
        let contents = fs::read_to_string(input)
            .with_context(|| format!("failed to read identifier list {}", input.display()))?;
        return Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect());
    }

    let mut ids = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "bmp"
                )
            })
            .unwrap_or(false);
        if is_image {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(name.to_string());
            }
        }
    }
    Ok(ids)
}

/// Serialize a record to the requested JSON file, or pretty-print to stdout.
fn emit_json<T: Serialize>(record: &T, json: Option<&PathBuf>) -> Result<()> {
    let payload = serde_json::to_string_pretty(record).context("failed to serialize record")?;
    match json {
        Some(path) => {
            fs::write(path, payload)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}
