//! Shared configuration types consumed across the cephnet workspace.
//!
//! These structures provide a common representation for heatmap encoding,
//! augmentation, dataset splitting, and evaluation settings that can be
//! serialized to disk and reused by the CLI and the training harness.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Resize filter preference controlling the quality vs speed trade-off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Preserve visual quality when resizing (default, Lanczos filter).
    #[default]
    Quality,
    /// Prioritize throughput for batch preprocessing (Nearest filter).
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResizeQuality::Quality => "quality",
                ResizeQuality::Speed => "speed",
            }
        )
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Model input resolution in pixels (width x height).
///
/// Images are converted to grayscale and resized to these dimensions before
/// being handed to the scoring function; its output maps share the same grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Choose between quality-focused or speed-focused resizing.
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// Parameters for encoding landmark coordinates into Gaussian target maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeatmapSettings {
    /// Spread of the Gaussian peak in grid pixels. Must be positive.
    pub sigma: f32,
}

impl Default for HeatmapSettings {
    fn default() -> Self {
        Self { sigma: 5.0 }
    }
}

impl HeatmapSettings {
    /// Validate that the configured spread can be used for encoding.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.sigma.is_finite() && self.sigma > 0.0,
            "heatmap sigma must be a positive finite number (got {})",
            self.sigma
        );
        Ok(())
    }
}

/// Randomized training-time augmentation parameters.
///
/// Ranges of width zero (or a zero rotation range) disable the corresponding
/// step without consuming a random draw; the flip draw always happens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AugmentationSettings {
    /// Whether augmentation is applied at all during sample assembly.
    pub enabled: bool,
    /// Maximum absolute rotation in degrees; the angle is drawn uniformly
    /// from the symmetric range.
    pub rotation_range: f32,
    /// Minimum and maximum scale factor.
    pub scale_range: (f32, f32),
    /// Minimum and maximum brightness multiplier.
    pub brightness_range: (f32, f32),
    /// Minimum and maximum contrast multiplier.
    pub contrast_range: (f32, f32),
    /// Probability of mirroring the image left-right.
    pub horizontal_flip_prob: f32,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rotation_range: 10.0,
            scale_range: (0.9, 1.1),
            brightness_range: (0.85, 1.15),
            contrast_range: (0.85, 1.15),
            horizontal_flip_prob: 0.5,
        }
    }
}

/// Deterministic train/val/test partitioning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitSettings {
    /// Fraction of items assigned to the training set.
    pub train_ratio: f64,
    /// Fraction of items assigned to the validation set; the test set absorbs
    /// the remainder.
    pub val_ratio: f64,
    /// Seed for the shuffle permutation.
    pub seed: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            train_ratio: 0.70,
            val_ratio: 0.15,
            seed: 42,
        }
    }
}

/// Evaluation report parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    /// Pixel thresholds for the success detection rate, reported as
    /// `sdr_<t>px` percentages.
    pub sdr_thresholds: Vec<f64>,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            sdr_thresholds: vec![2.0, 4.0, 10.0, 20.0],
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent pipeline settings consumed by the CLI and training harness.
///
/// This struct aggregates all user-configurable parameters, allowing them to
/// be loaded from and saved to a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Optional override for the trained scoring model weights path.
    /// If `None`, a default path is used.
    pub model_path: Option<String>,
    /// The input grid dimensions for the scoring function.
    pub input: InputDimensions,
    /// The parameters for heatmap target encoding.
    pub heatmap: HeatmapSettings,
    /// The parameters for training-time augmentation.
    pub augmentation: AugmentationSettings,
    /// The parameters for dataset partitioning.
    pub split: SplitSettings,
    /// The parameters for the evaluation report.
    pub metrics: MetricsSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some("models/unet_landmarks.safetensors".into()),
            input: InputDimensions::default(),
            heatmap: HeatmapSettings::default(),
            augmentation: AugmentationSettings::default(),
            split: SplitSettings::default(),
            metrics: MetricsSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// If the file does not exist or cannot be parsed, an error is returned.
    /// If the `model_path` is missing from the JSON, it falls back to the default.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(AppSettings::default().model_path.unwrap());
        }

        settings.heatmap.validate()?;

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    ///
    /// This will overwrite the file if it already exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted pipeline settings (`config/cephnet.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/cephnet.json"))
        .unwrap_or_else(|_| PathBuf::from("config/cephnet.json"))
}
