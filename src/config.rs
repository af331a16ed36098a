use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{env, fs, path::{Path, PathBuf}, time::{Duration, SystemTime}};
use thiserror::Error;

use crate::display::color::{ColorSpec, ColorSpecError};
use crate::display::error::DisplayError;
use crate::display::layout::LayoutMode;
use crate::display::mode_controller::{DisplayMode, ModeControllerConfig, MAX_CYCLE_TICKS};
use crate::metrics::{MetricRange, MetricRanges, TempUnit};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "DIGILCD_CONFIG";

const DEFAULT_VENDOR_ID: u16 = 0x0416;
const DEFAULT_PRODUCT_ID: u16 = 0x8001;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Color error: {0}")]
    Color(#[from] ColorSpecError),
    #[error("{0}")]
    Display(#[from] DisplayError),
}

/// USB id, written either as a number or a hex string ("0x0416")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsbId {
    Number(u16),
    Text(String),
}

impl UsbId {
    pub fn value(&self) -> Result<u16, ConfigError> {
        match self {
            UsbId::Number(n) => Ok(*n),
            UsbId::Text(s) => parse_hex_id(s),
        }
    }
}

/// Parse "0x0416", "0X0416" or "0416" as hex
pub fn parse_hex_id(s: &str) -> Result<u16, ConfigError> {
    let t = s.trim();
    let digits = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);
    u16::from_str_radix(digits, 16)
        .map_err(|_| ConfigError::Validation(format!("invalid USB id '{}'", s)))
}

/// Top-level app configuration, every key optional so files and CLI can layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub layout_mode: Option<String>,   // "big" | "small"
    pub display_mode: Option<String>,
    pub vendor_id: Option<UsbId>,
    pub product_id: Option<UsbId>,
    /// seconds between frames
    pub update_interval: Option<f64>,
    /// seconds a metrics sample stays fresh
    pub metrics_update_interval: Option<f64>,
    /// seconds per half cycle of the alternating modes
    pub cycle_duration: Option<f64>,
    pub cpu_temperature_unit: Option<TempUnit>,
    pub gpu_temperature_unit: Option<TempUnit>,
    pub cpu_min_temp: Option<f64>,
    pub cpu_max_temp: Option<f64>,
    pub gpu_min_temp: Option<f64>,
    pub gpu_max_temp: Option<f64>,
    pub cpu_min_usage: Option<f64>,
    pub cpu_max_usage: Option<f64>,
    pub gpu_min_usage: Option<f64>,
    pub gpu_max_usage: Option<f64>,
    pub metrics: Option<PaletteConfig>,
    pub time: Option<PaletteConfig>,
}

/// One color spec string per LED
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PaletteConfig {
    pub colors: Option<Vec<String>>,
}

/// CLI overrides. All fields are Options so we can layer them over the file.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "digilcd", about = "Seven-segment telemetry display driver", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML or JSON config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// shorthand for --log-level debug
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub layout_mode: Option<String>,
    #[arg(long)]
    pub display_mode: Option<String>,
    /// cycle 111, 222 .. 999 on every digit
    #[arg(long, action = ArgAction::SetTrue)]
    pub test: bool,
    /// log packets instead of opening the device
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: locate the file, read, merge, validate.
///
/// Returns the effective config and the file it came from, if any.
pub fn load(cli: &Cli) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let path = match cli.config.as_ref() {
        Some(p) if p.exists() => Some(p.clone()),
        Some(p) => {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        None => find_config_file(),
    };
    let cfg = build(cli, path.as_deref())?;
    Ok((cfg, path))
}

/// defaults, then the file, then CLI overrides (highest precedence)
fn build(cli: &Cli, path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    if let Some(p) = path {
        let file = read_config(p)?;
        merge(&mut cfg, file);
    }
    apply_cli_overrides(&mut cfg, cli);
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Ok(p) = env::var(CONFIG_ENV) {
        let p = PathBuf::from(p);
        if p.exists() { return Some(p) }
        log::warn!("{} points at missing file {}", CONFIG_ENV, p.display());
    }
    // XDG-style: ~/.config/digilcd/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/digilcd/config.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["digilcd.yaml", "config.yaml", "config.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

/// JSON when the extension says so, YAML otherwise
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let cfg: Config = if is_json {
        serde_json::from_str(&s)?
    } else {
        serde_yaml::from_str(&s)?
    };
    Ok(cfg)
}

/// Pretty YAML of an effective config (nice for debugging)
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    macro_rules! take {
        ($($field:ident),* $(,)?) => {
            $( if src.$field.is_some() { dst.$field = src.$field; } )*
        };
    }
    take!(
        log_level, layout_mode, display_mode, vendor_id, product_id,
        update_interval, metrics_update_interval, cycle_duration,
        cpu_temperature_unit, gpu_temperature_unit,
        cpu_min_temp, cpu_max_temp, gpu_min_temp, gpu_max_temp,
        cpu_min_usage, cpu_max_usage, gpu_min_usage, gpu_max_usage,
        metrics, time,
    );
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()     { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                   { cfg.log_level = Some("debug".to_string()); }
    if cli.layout_mode.is_some()   { cfg.layout_mode = cli.layout_mode.clone(); }
    if cli.display_mode.is_some()  { cfg.display_mode = cli.display_mode.clone(); }
}

/// Put any invariants here (required fields, ranges, etc.)
/// Shortest accepted interval, in seconds
pub const MIN_INTERVAL_SECS: f64 = 0.001;
/// Longest accepted interval, in seconds (one day)
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let intervals = [
        ("update_interval", cfg.update_interval),
        ("metrics_update_interval", cfg.metrics_update_interval),
        ("cycle_duration", cfg.cycle_duration),
    ];
    for (name, value) in intervals {
        if let Some(v) = value {
            if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&v) {
                return Err(ConfigError::Validation(format!(
                    "{} must be between {} and {} seconds, got {}",
                    name, MIN_INTERVAL_SECS, MAX_INTERVAL_SECS, v
                )));
            }
        }
    }

    let ranges = [
        ("cpu temp", cfg.cpu_min_temp, cfg.cpu_max_temp),
        ("gpu temp", cfg.gpu_min_temp, cfg.gpu_max_temp),
        ("cpu usage", cfg.cpu_min_usage, cfg.cpu_max_usage),
        ("gpu usage", cfg.gpu_min_usage, cfg.gpu_max_usage),
    ];
    for (name, min, max) in ranges {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ConfigError::Validation(format!("{} min {} above max {}", name, lo, hi)));
            }
        }
    }
    Ok(())
}

/// Immutable snapshot the display runs from, rebuilt on every reload
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub layout: LayoutMode,
    pub display_mode: DisplayMode,
    pub vendor_id: u16,
    pub product_id: u16,
    pub update_interval: Duration,
    pub metrics_update_interval: Duration,
    pub cycle_duration: Duration,
    pub cpu_unit: TempUnit,
    pub gpu_unit: TempUnit,
    pub ranges: MetricRanges,
    pub metrics_colors: Vec<ColorSpec>,
    pub time_colors: Vec<ColorSpec>,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        validate(cfg)?;

        let layout: LayoutMode = cfg.layout_mode.as_deref().unwrap_or("big").parse()?;
        let display_mode: DisplayMode = cfg.display_mode.as_deref().unwrap_or("metrics").parse()?;
        let n = layout.led_count();
        let defaults = MetricRanges::default();
        let range = |min: Option<f64>, max: Option<f64>, d: MetricRange| {
            MetricRange::new(min.unwrap_or(d.min), max.unwrap_or(d.max))
        };

        Ok(Settings {
            layout,
            display_mode,
            vendor_id: cfg.vendor_id.as_ref().map_or(Ok(DEFAULT_VENDOR_ID), UsbId::value)?,
            product_id: cfg.product_id.as_ref().map_or(Ok(DEFAULT_PRODUCT_ID), UsbId::value)?,
            update_interval: seconds("update_interval", cfg.update_interval.unwrap_or(0.1))?,
            metrics_update_interval: seconds("metrics_update_interval", cfg.metrics_update_interval.unwrap_or(0.5))?,
            cycle_duration: seconds("cycle_duration", cfg.cycle_duration.unwrap_or(5.0))?,
            cpu_unit: cfg.cpu_temperature_unit.unwrap_or_default(),
            gpu_unit: cfg.gpu_temperature_unit.unwrap_or_default(),
            ranges: MetricRanges {
                cpu_temp: range(cfg.cpu_min_temp, cfg.cpu_max_temp, defaults.cpu_temp),
                cpu_usage: range(cfg.cpu_min_usage, cfg.cpu_max_usage, defaults.cpu_usage),
                gpu_temp: range(cfg.gpu_min_temp, cfg.gpu_max_temp, defaults.gpu_temp),
                gpu_usage: range(cfg.gpu_min_usage, cfg.gpu_max_usage, defaults.gpu_usage),
            },
            metrics_colors: palette_specs("metrics", cfg.metrics.as_ref(), n)?,
            time_colors: palette_specs("time", cfg.time.as_ref(), n)?,
        })
    }

    /// Ticks per half cycle, at least one
    pub fn cycle_ticks(&self) -> u32 {
        let ticks = self.cycle_duration.as_secs_f64() / self.update_interval.as_secs_f64();
        (ticks as u32).clamp(1, MAX_CYCLE_TICKS)
    }

    pub fn mode_config(&self, digit_test: bool) -> ModeControllerConfig {
        ModeControllerConfig {
            layout: self.layout,
            mode: self.display_mode,
            cycle_ticks: self.cycle_ticks(),
            cpu_unit: self.cpu_unit,
            gpu_unit: self.gpu_unit,
            digit_test,
        }
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Validation(format!("{} is not a usable duration: {}", name, e)))
}

/// Parse a palette; absent means the default color on every LED
fn palette_specs(name: &str, palette: Option<&PaletteConfig>, n: usize) -> Result<Vec<ColorSpec>, ConfigError> {
    let Some(colors) = palette.and_then(|p| p.colors.as_ref()) else {
        return Ok(vec![ColorSpec::default(); n]);
    };
    if colors.len() != n {
        return Err(ConfigError::Validation(format!(
            "{}.colors has {} entries, layout needs {}",
            name,
            colors.len(),
            n
        )));
    }
    colors
        .iter()
        .map(|c| c.parse::<ColorSpec>().map_err(ConfigError::from))
        .collect()
}

/// Re-reads the config file when its modification time moves
#[derive(Debug)]
pub struct ConfigWatcher {
    cli: Cli,
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(cli: Cli, path: Option<PathBuf>) -> Self {
        let modified = path.as_deref().and_then(modified_time);
        ConfigWatcher { cli, path, modified }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `None` while unchanged, otherwise the outcome of re-reading the file
    pub fn poll(&mut self) -> Option<Result<Settings, ConfigError>> {
        let path = self.path.as_deref()?;
        let modified = modified_time(path);
        if modified == self.modified {
            return None;
        }
        self.modified = modified;
        log::info!("Config file {} changed, reloading", path.display());
        Some(build(&self.cli, Some(path)).and_then(|cfg| Settings::from_config(&cfg)))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
