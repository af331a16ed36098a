/*
 *  metrics.rs
 *
 *  digilcd - every digit counts
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! CPU/GPU telemetry gathered from sysinfo, /sys and vendor tools.
//!
//! Each metric group is served by a ranked chain of sources; the first one
//! that answers its probe is kept for the life of the process.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sysinfo::{Components, System};
use thiserror::Error;

/// Named metric the display knows how to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    CpuTemp,
    CpuUsage,
    GpuTemp,
    GpuUsage,
}

impl MetricKey {
    pub const ALL: [MetricKey; 4] = [
        MetricKey::CpuTemp,
        MetricKey::CpuUsage,
        MetricKey::GpuTemp,
        MetricKey::GpuUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::CpuTemp => "cpu_temp",
            MetricKey::CpuUsage => "cpu_usage",
            MetricKey::GpuTemp => "gpu_temp",
            MetricKey::GpuUsage => "gpu_usage",
        }
    }

    pub fn is_temperature(&self) -> bool {
        matches!(self, MetricKey::CpuTemp | MetricKey::GpuTemp)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MetricsError::UnknownMetric(s.to_string()))
    }
}

/// Temperature unit shown on a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    pub fn from_celsius(&self, celsius: f64) -> f64 {
        match self {
            TempUnit::Celsius => celsius,
            TempUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Metric values sampled at one instant; a missing key means unavailable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    values: BTreeMap<MetricKey, f64>,
}

impl MetricsSnapshot {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn set(&mut self, key: MetricKey, value: f64) {
        if value.is_finite() {
            self.values.insert(key, value);
        }
    }

    pub fn with(mut self, key: MetricKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    /// Rounded non-negative whole value for digit rendering
    pub fn whole(&self, key: MetricKey) -> Option<u32> {
        self.get(key).map(|v| v.round().max(0.0) as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Copy with temperatures converted from Celsius to each section's unit
    pub fn in_units(&self, cpu: TempUnit, gpu: TempUnit) -> MetricsSnapshot {
        let mut out = self.clone();
        if let Some(t) = self.get(MetricKey::CpuTemp) {
            out.set(MetricKey::CpuTemp, cpu.from_celsius(t));
        }
        if let Some(t) = self.get(MetricKey::GpuTemp) {
            out.set(MetricKey::GpuTemp, gpu.from_celsius(t));
        }
        out
    }
}

/// Gradient range for one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub fn new(min: f64, max: f64) -> Self {
        MetricRange { min, max }
    }
}

/// Gradient ranges for every metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRanges {
    pub cpu_temp: MetricRange,
    pub cpu_usage: MetricRange,
    pub gpu_temp: MetricRange,
    pub gpu_usage: MetricRange,
}

impl Default for MetricRanges {
    fn default() -> Self {
        MetricRanges {
            cpu_temp: MetricRange::new(30.0, 90.0),
            cpu_usage: MetricRange::new(0.0, 100.0),
            gpu_temp: MetricRange::new(30.0, 90.0),
            gpu_usage: MetricRange::new(0.0, 100.0),
        }
    }
}

impl MetricRanges {
    pub fn get(&self, key: MetricKey) -> MetricRange {
        match key {
            MetricKey::CpuTemp => self.cpu_temp,
            MetricKey::CpuUsage => self.cpu_usage,
            MetricKey::GpuTemp => self.gpu_temp,
            MetricKey::GpuUsage => self.gpu_usage,
        }
    }
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0} unavailable")]
    Unavailable(&'static str),
    #[error("command failed: {0}")]
    Command(String),
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
}

/// One way of reading some metrics
pub trait MetricsSource: Send {
    fn name(&self) -> &'static str;

    /// Sample into `out`; only the keys this source knows are written
    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError>;

    /// Can this source deliver on this machine?
    fn probe(&mut self) -> bool {
        let mut scratch = MetricsSnapshot::default();
        self.sample(&mut scratch).is_ok() && !scratch.is_empty()
    }
}

/// Ranked list of sources; the first that probes successfully is kept
pub struct ProviderChain {
    label: &'static str,
    sources: Vec<Box<dyn MetricsSource>>,
    active: Option<usize>,
    exhausted: bool,
}

impl ProviderChain {
    pub fn new(label: &'static str, sources: Vec<Box<dyn MetricsSource>>) -> Self {
        ProviderChain { label, sources, active: None, exhausted: false }
    }

    /// Name of the chosen source, once one has been chosen
    pub fn active_name(&self) -> Option<&'static str> {
        self.active.map(|i| self.sources[i].name())
    }

    fn select(&mut self) -> Option<usize> {
        if self.active.is_some() || self.exhausted {
            return self.active;
        }
        for (i, source) in self.sources.iter_mut().enumerate() {
            if source.probe() {
                info!("{} metrics from {}", self.label, source.name());
                self.active = Some(i);
                return self.active;
            }
            debug!("{} source {} not available", self.label, source.name());
        }
        warn!("No working {} metrics source, values will be blank", self.label);
        self.exhausted = true;
        None
    }

    pub fn sample(&mut self, out: &mut MetricsSnapshot) {
        let Some(i) = self.select() else { return };
        let source = &mut self.sources[i];
        if let Err(e) = source.sample(out) {
            debug!("{} sample from {} failed: {}", self.label, source.name(), e);
        }
    }
}

/// Something the display manager can pull a snapshot from each tick
pub trait Telemetry {
    fn snapshot(&mut self) -> MetricsSnapshot;

    fn set_refresh_interval(&mut self, _interval: Duration) {}
}

/// Fixed snapshot, for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry(pub MetricsSnapshot);

impl Telemetry for StaticTelemetry {
    fn snapshot(&mut self) -> MetricsSnapshot {
        self.0.clone()
    }
}

const SNAPSHOT_KEY: &str = "snapshot";

/// Samples all chains, holding the result for the refresh interval
pub struct MetricsCollector {
    chains: Vec<ProviderChain>,
    cache: Cache<&'static str, MetricsSnapshot>,
    interval: Duration,
}

impl MetricsCollector {
    pub fn new(chains: Vec<ProviderChain>, interval: Duration) -> Self {
        MetricsCollector { chains, cache: Self::build_cache(interval), interval }
    }

    /// Default ranked sources for a Linux host
    pub fn system(interval: Duration) -> Self {
        let cpu_usage = ProviderChain::new("CPU usage", vec![Box::new(SysinfoCpuUsage::new())]);
        let cpu_temp = ProviderChain::new(
            "CPU temperature",
            vec![
                Box::new(ComponentTemp::new(
                    MetricKey::CpuTemp,
                    &["k10temp", "coretemp", "package", "tctl", "cpu"],
                )),
                Box::new(ThermalZone::new("/sys/class/thermal/thermal_zone0/temp")),
            ],
        );
        let gpu = ProviderChain::new(
            "GPU",
            vec![
                Box::new(NvidiaSmi),
                Box::new(AmdSysfs::new("/sys/class/drm")),
                Box::new(ComponentTemp::new(MetricKey::GpuTemp, &["amdgpu", "nouveau", "gpu"])),
            ],
        );
        MetricsCollector::new(vec![cpu_usage, cpu_temp, gpu], interval)
    }

    fn build_cache(interval: Duration) -> Cache<&'static str, MetricsSnapshot> {
        Cache::builder()
            .max_capacity(1)
            .time_to_live(interval.max(Duration::from_millis(1)))
            .build()
    }

    fn sample_all(&mut self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for chain in self.chains.iter_mut() {
            chain.sample(&mut snapshot);
        }
        snapshot
    }
}

impl Telemetry for MetricsCollector {
    fn snapshot(&mut self) -> MetricsSnapshot {
        if let Some(cached) = self.cache.get(&SNAPSHOT_KEY) {
            return cached;
        }
        let fresh = self.sample_all();
        self.cache.insert(SNAPSHOT_KEY, fresh.clone());
        fresh
    }

    fn set_refresh_interval(&mut self, interval: Duration) {
        if interval != self.interval {
            debug!("Metrics refresh interval now {:?}", interval);
            self.interval = interval;
            self.cache = Self::build_cache(interval);
        }
    }
}

/// Reads the first whitespace separated float in a file
fn read_first_float(path: &Path) -> Result<f64, MetricsError> {
    let content = fs::read_to_string(path)?;
    let first_word = content.split_whitespace().next().unwrap_or("");
    first_word
        .parse::<f64>()
        .map_err(|e| MetricsError::Parse(format!("{}: {}", path.display(), e)))
}

/// Global CPU utilization from sysinfo
pub struct SysinfoCpuUsage {
    sys: System,
}

impl SysinfoCpuUsage {
    /// Takes the baseline sample so the first reading is a real delta
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        SysinfoCpuUsage { sys }
    }
}

impl Default for SysinfoCpuUsage {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoCpuUsage {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(MetricsError::Unavailable("cpu list"));
        }
        out.set(MetricKey::CpuUsage, f64::from(self.sys.global_cpu_usage()));
        Ok(())
    }
}

/// First hardware sensor whose label matches one of `labels`
pub struct ComponentTemp {
    key: MetricKey,
    labels: &'static [&'static str],
    components: Components,
}

impl ComponentTemp {
    pub fn new(key: MetricKey, labels: &'static [&'static str]) -> Self {
        ComponentTemp { key, labels, components: Components::new_with_refreshed_list() }
    }
}

impl MetricsSource for ComponentTemp {
    fn name(&self) -> &'static str {
        "sysinfo components"
    }

    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError> {
        self.components.refresh();
        let found = self.labels.iter().find_map(|wanted| {
            self.components
                .iter()
                .find(|c| c.label().to_lowercase().contains(wanted))
        });
        match found {
            Some(c) if c.temperature().is_finite() && c.temperature() > 0.0 => {
                out.set(self.key, f64::from(c.temperature()));
                Ok(())
            }
            _ => Err(MetricsError::Unavailable("matching sensor")),
        }
    }
}

/// Kernel thermal zone, value in millidegrees Celsius
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ThermalZone { path: path.into() }
    }
}

impl MetricsSource for ThermalZone {
    fn name(&self) -> &'static str {
        "thermal zone"
    }

    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError> {
        let millideg = read_first_float(&self.path)?;
        out.set(MetricKey::CpuTemp, millideg / 1000.0);
        Ok(())
    }
}

/// NVIDIA GPUs through `nvidia-smi`
pub struct NvidiaSmi;

impl NvidiaSmi {
    /// Parse `temperature, utilization` from the first GPU line
    pub fn parse(stdout: &str) -> Result<(f64, f64), MetricsError> {
        let line = stdout
            .lines()
            .next()
            .ok_or_else(|| MetricsError::Parse("empty nvidia-smi output".into()))?;
        let mut fields = line.split(',').map(|f| f.trim().parse::<f64>());
        match (fields.next(), fields.next()) {
            (Some(Ok(temp)), Some(Ok(usage))) => Ok((temp, usage)),
            _ => Err(MetricsError::Parse(format!("unexpected nvidia-smi line '{}'", line))),
        }
    }
}

impl MetricsSource for NvidiaSmi {
    fn name(&self) -> &'static str {
        "nvidia-smi"
    }

    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=temperature.gpu,utilization.gpu",
                "--format=csv,noheader,nounits",
            ])
            .output()?;
        if !output.status.success() {
            return Err(MetricsError::Command(format!("nvidia-smi exited with {}", output.status)));
        }
        let (temp, usage) = Self::parse(&String::from_utf8_lossy(&output.stdout))?;
        out.set(MetricKey::GpuTemp, temp);
        out.set(MetricKey::GpuUsage, usage);
        Ok(())
    }
}

/// AMD GPUs through the amdgpu sysfs files
pub struct AmdSysfs {
    drm_root: PathBuf,
    device: Option<PathBuf>,
}

impl AmdSysfs {
    pub fn new(drm_root: impl Into<PathBuf>) -> Self {
        AmdSysfs { drm_root: drm_root.into(), device: None }
    }

    fn find_device(&self) -> Option<PathBuf> {
        let mut cards: Vec<PathBuf> = fs::read_dir(&self.drm_root)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path().join("device"))
            .filter(|p| p.join("gpu_busy_percent").exists())
            .collect();
        cards.sort();
        cards.into_iter().next()
    }

    fn hwmon_temp(device: &Path) -> Option<f64> {
        let hwmons = fs::read_dir(device.join("hwmon")).ok()?;
        hwmons
            .filter_map(|e| e.ok())
            .find_map(|e| read_first_float(&e.path().join("temp1_input")).ok())
            .map(|millideg| millideg / 1000.0)
    }
}

impl MetricsSource for AmdSysfs {
    fn name(&self) -> &'static str {
        "amdgpu sysfs"
    }

    fn sample(&mut self, out: &mut MetricsSnapshot) -> Result<(), MetricsError> {
        if self.device.is_none() {
            self.device = self.find_device();
        }
        let device = self.device.as_ref().ok_or(MetricsError::Unavailable("amdgpu device"))?;
        out.set(MetricKey::GpuUsage, read_first_float(&device.join("gpu_busy_percent"))?);
        if let Some(temp) = Self::hwmon_temp(device) {
            out.set(MetricKey::GpuTemp, temp);
        }
        Ok(())
    }
}
