/*
 *  display/mode_controller.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display mode scheduling: which scene is shown on each tick
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::display::color::ClockReading;
use crate::display::error::DisplayError;
use crate::display::frame::{PaletteKind, Scene, SectionView, TempField, UsageField};
use crate::display::layout::{LayoutMode, Section};
use crate::metrics::{MetricKey, MetricsSnapshot, TempUnit};

/// Upper bound on ticks per half cycle; keeps `counter * 2` and `cycle * 3` in range
pub const MAX_CYCLE_TICKS: u32 = u32::MAX / 4;

/// What the panel shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// CPU and GPU readings side by side
    #[default]
    Metrics,
    /// Hours and minutes on CPU, seconds on the GPU usage field
    Time,
    /// Metrics on CPU, clock on GPU
    TimeCpu,
    /// Clock on CPU, metrics on GPU
    TimeGpu,
    AlternateTime,
    AlternateTimeWithSeconds,
    /// Small panel: CPU temp, GPU temp, CPU usage, GPU usage in turn
    AlternateMetrics,
    CpuTemp,
    GpuTemp,
    CpuUsage,
    GpuUsage,
    /// Every LED on
    DebugUi,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 12] = [
        DisplayMode::Metrics,
        DisplayMode::Time,
        DisplayMode::TimeCpu,
        DisplayMode::TimeGpu,
        DisplayMode::AlternateTime,
        DisplayMode::AlternateTimeWithSeconds,
        DisplayMode::AlternateMetrics,
        DisplayMode::CpuTemp,
        DisplayMode::GpuTemp,
        DisplayMode::CpuUsage,
        DisplayMode::GpuUsage,
        DisplayMode::DebugUi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Metrics => "metrics",
            DisplayMode::Time => "time",
            DisplayMode::TimeCpu => "time_cpu",
            DisplayMode::TimeGpu => "time_gpu",
            DisplayMode::AlternateTime => "alternate_time",
            DisplayMode::AlternateTimeWithSeconds => "alternate_time_with_seconds",
            DisplayMode::AlternateMetrics => "alternate_metrics",
            DisplayMode::CpuTemp => "cpu_temp",
            DisplayMode::GpuTemp => "gpu_temp",
            DisplayMode::CpuUsage => "cpu_usage",
            DisplayMode::GpuUsage => "gpu_usage",
            DisplayMode::DebugUi => "debug_ui",
        }
    }

    /// Whether the mode can be drawn on a layout
    pub fn supports(&self, layout: LayoutMode) -> bool {
        use DisplayMode::*;
        match layout {
            LayoutMode::Big => matches!(
                self,
                Metrics | Time | TimeCpu | TimeGpu | AlternateTime | AlternateTimeWithSeconds | DebugUi
            ),
            LayoutMode::Small => matches!(
                self,
                AlternateMetrics | CpuTemp | GpuTemp | CpuUsage | GpuUsage | DebugUi
            ),
        }
    }

    /// Mode used when the configured one does not fit the layout
    pub fn fallback(layout: LayoutMode) -> DisplayMode {
        match layout {
            LayoutMode::Big => DisplayMode::Metrics,
            LayoutMode::Small => DisplayMode::AlternateMetrics,
        }
    }

    /// The mode itself, or the layout's fallback with a warning
    pub fn for_layout(self, layout: LayoutMode) -> DisplayMode {
        if self.supports(layout) {
            self
        } else {
            let fallback = Self::fallback(layout);
            log::warn!(
                "Display mode {} not compatible with {} layout, switching to {}",
                self, layout, fallback
            );
            fallback
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DisplayError::UnknownMode(s.to_string()))
    }
}

/// Configuration for display mode controller
#[derive(Debug, Clone, PartialEq)]
pub struct ModeControllerConfig {
    pub layout: LayoutMode,

    /// Mode as configured, before layout fallback
    pub mode: DisplayMode,

    /// Ticks per half cycle of the alternating modes
    pub cycle_ticks: u32,

    pub cpu_unit: TempUnit,
    pub gpu_unit: TempUnit,

    /// Digit test instead of the configured mode
    pub digit_test: bool,
}

impl Default for ModeControllerConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Big,
            mode: DisplayMode::Metrics,
            cycle_ticks: 50, // 5 s at 0.1 s per tick
            cpu_unit: TempUnit::Celsius,
            gpu_unit: TempUnit::Celsius,
            digit_test: false,
        }
    }
}

/// Display mode controller - turns mode, tick counter and readings into a scene
pub struct DisplayModeController {
    config: ModeControllerConfig,
    current_mode: DisplayMode,
    counter: u32,
}

impl DisplayModeController {
    /// Create a new display mode controller
    pub fn new(config: ModeControllerConfig) -> Self {
        let current_mode = config.mode.for_layout(config.layout);
        Self { config, current_mode, counter: 0 }
    }

    /// Apply a reloaded configuration, keeping the tick counter where possible
    pub fn reconfigure(&mut self, config: ModeControllerConfig) {
        if config == self.config {
            return;
        }
        let mode = config.mode.for_layout(config.layout);
        if mode != self.current_mode {
            log::info!("Display mode changed: {} -> {}", self.current_mode, mode);
        }
        self.current_mode = mode;
        self.config = config;
        self.counter %= self.period();
    }

    /// Mode actually shown after layout fallback
    pub fn current_mode(&self) -> DisplayMode {
        self.current_mode
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    fn cycle(&self) -> u32 {
        self.config.cycle_ticks.clamp(1, MAX_CYCLE_TICKS)
    }

    fn period(&self) -> u32 {
        self.cycle() * 2
    }

    /// Move to the next tick
    pub fn advance(&mut self) {
        self.counter = (self.counter + 1) % self.period();
    }

    /// Position of two-color cycling gradients: 0 at the cycle edges, 1 mid-cycle
    pub fn cycle_phase(&self) -> f64 {
        let cycle = f64::from(self.cycle());
        let half = cycle / 2.0;
        let position = f64::from(self.counter % self.cycle());
        (1.0 - (position - half).abs() / half).clamp(0.0, 1.0)
    }

    /// Scene for the current tick
    ///
    /// `metrics` must already be in each section's temperature unit and
    /// `epoch_secs` is only used by the digit test.
    pub fn scene(&self, metrics: &MetricsSnapshot, clock: ClockReading, epoch_secs: i64) -> Scene {
        if self.config.digit_test {
            return self.digit_test_scene(epoch_secs);
        }

        let cycle = self.cycle();
        let counter = self.counter;
        let cpu = || self.metrics_view(Section::Cpu, metrics);
        let gpu = || self.metrics_view(Section::Gpu, metrics);
        let clock_view = SectionView::clock(clock.hour, clock.minute);

        match self.current_mode {
            DisplayMode::Metrics => Scene::new(cpu(), gpu()),
            DisplayMode::Time => time_with_seconds(clock),
            DisplayMode::TimeCpu => Scene::new(cpu(), clock_view),
            DisplayMode::TimeGpu => Scene::new(clock_view, gpu()),
            DisplayMode::AlternateTime => {
                if counter < cycle {
                    Scene::new(clock_view, gpu())
                } else {
                    Scene::new(cpu(), clock_view)
                }
            }
            DisplayMode::AlternateTimeWithSeconds => {
                if counter < cycle {
                    time_with_seconds(clock)
                } else {
                    Scene::new(cpu(), gpu())
                }
            }
            DisplayMode::AlternateMetrics => {
                // quarters of the full period
                let twice = counter * 2;
                if twice < cycle {
                    self.single_field(Section::Cpu, true, metrics)
                } else if twice < cycle * 2 {
                    self.single_field(Section::Gpu, true, metrics)
                } else if twice < cycle * 3 {
                    self.single_field(Section::Cpu, false, metrics)
                } else {
                    self.single_field(Section::Gpu, false, metrics)
                }
            }
            DisplayMode::CpuTemp => self.single_field(Section::Cpu, true, metrics),
            DisplayMode::GpuTemp => self.single_field(Section::Gpu, true, metrics),
            DisplayMode::CpuUsage => self.single_field(Section::Cpu, false, metrics),
            DisplayMode::GpuUsage => self.single_field(Section::Gpu, false, metrics),
            DisplayMode::DebugUi => Scene::all_lit(),
        }
    }

    fn unit(&self, section: Section) -> TempUnit {
        match section {
            Section::Cpu => self.config.cpu_unit,
            Section::Gpu => self.config.gpu_unit,
        }
    }

    fn metrics_view(&self, section: Section, metrics: &MetricsSnapshot) -> SectionView {
        let (temp, usage) = keys(section);
        SectionView::metrics(metrics.whole(temp), self.unit(section), metrics.whole(usage))
    }

    /// One section showing only its temperature or only its usage
    fn single_field(&self, section: Section, temperature: bool, metrics: &MetricsSnapshot) -> Scene {
        let (temp_key, usage_key) = keys(section);
        let view = if temperature {
            SectionView {
                indicator: true,
                temp: TempField::Reading { value: metrics.whole(temp_key), unit: self.unit(section) },
                ..SectionView::default()
            }
        } else {
            SectionView {
                indicator: true,
                usage: UsageField::Percent(metrics.whole(usage_key)),
                ..SectionView::default()
            }
        };
        place(section, view)
    }

    /// 111, 222 .. 999 in turn, two seconds each
    fn digit_test_scene(&self, epoch_secs: i64) -> Scene {
        let digit = (epoch_secs.div_euclid(2).rem_euclid(9) + 1) as u32;
        let number = digit * 111;

        match self.config.layout {
            LayoutMode::Big => {
                let view = SectionView {
                    indicator: true,
                    temp: TempField::Reading { value: Some(number), unit: TempUnit::Celsius },
                    usage: UsageField::Percent(Some(digit * 11)),
                    palette: PaletteKind::Metrics,
                };
                Scene::new(view, view)
            }
            LayoutMode::Small => {
                // sections and fields take turns every four seconds
                let step = epoch_secs.div_euclid(4).rem_euclid(4);
                let section = if step % 2 == 0 { Section::Cpu } else { Section::Gpu };
                let view = if step < 2 {
                    SectionView {
                        indicator: true,
                        temp: TempField::Reading { value: Some(number), unit: TempUnit::Celsius },
                        ..SectionView::default()
                    }
                } else {
                    SectionView {
                        indicator: true,
                        usage: UsageField::Percent(Some(number)),
                        ..SectionView::default()
                    }
                };
                place(section, view)
            }
        }
    }
}

fn keys(section: Section) -> (MetricKey, MetricKey) {
    match section {
        Section::Cpu => (MetricKey::CpuTemp, MetricKey::CpuUsage),
        Section::Gpu => (MetricKey::GpuTemp, MetricKey::GpuUsage),
    }
}

fn place(section: Section, view: SectionView) -> Scene {
    match section {
        Section::Cpu => Scene::new(view, SectionView::default()),
        Section::Gpu => Scene::new(SectionView::default(), view),
    }
}

fn time_with_seconds(clock: ClockReading) -> Scene {
    let cpu = SectionView::clock(clock.hour, clock.minute);
    let gpu = SectionView {
        usage: UsageField::Clock(clock.second),
        palette: PaletteKind::Time,
        ..SectionView::default()
    };
    Scene::new(cpu, gpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(layout: LayoutMode, mode: DisplayMode, cycle_ticks: u32) -> DisplayModeController {
        DisplayModeController::new(ModeControllerConfig {
            layout,
            mode,
            cycle_ticks,
            ..ModeControllerConfig::default()
        })
    }

    fn sample() -> MetricsSnapshot {
        MetricsSnapshot::default()
            .with(MetricKey::CpuTemp, 55.4)
            .with(MetricKey::CpuUsage, 12.0)
            .with(MetricKey::GpuTemp, 61.0)
            .with(MetricKey::GpuUsage, 99.6)
    }

    const NOON: ClockReading = ClockReading { hour: 12, minute: 34, second: 56 };

    #[test]
    fn test_mode_parse() {
        assert_eq!("alternate_time_with_seconds".parse::<DisplayMode>().unwrap(), DisplayMode::AlternateTimeWithSeconds);
        assert!(matches!("rainbow".parse::<DisplayMode>(), Err(DisplayError::UnknownMode(_))));
        for mode in DisplayMode::ALL {
            assert_eq!(mode.to_string().parse::<DisplayMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_layout_fallback() {
        assert_eq!(controller(LayoutMode::Big, DisplayMode::CpuTemp, 10).current_mode(), DisplayMode::Metrics);
        assert_eq!(controller(LayoutMode::Small, DisplayMode::Time, 10).current_mode(), DisplayMode::AlternateMetrics);
        assert_eq!(controller(LayoutMode::Small, DisplayMode::DebugUi, 10).current_mode(), DisplayMode::DebugUi);
        assert_eq!(controller(LayoutMode::Big, DisplayMode::TimeGpu, 10).current_mode(), DisplayMode::TimeGpu);
    }

    #[test]
    fn test_metrics_scene() {
        let c = controller(LayoutMode::Big, DisplayMode::Metrics, 10);
        let scene = c.scene(&sample(), NOON, 0);
        assert_eq!(scene.cpu, SectionView::metrics(Some(55), TempUnit::Celsius, Some(12)));
        assert_eq!(scene.gpu, SectionView::metrics(Some(61), TempUnit::Celsius, Some(100)));
    }

    #[test]
    fn test_missing_metric_is_none() {
        let c = controller(LayoutMode::Big, DisplayMode::Metrics, 10);
        let scene = c.scene(&MetricsSnapshot::default(), NOON, 0);
        assert_eq!(scene.gpu.temp, TempField::Reading { value: None, unit: TempUnit::Celsius });
        assert_eq!(scene.gpu.usage, UsageField::Percent(None));
    }

    #[test]
    fn test_time_scene() {
        let c = controller(LayoutMode::Big, DisplayMode::Time, 10);
        let scene = c.scene(&sample(), NOON, 0);
        assert_eq!(scene.cpu.temp, TempField::Hours(12));
        assert_eq!(scene.cpu.usage, UsageField::Clock(34));
        assert_eq!(scene.gpu.temp, TempField::Blank);
        assert_eq!(scene.gpu.usage, UsageField::Clock(56));
        assert_eq!(scene.gpu.palette, PaletteKind::Time);
        assert!(!scene.cpu.indicator);
    }

    #[test]
    fn test_time_cpu_shows_clock_on_gpu() {
        let c = controller(LayoutMode::Big, DisplayMode::TimeCpu, 10);
        let scene = c.scene(&sample(), NOON, 0);
        assert_eq!(scene.gpu, SectionView::clock(12, 34));
        assert!(scene.cpu.indicator);
    }

    #[test]
    fn test_alternate_time_halves() {
        let mut c = controller(LayoutMode::Big, DisplayMode::AlternateTime, 3);
        let mut first = Vec::new();
        for _ in 0..6 {
            first.push(c.scene(&sample(), NOON, 0).cpu.palette);
            c.advance();
        }
        use PaletteKind::*;
        assert_eq!(first, vec![Time, Time, Time, Metrics, Metrics, Metrics]);
        // wrapped back to the start
        assert_eq!(c.counter(), 0);
    }

    #[test]
    fn test_alternate_metrics_quarters() {
        let mut c = controller(LayoutMode::Small, DisplayMode::AlternateMetrics, 4);
        let mut seen = Vec::new();
        for _ in 0..8 {
            let scene = c.scene(&sample(), NOON, 0);
            let cpu_side = scene.cpu.indicator;
            let temp = scene.cpu.temp != TempField::Blank || scene.gpu.temp != TempField::Blank;
            seen.push((cpu_side, temp));
            c.advance();
        }
        assert_eq!(
            seen,
            vec![
                (true, true), (true, true),
                (false, true), (false, true),
                (true, false), (true, false),
                (false, false), (false, false),
            ]
        );
    }

    #[test]
    fn test_cycle_phase_triangle() {
        let mut c = controller(LayoutMode::Big, DisplayMode::Metrics, 4);
        let mut phases = Vec::new();
        for _ in 0..8 {
            phases.push(c.cycle_phase());
            c.advance();
        }
        assert_eq!(phases, vec![0.0, 0.5, 1.0, 0.5, 0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_reconfigure_wraps_counter() {
        let mut c = controller(LayoutMode::Big, DisplayMode::Metrics, 10);
        for _ in 0..15 {
            c.advance();
        }
        c.reconfigure(ModeControllerConfig { cycle_ticks: 2, ..ModeControllerConfig::default() });
        assert!(c.counter() < 4);
    }

    #[test]
    fn test_digit_test_big() {
        let c = DisplayModeController::new(ModeControllerConfig { digit_test: true, ..ModeControllerConfig::default() });
        // epoch 4 -> third step -> 333 / 33
        let scene = c.scene(&MetricsSnapshot::default(), NOON, 4);
        assert_eq!(scene.cpu.temp, TempField::Reading { value: Some(333), unit: TempUnit::Celsius });
        assert_eq!(scene.gpu.usage, UsageField::Percent(Some(33)));
    }

    #[test]
    fn test_digit_test_small_rotates() {
        let c = DisplayModeController::new(ModeControllerConfig {
            layout: LayoutMode::Small,
            digit_test: true,
            ..ModeControllerConfig::default()
        });
        let scene = c.scene(&MetricsSnapshot::default(), NOON, 4);
        assert!(scene.gpu.indicator);
        assert!(matches!(scene.gpu.temp, TempField::Reading { .. }));
        let scene = c.scene(&MetricsSnapshot::default(), NOON, 8);
        assert!(scene.cpu.indicator);
        assert_eq!(scene.cpu.usage, UsageField::Percent(Some(555)));
    }

    #[test]
    fn test_huge_cycle_ticks_do_not_overflow() {
        for mode in [DisplayMode::Metrics, DisplayMode::AlternateTime] {
            let mut c = controller(LayoutMode::Big, mode, u32::MAX);
            c.advance();
            c.advance();
            assert_eq!(c.counter(), 2);
            let _ = c.scene(&sample(), NOON, 0);
            assert!(c.cycle_phase() >= 0.0);
        }
        let mut c = controller(LayoutMode::Small, DisplayMode::AlternateMetrics, u32::MAX);
        c.advance();
        let _ = c.scene(&sample(), NOON, 0);
    }

    #[test]
    fn test_small_scenes_always_assemble() {
        use crate::display::color::{ColorSpec, GradientInputs, LedColor, Palette, Palettes};
        use crate::display::frame::Assembler;
        use crate::metrics::MetricRanges;

        let metrics = sample();
        let ranges = MetricRanges::default();
        let inputs = GradientInputs { metrics: &metrics, ranges: &ranges, clock: NOON, cycle_phase: 0.0 };
        let palette = Palette::resolve(&vec![ColorSpec::Fixed(LedColor::new(1, 2, 3)); LayoutMode::Small.led_count()], &inputs);
        let palettes = Palettes { metrics: palette.clone(), time: palette };
        let assembler = Assembler::new(LayoutMode::Small);

        for mode in DisplayMode::ALL {
            let mut c = controller(LayoutMode::Small, mode, 4);
            for tick in 0..8 {
                let scene = c.scene(&metrics, NOON, i64::from(tick) * 4);
                assert!(assembler.assemble(&scene, &palettes).is_ok(), "{} at tick {}", mode, tick);
                c.advance();
            }
        }

        let test = DisplayModeController::new(ModeControllerConfig {
            layout: LayoutMode::Small,
            digit_test: true,
            ..ModeControllerConfig::default()
        });
        for epoch in 0..32 {
            assert!(assembler.assemble(&test.scene(&metrics, NOON, epoch), &palettes).is_ok());
        }
    }
}
