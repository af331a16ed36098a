/*
 *  display/color.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  LED colors, per-LED color specs and the gradient resolver
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

use rand::Rng;
use thiserror::Error;

use crate::metrics::{MetricKey, MetricRanges, MetricsSnapshot};

/// One LED's color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LedColor {
    pub const OFF: LedColor = LedColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        LedColor { r, g, b }
    }

    /// Parse `rrggbb`, leading `#` allowed
    pub fn from_hex(s: &str) -> Result<Self, ColorSpecError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorSpecError::InvalidHex(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ColorSpecError::InvalidHex(s.to_string()))
        };
        Ok(LedColor::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn random() -> Self {
        let mut rng = rand::rng();
        LedColor::new(rng.random(), rng.random(), rng.random())
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Error parsing a color spec string from configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorSpecError {
    #[error("invalid hex color '{0}' (expected rrggbb)")]
    InvalidHex(String),
    #[error("unknown gradient driver '{0}'")]
    UnknownDriver(String),
    #[error("malformed color spec '{0}'")]
    Malformed(String),
}

/// What moves a gradient between its start and end color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDriver {
    Metric(MetricKey),
    Seconds,
    Minutes,
    Hours,
    /// Triangular wave over the configured cycle duration
    Cycle,
}

impl FromStr for GradientDriver {
    type Err = ColorSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seconds" => Ok(GradientDriver::Seconds),
            "minutes" => Ok(GradientDriver::Minutes),
            "hours" => Ok(GradientDriver::Hours),
            other => MetricKey::from_str(other)
                .map(GradientDriver::Metric)
                .map_err(|_| ColorSpecError::UnknownDriver(other.to_string())),
        }
    }
}

impl fmt::Display for GradientDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradientDriver::Metric(key) => write!(f, "{}", key),
            GradientDriver::Seconds => write!(f, "seconds"),
            GradientDriver::Minutes => write!(f, "minutes"),
            GradientDriver::Hours => write!(f, "hours"),
            GradientDriver::Cycle => Ok(()),
        }
    }
}

/// How one LED's color is derived
///
/// Config strings: `rrggbb`, `random`, `start-end-driver` or `start-end`
/// (the last one cycles back and forth over `cycle_duration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpec {
    Fixed(LedColor),
    Gradient {
        start: LedColor,
        end: LedColor,
        driver: GradientDriver,
    },
    Random,
}

impl Default for ColorSpec {
    fn default() -> Self {
        ColorSpec::Fixed(LedColor::new(0xff, 0xe0, 0x00))
    }
}

impl FromStr for ColorSpec {
    type Err = ColorSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(ColorSpec::Random);
        }
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [color] => Ok(ColorSpec::Fixed(LedColor::from_hex(color)?)),
            [start, end] => Ok(ColorSpec::Gradient {
                start: LedColor::from_hex(start)?,
                end: LedColor::from_hex(end)?,
                driver: GradientDriver::Cycle,
            }),
            [start, end, driver] => Ok(ColorSpec::Gradient {
                start: LedColor::from_hex(start)?,
                end: LedColor::from_hex(end)?,
                driver: driver.parse()?,
            }),
            _ => Err(ColorSpecError::Malformed(s.to_string())),
        }
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpec::Fixed(c) => write!(f, "{}", c),
            ColorSpec::Random => write!(f, "random"),
            ColorSpec::Gradient { start, end, driver: GradientDriver::Cycle } => {
                write!(f, "{}-{}", start, end)
            }
            ColorSpec::Gradient { start, end, driver } => write!(f, "{}-{}-{}", start, end, driver),
        }
    }
}

impl ColorSpec {
    /// Static color rule for indicator, unit and percent LEDs
    pub fn static_color(&self) -> LedColor {
        match self {
            ColorSpec::Fixed(c) => *c,
            ColorSpec::Gradient { start, .. } => *start,
            ColorSpec::Random => LedColor::random(),
        }
    }
}

/// Fraction of the way from `min` to `max`, clamped to 0..=1
///
/// A degenerate range gives 0 so the gradient sits on its start color.
pub fn gradient_fraction(value: f64, min: f64, max: f64) -> f64 {
    if max == min || !value.is_finite() {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Per-channel linear blend, rounded and clamped to 0..=255
pub fn interpolate(start: LedColor, end: LedColor, fraction: f64) -> LedColor {
    let t = fraction.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| -> u8 {
        let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
        v.round().clamp(0.0, 255.0) as u8
    };
    LedColor::new(mix(start.r, end.r), mix(start.g, end.g), mix(start.b, end.b))
}

/// Resolve a color spec against its driving value and range
pub fn resolve(spec: &ColorSpec, metric_value: f64, metric_min: f64, metric_max: f64) -> LedColor {
    match spec {
        ColorSpec::Fixed(c) => *c,
        ColorSpec::Random => LedColor::random(),
        ColorSpec::Gradient { start, end, .. } => {
            interpolate(*start, *end, gradient_fraction(metric_value, metric_min, metric_max))
        }
    }
}

/// Wall clock fields used by time driven gradients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockReading {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl ClockReading {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        ClockReading { hour, minute, second }
    }

    pub fn from_time<T: chrono::Timelike>(t: &T) -> Self {
        ClockReading::new(t.hour(), t.minute(), t.second())
    }
}

/// Everything a gradient may be driven by for one tick
#[derive(Debug, Clone, Copy)]
pub struct GradientInputs<'a> {
    pub metrics: &'a MetricsSnapshot,
    pub ranges: &'a MetricRanges,
    pub clock: ClockReading,
    /// Position in the back and forth cycle, 0..=1
    pub cycle_phase: f64,
}

impl GradientInputs<'_> {
    /// (value, min, max) for a driver; missing metrics sit at the range start
    fn driving_values(&self, driver: GradientDriver) -> (f64, f64, f64) {
        match driver {
            GradientDriver::Metric(key) => {
                let range = self.ranges.get(key);
                match self.metrics.get(key) {
                    Some(v) => (v, range.min, range.max),
                    None => (range.min, range.min, range.max),
                }
            }
            GradientDriver::Seconds => (f64::from(self.clock.second), 0.0, 59.0),
            GradientDriver::Minutes => (f64::from(self.clock.minute), 0.0, 59.0),
            GradientDriver::Hours => (f64::from(self.clock.hour), 0.0, 23.0),
            GradientDriver::Cycle => (self.cycle_phase, 0.0, 1.0),
        }
    }

    pub fn resolve(&self, spec: &ColorSpec) -> LedColor {
        match spec {
            ColorSpec::Gradient { driver, .. } => {
                let (value, min, max) = self.driving_values(*driver);
                resolve(spec, value, min, max)
            }
            _ => resolve(spec, 0.0, 0.0, 0.0),
        }
    }
}

/// One color per physical LED, resolved for the current tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<LedColor>,
    statics: Vec<LedColor>,
}

impl Palette {
    pub fn resolve(specs: &[ColorSpec], inputs: &GradientInputs<'_>) -> Self {
        Palette {
            colors: specs.iter().map(|s| inputs.resolve(s)).collect(),
            statics: specs.iter().map(ColorSpec::static_color).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Resolved color for a digit segment at a physical index
    pub fn color(&self, index: usize) -> LedColor {
        self.colors.get(index).copied().unwrap_or(LedColor::OFF)
    }

    /// Static color for a symbol LED at a physical index
    pub fn static_color(&self, index: usize) -> LedColor {
        self.statics.get(index).copied().unwrap_or(LedColor::OFF)
    }
}

/// The two palettes a scene can color sections with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palettes {
    pub metrics: Palette,
    pub time: Palette,
}
