/*
 *  display/layout.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Static LED tables per hardware variant and the physical index map
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

use super::error::DisplayError;
use super::segment::SEGMENTS_PER_DIGIT;

/// LED count of the full CPU + GPU panel
pub const BIG_LED_COUNT: usize = 84;

/// LED count of the single digit-frame panel
pub const SMALL_LED_COUNT: usize = 31;

/// Hardware variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Big,
    Small,
}

impl LayoutMode {
    pub fn led_count(&self) -> usize {
        self.table().led_count
    }

    pub fn table(&self) -> &'static LayoutTable {
        match self {
            LayoutMode::Big => &BIG_LAYOUT,
            LayoutMode::Small => &SMALL_LAYOUT,
        }
    }
}

impl FromStr for LayoutMode {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" => Ok(LayoutMode::Big),
            "small" => Ok(LayoutMode::Small),
            other => Err(DisplayError::UnknownLayout(other.to_string())),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::Big => write!(f, "big"),
            LayoutMode::Small => write!(f, "small"),
        }
    }
}

/// Half of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Cpu,
    Gpu,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Cpu, Section::Gpu];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Cpu => write!(f, "cpu"),
            Section::Gpu => write!(f, "gpu"),
        }
    }
}

/// Segment order of a digit cluster as wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// Physical index grows in canonical segment order
    Ascending,
    /// The 7 LEDs of the cluster are wired in reverse
    Mirrored,
}

/// One digit cluster: its first physical LED and its wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitSlot {
    pub start: usize,
    pub wiring: Wiring,
}

impl DigitSlot {
    const fn up(start: usize) -> Self {
        DigitSlot { start, wiring: Wiring::Ascending }
    }

    const fn mirrored(start: usize) -> Self {
        DigitSlot { start, wiring: Wiring::Mirrored }
    }

    /// Physical index of every canonical segment
    pub fn physical(&self) -> [usize; SEGMENTS_PER_DIGIT] {
        let mut out = [0; SEGMENTS_PER_DIGIT];
        for (segment, slot) in out.iter_mut().enumerate() {
            *slot = match self.wiring {
                Wiring::Ascending => self.start + segment,
                Wiring::Mirrored => self.start + (SEGMENTS_PER_DIGIT - 1 - segment),
            };
        }
        out
    }
}

/// Where one section's LEDs sit
#[derive(Debug)]
pub struct SectionTable {
    pub indicator: &'static [usize],
    pub temp_digits: &'static [DigitSlot],
    pub celsius: &'static [usize],
    pub fahrenheit: &'static [usize],
    /// Leading "1" of usage values from 100; empty when the panel has none
    pub usage_overflow: &'static [usize],
    pub usage_digits: &'static [DigitSlot],
    pub percent: &'static [usize],
}

/// Whole panel description
#[derive(Debug)]
pub struct LayoutTable {
    pub led_count: usize,
    pub cpu: SectionTable,
    pub gpu: SectionTable,
}

impl LayoutTable {
    pub fn section(&self, section: Section) -> &SectionTable {
        match section {
            Section::Cpu => &self.cpu,
            Section::Gpu => &self.gpu,
        }
    }
}

const GPU: usize = 42;

pub static BIG_LAYOUT: LayoutTable = LayoutTable {
    led_count: BIG_LED_COUNT,
    cpu: SectionTable {
        indicator: &[0, 1],
        temp_digits: &[DigitSlot::up(2), DigitSlot::up(9), DigitSlot::up(16)],
        celsius: &[23],
        fahrenheit: &[24],
        usage_overflow: &[25, 26],
        usage_digits: &[DigitSlot::up(27), DigitSlot::up(34)],
        percent: &[41],
    },
    gpu: SectionTable {
        indicator: &[GPU, GPU + 1],
        temp_digits: &[
            DigitSlot::mirrored(GPU + 2),
            DigitSlot::mirrored(GPU + 9),
            DigitSlot::mirrored(GPU + 16),
        ],
        celsius: &[GPU + 23],
        fahrenheit: &[GPU + 24],
        usage_overflow: &[GPU + 25, GPU + 26],
        usage_digits: &[DigitSlot::mirrored(GPU + 27), DigitSlot::mirrored(GPU + 34)],
        percent: &[GPU + 41],
    },
};

// both sections share the one digit frame and symbols
const SMALL_FRAME: &[DigitSlot] = &[DigitSlot::up(4), DigitSlot::up(11), DigitSlot::up(18)];

pub static SMALL_LAYOUT: LayoutTable = LayoutTable {
    led_count: SMALL_LED_COUNT,
    cpu: SectionTable {
        indicator: &[0, 1],
        temp_digits: SMALL_FRAME,
        celsius: &[25, 26],
        fahrenheit: &[27, 28],
        usage_overflow: &[],
        usage_digits: SMALL_FRAME,
        percent: &[29, 30],
    },
    gpu: SectionTable {
        indicator: &[2, 3],
        temp_digits: SMALL_FRAME,
        celsius: &[25, 26],
        fahrenheit: &[27, 28],
        usage_overflow: &[],
        usage_digits: SMALL_FRAME,
        percent: &[29, 30],
    },
};

/// Physical indices of one section, resolved from its table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMap {
    pub indicator: Vec<usize>,
    pub temp_digits: Vec<[usize; SEGMENTS_PER_DIGIT]>,
    pub celsius: Vec<usize>,
    pub fahrenheit: Vec<usize>,
    pub usage_overflow: Vec<usize>,
    pub usage_digits: Vec<[usize; SEGMENTS_PER_DIGIT]>,
    pub percent: Vec<usize>,
}

impl SectionMap {
    fn from_table(table: &SectionTable) -> Self {
        SectionMap {
            indicator: table.indicator.to_vec(),
            temp_digits: table.temp_digits.iter().map(DigitSlot::physical).collect(),
            celsius: table.celsius.to_vec(),
            fahrenheit: table.fahrenheit.to_vec(),
            usage_overflow: table.usage_overflow.to_vec(),
            usage_digits: table.usage_digits.iter().map(DigitSlot::physical).collect(),
            percent: table.percent.to_vec(),
        }
    }

    /// Every physical index the section can light
    pub fn all_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        out.extend(&self.indicator);
        out.extend(self.temp_digits.iter().flatten());
        out.extend(&self.celsius);
        out.extend(&self.fahrenheit);
        out.extend(&self.usage_overflow);
        out.extend(self.usage_digits.iter().flatten());
        out.extend(&self.percent);
        out
    }
}

/// Logical to physical LED map for a layout, built once per layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedMap {
    layout: LayoutMode,
    led_count: usize,
    cpu: SectionMap,
    gpu: SectionMap,
}

impl LedMap {
    pub fn for_layout(layout: LayoutMode) -> Self {
        let table = layout.table();
        let map = LedMap {
            layout,
            led_count: table.led_count,
            cpu: SectionMap::from_table(&table.cpu),
            gpu: SectionMap::from_table(&table.gpu),
        };
        debug_assert!(
            Section::ALL
                .iter()
                .flat_map(|s| map.section(*s).all_indices())
                .all(|i| i < map.led_count),
            "layout {} has an index past its LED count",
            layout
        );
        map
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn section(&self, section: Section) -> &SectionMap {
        match section {
            Section::Cpu => &self.cpu,
            Section::Gpu => &self.gpu,
        }
    }
}
