/*
 *  display/number.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fixed-width number rendering onto digit clusters
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

use arrayvec::ArrayVec;

use super::segment::{encode_digit, DigitPattern, Glyph};

/// Widest digit field on any layout
pub const MAX_FIELD_WIDTH: usize = 3;

/// Largest temperature the 3-digit field shows
pub const MAX_TEMPERATURE: u32 = 999;

/// Largest usage the overflow pair plus two digits can show
pub const MAX_USAGE: u32 = 199;

pub type GlyphRun = ArrayVec<Glyph, MAX_FIELD_WIDTH>;
pub type PatternRun = ArrayVec<DigitPattern, MAX_FIELD_WIDTH>;

/// Decompose `value` into exactly `width` glyphs, most significant first
///
/// Shorter numbers are left padded with `fill`; longer numbers keep only the
/// least significant `width` digits. `None` renders every position blank.
pub fn number_glyphs(value: Option<u32>, width: usize, fill: Glyph) -> GlyphRun {
    debug_assert!(width <= MAX_FIELD_WIDTH, "field width {} too wide", width);
    let width = width.min(MAX_FIELD_WIDTH);

    let mut run = GlyphRun::new();
    let Some(mut remaining) = value else {
        for _ in 0..width {
            run.push(Glyph::Blank);
        }
        return run;
    };

    // least significant first, reversed below
    let mut digits: ArrayVec<Glyph, 10> = ArrayVec::new();
    loop {
        digits.push(Glyph::Digit((remaining % 10) as u8));
        remaining /= 10;
        if remaining == 0 {
            break;
        }
    }

    for _ in digits.len()..width {
        run.push(fill);
    }
    let keep = digits.len().min(width);
    for glyph in digits[..keep].iter().rev() {
        run.push(*glyph);
    }
    run
}

/// Render `value` as `width` digit patterns
pub fn render_number(value: Option<u32>, width: usize, fill: Glyph) -> PatternRun {
    number_glyphs(value, width, fill)
        .into_iter()
        .map(encode_digit)
        .collect()
}

/// Result of the usage overflow policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDigits {
    /// Both overflow LEDs on, standing in for a leading "1"
    pub overflow: bool,
    pub patterns: PatternRun,
}

/// Render a usage percentage onto a two digit field plus overflow pair
///
/// Values from 100 light the overflow pair; the renderer still receives the
/// full value and its truncation keeps the last two digits (`105` -> `05`).
pub fn render_usage(value: Option<u32>) -> UsageDigits {
    let value = value.map(|v| v.min(MAX_USAGE));
    UsageDigits {
        overflow: value.is_some_and(|v| v >= 100),
        patterns: render_number(value, 2, Glyph::Blank),
    }
}

/// Render a temperature onto the three digit field
pub fn render_temperature(value: Option<u32>) -> PatternRun {
    render_number(value.map(|v| v.min(MAX_TEMPERATURE)), 3, Glyph::Blank)
}
