/*
 *  display/segment.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Seven-segment glyph encoding
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

/// Number of LEDs (segments) in one digit cluster
pub const SEGMENTS_PER_DIGIT: usize = 7;

/// Segment positions in canonical order
///
/// The discriminant is the segment's slot in a [`DigitPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Top = 0,
    TopRight = 1,
    BottomRight = 2,
    Bottom = 3,
    BottomLeft = 4,
    TopLeft = 5,
    Middle = 6,
}

impl Segment {
    pub const ALL: [Segment; SEGMENTS_PER_DIGIT] = [
        Segment::Top,
        Segment::TopRight,
        Segment::BottomRight,
        Segment::Bottom,
        Segment::BottomLeft,
        Segment::TopLeft,
        Segment::Middle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Something a digit cluster can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Decimal digit, always 0..=9 when built via [`Glyph::from_digit`]
    Digit(u8),
    /// No digit here, all segments off (distinct from `Digit(0)`)
    Blank,
    /// Letter `H`, shown after the hour on the clock screens
    LetterH,
}

impl Glyph {
    pub const BLANK: Glyph = Glyph::Blank;
    pub const ZERO: Glyph = Glyph::Digit(0);

    /// Build a digit glyph, `None` for anything outside 0..=9
    pub fn from_digit(value: u32) -> Option<Glyph> {
        if value <= 9 {
            Some(Glyph::Digit(value as u8))
        } else {
            None
        }
    }

    pub fn pattern(self) -> DigitPattern {
        encode_digit(self)
    }
}

/// Activation flags for one digit cluster, canonical segment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitPattern([bool; SEGMENTS_PER_DIGIT]);

impl DigitPattern {
    pub const BLANK: DigitPattern = DigitPattern([false; SEGMENTS_PER_DIGIT]);

    pub const fn from_flags(flags: [bool; SEGMENTS_PER_DIGIT]) -> Self {
        DigitPattern(flags)
    }

    pub fn flags(&self) -> &[bool; SEGMENTS_PER_DIGIT] {
        &self.0
    }

    pub fn is_lit(&self, segment: Segment) -> bool {
        self.0[segment.index()]
    }

    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|&&on| on).count()
    }

    pub fn is_blank(&self) -> bool {
        self.lit_count() == 0
    }
}

// [top, top-right, bottom-right, bottom, bottom-left, top-left, middle]
const DIGIT_MASKS: [[u8; SEGMENTS_PER_DIGIT]; 10] = [
    [1, 1, 1, 1, 1, 1, 0], // 0
    [0, 1, 1, 0, 0, 0, 0], // 1
    [1, 1, 0, 1, 1, 0, 1], // 2
    [1, 1, 1, 1, 0, 0, 1], // 3
    [0, 1, 1, 0, 0, 1, 1], // 4
    [1, 0, 1, 1, 0, 1, 1], // 5
    [1, 0, 1, 1, 1, 1, 1], // 6
    [1, 1, 1, 0, 0, 0, 0], // 7
    [1, 1, 1, 1, 1, 1, 1], // 8
    [1, 1, 1, 1, 0, 1, 1], // 9
];

const LETTER_H_MASK: [u8; SEGMENTS_PER_DIGIT] = [0, 1, 1, 0, 1, 1, 1];

const fn mask_to_pattern(mask: &[u8; SEGMENTS_PER_DIGIT]) -> DigitPattern {
    let mut flags = [false; SEGMENTS_PER_DIGIT];
    let mut i = 0;
    while i < SEGMENTS_PER_DIGIT {
        flags[i] = mask[i] != 0;
        i += 1;
    }
    DigitPattern(flags)
}

/// Encode a glyph into its segment activation pattern
///
/// Pure table lookup. A `Digit` outside 0..=9 can only come from a bypassed
/// constructor and is shown as blank.
pub fn encode_digit(glyph: Glyph) -> DigitPattern {
    match glyph {
        Glyph::Digit(d) => match DIGIT_MASKS.get(d as usize) {
            Some(mask) => mask_to_pattern(mask),
            None => {
                debug_assert!(false, "digit out of range: {}", d);
                DigitPattern::BLANK
            }
        },
        Glyph::Blank => DigitPattern::BLANK,
        Glyph::LetterH => mask_to_pattern(&LETTER_H_MASK),
    }
}
