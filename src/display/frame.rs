/*
 *  display/frame.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Scene description and LED buffer assembly
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

use crate::metrics::TempUnit;

use super::color::{LedColor, Palette, Palettes};
use super::error::DisplayError;
use super::layout::{LayoutMode, LedMap, Section, SectionMap};
use super::number::{number_glyphs, render_number, render_temperature, render_usage, MAX_TEMPERATURE};
use super::segment::{encode_digit, DigitPattern, Glyph, SEGMENTS_PER_DIGIT};

/// Which configured palette colors a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteKind {
    #[default]
    Metrics,
    Time,
}

/// What the temperature digits show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempField {
    #[default]
    Blank,
    /// Temperature with its unit LED; `None` when the metric is missing
    Reading { value: Option<u32>, unit: TempUnit },
    /// Zero padded hour followed by an `H`
    Hours(u32),
}

/// What the usage digits show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageField {
    #[default]
    Blank,
    /// Utilization with the percent LED; `None` when the metric is missing
    Percent(Option<u32>),
    /// Zero padded minutes or seconds
    Clock(u32),
}

/// One section's content for a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionView {
    pub indicator: bool,
    pub temp: TempField,
    pub usage: UsageField,
    pub palette: PaletteKind,
}

impl SectionView {
    pub fn metrics(temp: Option<u32>, unit: TempUnit, usage: Option<u32>) -> Self {
        SectionView {
            indicator: true,
            temp: TempField::Reading { value: temp, unit },
            usage: UsageField::Percent(usage),
            palette: PaletteKind::Metrics,
        }
    }

    pub fn clock(hours: u32, minutes: u32) -> Self {
        SectionView {
            indicator: false,
            temp: TempField::Hours(hours),
            usage: UsageField::Clock(minutes),
            palette: PaletteKind::Time,
        }
    }
}

/// Everything shown on the panel for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scene {
    pub cpu: SectionView,
    pub gpu: SectionView,
    /// Light every LED with the metrics palette
    pub all_lit: bool,
}

impl Scene {
    pub fn new(cpu: SectionView, gpu: SectionView) -> Self {
        Scene { cpu, gpu, all_lit: false }
    }

    pub fn all_lit() -> Self {
        Scene { all_lit: true, ..Scene::default() }
    }

    pub fn section(&self, section: Section) -> &SectionView {
        match section {
            Section::Cpu => &self.cpu,
            Section::Gpu => &self.gpu,
        }
    }
}

/// Per-LED colors in physical wiring order, fixed length per layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedBuffer {
    layout: LayoutMode,
    leds: Vec<LedColor>,
}

impl LedBuffer {
    /// Every LED off
    pub fn off(layout: LayoutMode) -> Self {
        LedBuffer { layout, leds: vec![LedColor::OFF; layout.led_count()] }
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn as_slice(&self) -> &[LedColor] {
        &self.leds
    }

    pub fn get(&self, index: usize) -> Option<LedColor> {
        self.leds.get(index).copied()
    }

    pub fn lit_count(&self) -> usize {
        self.leds.iter().filter(|c| **c != LedColor::OFF).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Segment,
    Symbol,
}

/// A digit field of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    section: Section,
    usage: bool,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.usage { "usage" } else { "temperature" };
        write!(f, "{} {}", self.section, kind)
    }
}

/// Activation marks gathered before colors are applied
struct Marks {
    lit: Vec<Option<(PaletteKind, Role)>>,
    // field owning each digit segment, at most one per LED
    owners: Vec<Option<Field>>,
}

impl Marks {
    fn new(len: usize) -> Self {
        Marks { lit: vec![None; len], owners: vec![None; len] }
    }

    /// Reserve every segment of `slots` for `field`
    fn claim(&mut self, field: Field, slots: &[[usize; SEGMENTS_PER_DIGIT]]) -> Result<(), DisplayError> {
        let indices = || slots.iter().flatten().copied();
        if let Some(owner) = indices()
            .filter_map(|i| self.owners.get(i).copied().flatten())
            .find(|owner| *owner != field)
        {
            return Err(DisplayError::SharedDigits { first: owner.to_string(), second: field.to_string() });
        }
        for i in indices() {
            if let Some(slot) = self.owners.get_mut(i) {
                *slot = Some(field);
            }
        }
        Ok(())
    }

    fn mark(&mut self, index: usize, palette: PaletteKind, role: Role) {
        if let Some(slot) = self.lit.get_mut(index) {
            *slot = Some((palette, role));
        }
    }

    fn symbol(&mut self, indices: &[usize], palette: PaletteKind) {
        for &i in indices {
            self.mark(i, palette, Role::Symbol);
        }
    }

    fn segments(&mut self, indices: &[usize], palette: PaletteKind) {
        for &i in indices {
            self.mark(i, palette, Role::Segment);
        }
    }

    fn digits(
        &mut self,
        field: Field,
        slots: &[[usize; SEGMENTS_PER_DIGIT]],
        patterns: &[DigitPattern],
        palette: PaletteKind,
    ) -> Result<(), DisplayError> {
        debug_assert_eq!(slots.len(), patterns.len());
        self.claim(field, slots)?;
        for (slot, pattern) in slots.iter().zip(patterns) {
            for (&index, &on) in slot.iter().zip(pattern.flags()) {
                if on {
                    self.mark(index, palette, Role::Segment);
                }
            }
        }
        Ok(())
    }

    fn into_colors(self, palettes: &Palettes) -> Vec<LedColor> {
        let pick = |kind: PaletteKind| palette_for(palettes, kind);
        self.lit
            .into_iter()
            .enumerate()
            .map(|(i, mark)| match mark {
                None => LedColor::OFF,
                Some((kind, Role::Segment)) => pick(kind).color(i),
                Some((kind, Role::Symbol)) => pick(kind).static_color(i),
            })
            .collect()
    }
}

fn palette_for(palettes: &Palettes, kind: PaletteKind) -> &Palette {
    match kind {
        PaletteKind::Metrics => &palettes.metrics,
        PaletteKind::Time => &palettes.time,
    }
}

/// Composes scenes into LED buffers for one layout
#[derive(Debug, Clone)]
pub struct Assembler {
    map: LedMap,
}

impl Assembler {
    pub fn new(layout: LayoutMode) -> Self {
        Assembler { map: LedMap::for_layout(layout) }
    }

    pub fn layout(&self) -> LayoutMode {
        self.map.layout()
    }

    pub fn map(&self) -> &LedMap {
        &self.map
    }

    /// Compose one scene into an LED buffer
    ///
    /// On the small panel every field shares the one digit frame, so a scene
    /// may populate only one of them; two fields landing on the same digits
    /// is a `SharedDigits` error rather than a merged glyph.
    pub fn assemble(&self, scene: &Scene, palettes: &Palettes) -> Result<LedBuffer, DisplayError> {
        let mut marks = Marks::new(self.map.led_count());

        if scene.all_lit {
            for i in 0..self.map.led_count() {
                marks.mark(i, PaletteKind::Metrics, Role::Segment);
            }
        } else {
            for section in Section::ALL {
                write_section(&mut marks, section, self.map.section(section), scene.section(section))?;
            }
        }

        Ok(LedBuffer { layout: self.layout(), leds: marks.into_colors(palettes) })
    }
}

fn write_section(marks: &mut Marks, section: Section, map: &SectionMap, view: &SectionView) -> Result<(), DisplayError> {
    let palette = view.palette;
    let temp_field = Field { section, usage: false };
    let usage_field = Field { section, usage: true };

    if view.indicator {
        marks.symbol(&map.indicator, palette);
    }

    match view.temp {
        TempField::Blank => {}
        TempField::Reading { value, unit } => {
            let patterns = if map.temp_digits.len() == 3 {
                render_temperature(value)
            } else {
                render_number(value.map(|v| v.min(MAX_TEMPERATURE)), map.temp_digits.len(), Glyph::Blank)
            };
            marks.digits(temp_field, &map.temp_digits, &patterns, palette)?;
            match unit {
                TempUnit::Celsius => marks.symbol(&map.celsius, palette),
                TempUnit::Fahrenheit => marks.symbol(&map.fahrenheit, palette),
            }
        }
        TempField::Hours(hours) => {
            let width = map.temp_digits.len().saturating_sub(1);
            let mut glyphs = number_glyphs(Some(hours), width, Glyph::ZERO);
            glyphs.push(Glyph::LetterH);
            let patterns: Vec<DigitPattern> = glyphs.into_iter().map(encode_digit).collect();
            marks.digits(temp_field, &map.temp_digits, &patterns, palette)?;
        }
    }

    match view.usage {
        UsageField::Blank => {}
        UsageField::Percent(value) => {
            if map.usage_overflow.is_empty() {
                let patterns = render_number(value, map.usage_digits.len(), Glyph::Blank);
                marks.digits(usage_field, &map.usage_digits, &patterns, palette)?;
            } else {
                let usage = render_usage(value);
                if usage.overflow {
                    marks.segments(&map.usage_overflow, palette);
                }
                marks.digits(usage_field, &map.usage_digits, &usage.patterns, palette)?;
            }
            marks.symbol(&map.percent, palette);
        }
        UsageField::Clock(value) => {
            let patterns = render_number(Some(value), map.usage_digits.len(), Glyph::ZERO);
            marks.digits(usage_field, &map.usage_digits, &patterns, palette)?;
        }
    }
    Ok(())
}

/// One-shot assembly from section views and a layout name
///
/// An unknown layout is rejected before anything is built, and on the small
/// panel at most one field of the two views may be populated.
pub fn assemble(
    cpu: &SectionView,
    gpu: &SectionView,
    palettes: &Palettes,
    layout_mode: &str,
) -> Result<LedBuffer, DisplayError> {
    let layout: LayoutMode = layout_mode.parse()?;
    Assembler::new(layout).assemble(&Scene::new(*cpu, *gpu), palettes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::color::{ClockReading, ColorSpec, GradientInputs};
    use crate::display::layout::{BIG_LED_COUNT, SMALL_LED_COUNT};
    use crate::metrics::{MetricKey, MetricRanges, MetricsSnapshot};

    const WHITE: LedColor = LedColor::new(255, 255, 255);
    const TIME: LedColor = LedColor::new(0, 0, 200);

    fn palettes(layout: LayoutMode) -> Palettes {
        let n = layout.led_count();
        let metrics = MetricsSnapshot::default();
        let ranges = MetricRanges::default();
        let inputs = GradientInputs { metrics: &metrics, ranges: &ranges, clock: ClockReading::default(), cycle_phase: 0.0 };
        Palettes {
            metrics: Palette::resolve(&vec![ColorSpec::Fixed(WHITE); n], &inputs),
            time: Palette::resolve(&vec![ColorSpec::Fixed(TIME); n], &inputs),
        }
    }

    fn lit_flags(buffer: &LedBuffer, group: &[usize]) -> Vec<bool> {
        group.iter().map(|&i| buffer.get(i).unwrap() != LedColor::OFF).collect()
    }

    fn reversed(pattern: DigitPattern) -> Vec<bool> {
        pattern.flags().iter().rev().copied().collect()
    }

    #[test]
    fn test_gpu_digit_groups_mirror_individually() {
        let assembler = Assembler::new(LayoutMode::Big);
        let gpu = SectionView::metrics(Some(172), TempUnit::Celsius, Some(0));
        let buffer = assembler.assemble(&Scene::new(SectionView::default(), gpu), &palettes(LayoutMode::Big)).unwrap();

        // GPU temperature groups start at 44, 51 and 58
        let groups = [44..51, 51..58, 58..65];
        let digits = [1, 7, 2];
        for (range, digit) in groups.into_iter().zip(digits) {
            let indices: Vec<usize> = range.collect();
            let expected = reversed(encode_digit(Glyph::Digit(digit)));
            assert_eq!(lit_flags(&buffer, &indices), expected, "group for digit {}", digit);
        }
    }

    #[test]
    fn test_cpu_digit_groups_ascend() {
        let assembler = Assembler::new(LayoutMode::Big);
        let cpu = SectionView::metrics(Some(172), TempUnit::Celsius, None);
        let buffer = assembler.assemble(&Scene::new(cpu, SectionView::default()), &palettes(LayoutMode::Big)).unwrap();
        let digits = [1, 7, 2];
        for (g, digit) in digits.into_iter().enumerate() {
            let indices: Vec<usize> = (2 + g * 7..9 + g * 7).collect();
            let expected = encode_digit(Glyph::Digit(digit)).flags().to_vec();
            assert_eq!(lit_flags(&buffer, &indices), expected);
        }
    }

    #[test]
    fn test_buffer_length_is_fixed() {
        for layout in [LayoutMode::Big, LayoutMode::Small] {
            let assembler = Assembler::new(layout);
            let p = palettes(layout);
            let blank = assembler.assemble(&Scene::default(), &p).unwrap();
            assert_eq!(blank.len(), layout.led_count());
            assert_eq!(blank.lit_count(), 0);
            let full = assembler.assemble(&Scene::all_lit(), &p).unwrap();
            assert_eq!(full.len(), layout.led_count());
            assert_eq!(full.lit_count(), layout.led_count());
        }
        assert_eq!(LedBuffer::off(LayoutMode::Big).len(), BIG_LED_COUNT);
        assert_eq!(LedBuffer::off(LayoutMode::Small).len(), SMALL_LED_COUNT);
    }

    #[test]
    fn test_usage_overflow_lights_pair() {
        let assembler = Assembler::new(LayoutMode::Big);
        let cpu = SectionView::metrics(None, TempUnit::Celsius, Some(105));
        let buffer = assembler.assemble(&Scene::new(cpu, SectionView::default()), &palettes(LayoutMode::Big)).unwrap();
        assert_eq!(buffer.get(25), Some(WHITE));
        assert_eq!(buffer.get(26), Some(WHITE));
        assert_eq!(lit_flags(&buffer, &(27..34).collect::<Vec<_>>()), encode_digit(Glyph::Digit(0)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &(34..41).collect::<Vec<_>>()), encode_digit(Glyph::Digit(5)).flags().to_vec());
        // percent and indicator
        assert_eq!(buffer.get(41), Some(WHITE));
        assert_eq!(buffer.get(0), Some(WHITE));
        // missing temperature: digits blank, unit LED still on
        assert_eq!(lit_flags(&buffer, &(2..23).collect::<Vec<_>>()), vec![false; 21]);
        assert_eq!(buffer.get(23), Some(WHITE));
    }

    #[test]
    fn test_fahrenheit_unit_led() {
        let assembler = Assembler::new(LayoutMode::Big);
        let gpu = SectionView::metrics(Some(150), TempUnit::Fahrenheit, Some(10));
        let buffer = assembler.assemble(&Scene::new(SectionView::default(), gpu), &palettes(LayoutMode::Big)).unwrap();
        assert_eq!(buffer.get(65), Some(LedColor::OFF));
        assert_eq!(buffer.get(66), Some(WHITE));
    }

    #[test]
    fn test_clock_uses_time_palette() {
        let assembler = Assembler::new(LayoutMode::Big);
        let buffer = assembler.assemble(
            &Scene::new(SectionView::clock(9, 5), SectionView::default()),
            &palettes(LayoutMode::Big),
        ).unwrap();
        // 0 9 H
        assert_eq!(lit_flags(&buffer, &(2..9).collect::<Vec<_>>()), encode_digit(Glyph::Digit(0)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &(9..16).collect::<Vec<_>>()), encode_digit(Glyph::Digit(9)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &(16..23).collect::<Vec<_>>()), encode_digit(Glyph::LetterH).flags().to_vec());
        // 0 5, no overflow, no percent, no indicator
        assert_eq!(lit_flags(&buffer, &(34..41).collect::<Vec<_>>()), encode_digit(Glyph::Digit(5)).flags().to_vec());
        assert_eq!(buffer.get(3), Some(TIME));
        assert_eq!(buffer.get(25), Some(LedColor::OFF));
        assert_eq!(buffer.get(41), Some(LedColor::OFF));
        assert_eq!(buffer.get(0), Some(LedColor::OFF));
    }

    #[test]
    fn test_small_layout_shared_frame() {
        let assembler = Assembler::new(LayoutMode::Small);
        let gpu = SectionView {
            indicator: true,
            usage: UsageField::Percent(Some(100)),
            ..SectionView::default()
        };
        let buffer = assembler.assemble(&Scene::new(SectionView::default(), gpu), &palettes(LayoutMode::Small)).unwrap();
        assert_eq!(buffer.len(), SMALL_LED_COUNT);
        assert_eq!(lit_flags(&buffer, &[0, 1, 2, 3]), vec![false, false, true, true]);
        assert_eq!(lit_flags(&buffer, &(4..11).collect::<Vec<_>>()), encode_digit(Glyph::Digit(1)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &(18..25).collect::<Vec<_>>()), encode_digit(Glyph::Digit(0)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &[29, 30]), vec![true, true]);
    }

    #[test]
    fn test_small_layout_rejects_two_sections() {
        let p = palettes(LayoutMode::Small);
        let cpu = SectionView::metrics(Some(50), TempUnit::Celsius, Some(12));
        let gpu = SectionView::metrics(Some(71), TempUnit::Celsius, Some(34));
        let err = assemble(&cpu, &gpu, &p, "small").unwrap_err();
        assert!(matches!(err, DisplayError::SharedDigits { .. }), "got {:?}", err);

        let cpu_temp = SectionView { indicator: true, temp: TempField::Reading { value: Some(50), unit: TempUnit::Celsius }, ..SectionView::default() };
        let gpu_temp = SectionView { indicator: true, temp: TempField::Reading { value: Some(71), unit: TempUnit::Celsius }, ..SectionView::default() };
        match assemble(&cpu_temp, &gpu_temp, &p, "small") {
            Err(DisplayError::SharedDigits { first, second }) => {
                assert_eq!(first, "cpu temperature");
                assert_eq!(second, "gpu temperature");
            }
            other => panic!("expected SharedDigits, got {:?}", other),
        }
    }

    #[test]
    fn test_small_layout_rejects_temp_and_usage_together() {
        let p = palettes(LayoutMode::Small);
        let cpu = SectionView::metrics(Some(50), TempUnit::Celsius, Some(12));
        let result = Assembler::new(LayoutMode::Small).assemble(&Scene::new(cpu, SectionView::default()), &p);
        assert!(matches!(result, Err(DisplayError::SharedDigits { .. })));
    }

    #[test]
    fn test_small_layout_single_field_is_exact() {
        let p = palettes(LayoutMode::Small);
        let cpu_temp = SectionView { indicator: true, temp: TempField::Reading { value: Some(50), unit: TempUnit::Celsius }, ..SectionView::default() };
        let buffer = assemble(&cpu_temp, &SectionView::default(), &p, "small").unwrap();
        // blank 5 0, celsius on, percent and fahrenheit off
        assert_eq!(lit_flags(&buffer, &(4..11).collect::<Vec<_>>()), vec![false; 7]);
        assert_eq!(lit_flags(&buffer, &(11..18).collect::<Vec<_>>()), encode_digit(Glyph::Digit(5)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &(18..25).collect::<Vec<_>>()), encode_digit(Glyph::Digit(0)).flags().to_vec());
        assert_eq!(lit_flags(&buffer, &[25, 26, 27, 28, 29, 30]), vec![true, true, false, false, false, false]);
    }

    #[test]
    fn test_big_layout_sections_never_collide() {
        let p = palettes(LayoutMode::Big);
        let cpu = SectionView::metrics(Some(50), TempUnit::Celsius, Some(12));
        let gpu = SectionView::metrics(Some(71), TempUnit::Celsius, Some(134));
        assert!(assemble(&cpu, &gpu, &p, "big").is_ok());
    }

    #[test]
    fn test_symbols_use_static_color_rule() {
        let n = BIG_LED_COUNT;
        let mut metrics = MetricsSnapshot::default();
        metrics.set(MetricKey::CpuTemp, 90.0);
        let ranges = MetricRanges::default();
        let inputs = GradientInputs { metrics: &metrics, ranges: &ranges, clock: ClockReading::default(), cycle_phase: 0.0 };
        let spec: ColorSpec = "0000ff-ff0000-cpu_temp".parse().unwrap();
        let p = Palette::resolve(&vec![spec; n], &inputs);
        let palettes = Palettes { metrics: p.clone(), time: p };

        let cpu = SectionView::metrics(Some(88), TempUnit::Celsius, Some(10));
        let buffer = Assembler::new(LayoutMode::Big).assemble(&Scene::new(cpu, SectionView::default()), &palettes).unwrap();
        // segment of the 8 follows the gradient, indicator keeps the start color
        assert_eq!(buffer.get(9), Some(LedColor::new(255, 0, 0)));
        assert_eq!(buffer.get(0), Some(LedColor::new(0, 0, 255)));
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let assembler = Assembler::new(LayoutMode::Big);
        let p = palettes(LayoutMode::Big);
        let scene = Scene::new(
            SectionView::metrics(Some(61), TempUnit::Celsius, Some(37)),
            SectionView::metrics(Some(48), TempUnit::Celsius, Some(112)),
        );
        assert_eq!(assembler.assemble(&scene, &p).unwrap(), assembler.assemble(&scene, &p).unwrap());
    }

    #[test]
    fn test_assemble_rejects_unknown_layout() {
        let p = palettes(LayoutMode::Big);
        let view = SectionView::default();
        assert!(matches!(assemble(&view, &view, &p, "huge"), Err(DisplayError::UnknownLayout(_))));
        assert_eq!(assemble(&view, &view, &p, "big").unwrap().len(), BIG_LED_COUNT);
    }
}
