/*
 *  tests/display_integration.rs
 *
 *  Integration tests for the render and framing pipeline
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 */

use chrono::{TimeZone, Utc};

use digilcd::config::{Config, PaletteConfig, Settings};
use digilcd::display::color::{ClockReading, GradientInputs};
use digilcd::display::drivers::mock::MockTransport;
use digilcd::display::frame::{TempField, UsageField};
use digilcd::display::layout::{BIG_LED_COUNT, SMALL_LED_COUNT};
use digilcd::display::{
    assemble, encode_digit, frame, render_number, resolve, Assembler, BoxedTransport, ColorSpec,
    DisplayError, DisplayManager, Glyph, LayoutMode, LedBuffer, LedColor, Palette, Palettes, Scene, SectionView,
    TickOutcome, TransportFactory, PACKET_LEN,
};
use digilcd::metrics::{MetricKey, MetricRanges, MetricsSnapshot, StaticTelemetry, TempUnit};

const GOLD: LedColor = LedColor::new(0xff, 0xe0, 0x00);

fn fixed_palettes(layout: LayoutMode, color: LedColor) -> Palettes {
    let metrics = MetricsSnapshot::default();
    let ranges = MetricRanges::default();
    let inputs = GradientInputs { metrics: &metrics, ranges: &ranges, clock: ClockReading::default(), cycle_phase: 0.0 };
    let palette = Palette::resolve(&vec![ColorSpec::Fixed(color); layout.led_count()], &inputs);
    Palettes { metrics: palette.clone(), time: palette }
}

/// Lit flags of the 7 LEDs starting at `start`, read back from the wire bytes
fn wire_group(bytes: &[u8], start: usize) -> Vec<bool> {
    (start..start + 7)
        .map(|led| bytes[1 + led * 3..4 + led * 3].iter().any(|b| *b != 0))
        .collect()
}

fn flags(glyph: Glyph) -> Vec<bool> {
    encode_digit(glyph).flags().to_vec()
}

#[test]
fn test_digit_table_is_canonical() {
    let expected: [[u8; 7]; 10] = [
        [1, 1, 1, 1, 1, 1, 0],
        [0, 1, 1, 0, 0, 0, 0],
        [1, 1, 0, 1, 1, 0, 1],
        [1, 1, 1, 1, 0, 0, 1],
        [0, 1, 1, 0, 0, 1, 1],
        [1, 0, 1, 1, 0, 1, 1],
        [1, 0, 1, 1, 1, 1, 1],
        [1, 1, 1, 0, 0, 0, 0],
        [1, 1, 1, 1, 1, 1, 1],
        [1, 1, 1, 1, 0, 1, 1],
    ];
    for (digit, mask) in expected.iter().enumerate() {
        let want: Vec<bool> = mask.iter().map(|b| *b == 1).collect();
        assert_eq!(flags(Glyph::Digit(digit as u8)), want, "digit {}", digit);
    }
}

#[test]
fn test_render_number_pads_with_blank() {
    let run = render_number(Some(50), 3, Glyph::Blank);
    let expected = [Glyph::Blank, Glyph::Digit(5), Glyph::Digit(0)].map(encode_digit);
    assert_eq!(run.as_slice(), &expected);
}

#[test]
fn test_gradient_resolver_endpoints() {
    let spec: ColorSpec = "0000ff-ff0000-gpu_temp".parse().unwrap();
    assert_eq!(resolve(&spec, 30.0, 30.0, 90.0), LedColor::new(0, 0, 255));
    assert_eq!(resolve(&spec, 90.0, 30.0, 90.0), LedColor::new(255, 0, 0));
    assert_eq!(resolve(&spec, 60.0, 30.0, 90.0), LedColor::new(128, 0, 128));
}

#[test]
fn test_gpu_mirroring_on_the_wire() {
    let palettes = fixed_palettes(LayoutMode::Big, GOLD);
    let cpu = SectionView::metrics(Some(172), TempUnit::Celsius, Some(47));
    let gpu = SectionView::metrics(Some(172), TempUnit::Celsius, Some(47));
    let buffer = assemble(&cpu, &gpu, &palettes, "big").unwrap();
    let packet = frame(&buffer);
    let bytes = packet.as_bytes();

    // CPU groups read in canonical order
    assert_eq!(wire_group(bytes, 2), flags(Glyph::Digit(1)));
    assert_eq!(wire_group(bytes, 9), flags(Glyph::Digit(7)));
    assert_eq!(wire_group(bytes, 16), flags(Glyph::Digit(2)));

    // GPU groups each reversed, still left to right
    let reversed = |g: Glyph| flags(g).into_iter().rev().collect::<Vec<_>>();
    assert_eq!(wire_group(bytes, 44), reversed(Glyph::Digit(1)));
    assert_eq!(wire_group(bytes, 51), reversed(Glyph::Digit(7)));
    assert_eq!(wire_group(bytes, 58), reversed(Glyph::Digit(2)));
    assert_eq!(wire_group(bytes, 69), reversed(Glyph::Digit(4)));
    assert_eq!(wire_group(bytes, 76), reversed(Glyph::Digit(7)));
}

#[test]
fn test_usage_overflow_end_to_end() {
    let palettes = fixed_palettes(LayoutMode::Big, GOLD);
    let cpu = SectionView::metrics(Some(40), TempUnit::Celsius, Some(105));
    let buffer = assemble(&cpu, &SectionView::default(), &palettes, "big").unwrap();

    assert_eq!(buffer.get(25), Some(GOLD));
    assert_eq!(buffer.get(26), Some(GOLD));
    let bytes = frame(&buffer);
    assert_eq!(wire_group(bytes.as_bytes(), 27), flags(Glyph::Digit(0)));
    assert_eq!(wire_group(bytes.as_bytes(), 34), flags(Glyph::Digit(5)));
}

#[test]
fn test_buffer_and_packet_sizes() {
    let views = [
        SectionView::default(),
        SectionView::metrics(Some(999), TempUnit::Fahrenheit, Some(199)),
        SectionView::metrics(None, TempUnit::Celsius, None),
        SectionView::clock(23, 59),
    ];
    let palettes = fixed_palettes(LayoutMode::Big, GOLD);
    for cpu in &views {
        for gpu in &views {
            let buffer = assemble(cpu, gpu, &palettes, "big").unwrap();
            assert_eq!(buffer.len(), BIG_LED_COUNT);
            assert_eq!(frame(&buffer).as_bytes().len(), PACKET_LEN);
        }
    }

    let single = [
        SectionView::default(),
        SectionView { indicator: true, temp: TempField::Reading { value: Some(999), unit: TempUnit::Fahrenheit }, ..SectionView::default() },
        SectionView { indicator: true, usage: UsageField::Percent(None), ..SectionView::default() },
    ];
    let palettes = fixed_palettes(LayoutMode::Small, GOLD);
    for view in &single {
        for (cpu, gpu) in [(view, &SectionView::default()), (&SectionView::default(), view)] {
            let buffer = assemble(cpu, gpu, &palettes, "small").unwrap();
            assert_eq!(buffer.len(), SMALL_LED_COUNT);
            assert_eq!(frame(&buffer).as_bytes().len(), PACKET_LEN);
        }
    }
    assert_eq!(LedBuffer::off(LayoutMode::Big).len(), BIG_LED_COUNT);
    assert_eq!(LedBuffer::off(LayoutMode::Small).len(), SMALL_LED_COUNT);
}

#[test]
fn test_small_panel_refuses_overlapping_sections() {
    let palettes = fixed_palettes(LayoutMode::Small, GOLD);
    let cpu = SectionView::metrics(Some(50), TempUnit::Celsius, Some(12));
    let gpu = SectionView::metrics(Some(71), TempUnit::Celsius, Some(34));
    assert!(matches!(
        assemble(&cpu, &gpu, &palettes, "small"),
        Err(DisplayError::SharedDigits { .. })
    ));
}

#[test]
fn test_assembly_is_deterministic() {
    let assembler = Assembler::new(LayoutMode::Big);
    let palettes = fixed_palettes(LayoutMode::Big, GOLD);
    let scene = Scene::new(
        SectionView::metrics(Some(66), TempUnit::Celsius, Some(100)),
        SectionView { temp: TempField::Hours(7), usage: UsageField::Clock(3), ..SectionView::default() },
    );
    let a = frame(&assembler.assemble(&scene, &palettes).unwrap());
    let b = frame(&assembler.assemble(&scene, &palettes).unwrap());
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn test_manager_renders_configured_time_mode() {
    let mut time_colors = vec!["00ff00".to_string(); BIG_LED_COUNT];
    time_colors[2] = "000000-ffffff-hours".to_string();
    let cfg = Config {
        display_mode: Some("time".into()),
        time: Some(PaletteConfig { colors: Some(time_colors) }),
        ..Config::default()
    };
    let settings = Settings::from_config(&cfg).unwrap();

    let mock = MockTransport::new();
    let handle = mock.clone();
    let factory: TransportFactory = Box::new(move |_, _| Ok(Box::new(mock.clone()) as BoxedTransport));
    let telemetry = Box::new(StaticTelemetry(MetricsSnapshot::default().with(MetricKey::CpuTemp, 50.0)));
    let mut manager = DisplayManager::new(settings, telemetry, factory, false);

    let now = Utc.with_ymd_and_hms(2026, 1, 2, 23, 45, 6).unwrap();
    assert_eq!(manager.tick(&now), TickOutcome::Sent);

    let packet = handle.last_packet().unwrap();
    let bytes = packet.as_bytes();
    // 2 3 H on the CPU temperature field, 4 5 on CPU usage, 0 6 on GPU usage
    assert_eq!(wire_group(bytes, 2), flags(Glyph::Digit(2)));
    assert_eq!(wire_group(bytes, 9), flags(Glyph::Digit(3)));
    assert_eq!(wire_group(bytes, 16), flags(Glyph::LetterH));
    assert_eq!(wire_group(bytes, 27), flags(Glyph::Digit(4)));
    assert_eq!(wire_group(bytes, 34), flags(Glyph::Digit(5)));
    let reversed = |g: Glyph| flags(g).into_iter().rev().collect::<Vec<_>>();
    assert_eq!(wire_group(bytes, 69), reversed(Glyph::Digit(0)));
    assert_eq!(wire_group(bytes, 76), reversed(Glyph::Digit(6)));

    // hour 23 drives the gradient on LED 2 to its end color
    assert_eq!(&bytes[7..10], &[0xff, 0xff, 0xff]);
    // plain time color elsewhere, indicator dark
    assert_eq!(&bytes[10..13], &[0x00, 0xff, 0x00]);
    assert_eq!(&bytes[1..4], &[0, 0, 0]);
}

#[test]
fn test_missing_metrics_still_frame() {
    let settings = Settings::from_config(&Config::default()).unwrap();
    let mock = MockTransport::new();
    let handle = mock.clone();
    let factory: TransportFactory = Box::new(move |_, _| Ok(Box::new(mock.clone()) as BoxedTransport));
    let mut manager = DisplayManager::new(settings, Box::new(StaticTelemetry::default()), factory, false);

    assert_eq!(manager.tick(&Utc::now()), TickOutcome::Sent);
    let packet = handle.last_packet().unwrap();
    // digits blank, indicator and unit LEDs still on
    assert_eq!(wire_group(packet.as_bytes(), 2), vec![false; 7]);
    assert_eq!(&packet.as_bytes()[1..4], &[0xff, 0xe0, 0x00]);
    assert_eq!(&packet.as_bytes()[70..73], &[0xff, 0xe0, 0x00]);
}
