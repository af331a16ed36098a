/*
 *  display/manager.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display manager - one full pipeline pass per tick
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

use crate::config::{ConfigWatcher, Settings};
use crate::display::color::{ClockReading, GradientInputs, Palette, Palettes};
use crate::display::frame::{Assembler, LedBuffer};
use crate::display::mode_controller::DisplayModeController;
use crate::display::packet::{frame, Packet};
use crate::display::traits::{BoxedTransport, TransportFactory};
use crate::display::DisplayError;
use crate::metrics::Telemetry;

use chrono::{DateTime, TimeZone};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Minimum wait between attempts to open a missing device
pub const DEVICE_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What a tick achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A packet reached the transport
    Sent,
    /// No device open; nothing rendered
    NoDevice,
    /// The write failed and the device was dropped
    Failed,
    /// The scene could not be assembled; nothing was written
    Skipped,
}

/// Frame counters, logged at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_sent: u64,
    pub write_failures: u64,
    pub open_failures: u64,
}

/// Owns the settings snapshot, telemetry, pipeline state and the device
pub struct DisplayManager {
    settings: Settings,
    watcher: Option<ConfigWatcher>,
    telemetry: Box<dyn Telemetry>,
    assembler: Assembler,
    controller: DisplayModeController,
    digit_test: bool,

    open_transport: TransportFactory,
    transport: Option<BoxedTransport>,
    last_open_attempt: Option<Instant>,
    retry_interval: Duration,

    stats: FrameStats,
}

impl DisplayManager {
    pub fn new(
        settings: Settings,
        mut telemetry: Box<dyn Telemetry>,
        open_transport: TransportFactory,
        digit_test: bool,
    ) -> Self {
        telemetry.set_refresh_interval(settings.metrics_update_interval);
        info!(
            "Display manager: {} layout, mode {}, device {:04x}:{:04x}",
            settings.layout, settings.display_mode, settings.vendor_id, settings.product_id
        );
        Self {
            assembler: Assembler::new(settings.layout),
            controller: DisplayModeController::new(settings.mode_config(digit_test)),
            settings,
            watcher: None,
            telemetry,
            digit_test,
            open_transport,
            transport: None,
            last_open_attempt: None,
            retry_interval: DEVICE_RETRY_INTERVAL,
            stats: FrameStats::default(),
        }
    }

    /// Reload settings from this watcher at the start of every tick
    pub fn with_watcher(mut self, watcher: ConfigWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn has_device(&self) -> bool {
        self.transport.is_some()
    }

    pub fn controller(&self) -> &DisplayModeController {
        &self.controller
    }

    /// Swap in a new settings snapshot
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings == self.settings {
            return;
        }
        if settings.layout != self.settings.layout {
            info!("Layout changed: {} -> {}", self.settings.layout, settings.layout);
            self.assembler = Assembler::new(settings.layout);
        }
        if settings.vendor_id != self.settings.vendor_id || settings.product_id != self.settings.product_id {
            warn!(
                "Device id changed to {:04x}:{:04x}, reopening",
                settings.vendor_id, settings.product_id
            );
            self.transport = None;
            self.last_open_attempt = None;
        }
        self.controller.reconfigure(settings.mode_config(self.digit_test));
        self.telemetry.set_refresh_interval(settings.metrics_update_interval);
        self.settings = settings;
    }

    fn reload(&mut self) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        match watcher.poll() {
            Some(Ok(settings)) => self.apply_settings(settings),
            Some(Err(e)) => warn!("Config reload failed, keeping previous settings: {}", e),
            None => {}
        }
    }

    /// Open the device unless one is open or the last attempt was too recent
    fn ensure_transport(&mut self) -> bool {
        if self.transport.is_some() {
            return true;
        }
        if let Some(last) = self.last_open_attempt {
            if last.elapsed() < self.retry_interval {
                return false;
            }
        }
        self.last_open_attempt = Some(Instant::now());

        let (vid, pid) = (self.settings.vendor_id, self.settings.product_id);
        match (self.open_transport)(vid, pid) {
            Ok(transport) => {
                info!("Writing frames to {}", transport.name());
                self.transport = Some(transport);
                true
            }
            Err(e) => {
                self.stats.open_failures += 1;
                warn!("{} (retrying in {:?})", e, self.retry_interval);
                false
            }
        }
    }

    /// Render the packet for `now` and advance the mode schedule
    pub fn compose<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<Packet, DisplayError> {
        let metrics = self
            .telemetry
            .snapshot()
            .in_units(self.settings.cpu_unit, self.settings.gpu_unit);
        let clock = ClockReading::from_time(now);

        let inputs = GradientInputs {
            metrics: &metrics,
            ranges: &self.settings.ranges,
            clock,
            cycle_phase: self.controller.cycle_phase(),
        };
        let palettes = Palettes {
            metrics: Palette::resolve(&self.settings.metrics_colors, &inputs),
            time: Palette::resolve(&self.settings.time_colors, &inputs),
        };

        let scene = self.controller.scene(&metrics, clock, now.timestamp());
        self.controller.advance();
        let buffer = self.assembler.assemble(&scene, &palettes)?;
        Ok(frame(&buffer))
    }

    /// One complete pass: reload, sample, assemble, frame, write
    pub fn tick<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> TickOutcome {
        self.reload();

        if !self.ensure_transport() {
            return TickOutcome::NoDevice;
        }

        match self.compose(now) {
            Ok(packet) => self.send(&packet),
            Err(e) => {
                warn!("Frame skipped: {}", e);
                TickOutcome::Skipped
            }
        }
    }

    fn send(&mut self, packet: &Packet) -> TickOutcome {
        let Some(transport) = self.transport.as_mut() else {
            return TickOutcome::NoDevice;
        };
        match transport.write_packet(packet) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                TickOutcome::Sent
            }
            Err(e) => {
                self.stats.write_failures += 1;
                warn!("Write to {} failed, dropping device: {}", transport.name(), e);
                self.transport = None;
                // reopen straight away on the next tick
                self.last_open_attempt = None;
                TickOutcome::Failed
            }
        }
    }

    /// Turn every LED off, if a device is open
    pub fn blank(&mut self) -> Result<(), DisplayError> {
        let Some(transport) = self.transport.as_mut() else {
            debug!("No device open, nothing to blank");
            return Ok(());
        };
        transport.write_packet(&frame(&LedBuffer::off(self.settings.layout)))
    }
}
