/*
 *  display/drivers/dry_run.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Transport that only logs what it would send
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

use log::{debug, info};

use crate::display::error::DisplayError;
use crate::display::packet::Packet;
use crate::display::traits::LedTransport;

/// Stands in for the device when running without hardware
#[derive(Debug, Default)]
pub struct DryRunTransport {
    last: Option<Packet>,
    written: u64,
}

impl DryRunTransport {
    pub fn new() -> Self {
        info!("Dry run: packets are logged, not sent");
        Self::default()
    }

    pub fn packets_written(&self) -> u64 {
        self.written
    }
}

impl LedTransport for DryRunTransport {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<(), DisplayError> {
        self.written += 1;
        // only log frames that differ from the previous one
        if self.last.as_ref() != Some(packet) {
            debug!("packet #{}: {}", self.written, packet.to_hex().trim_end_matches('0'));
            self.last = Some(packet.clone());
        }
        Ok(())
    }
}
