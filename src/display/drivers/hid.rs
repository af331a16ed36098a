/*
 *  display/drivers/hid.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  USB HID transport via hidapi
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

use hidapi::{HidApi, HidDevice};
use log::{debug, info};

use crate::display::error::DisplayError;
use crate::display::packet::{Packet, CHUNK_LEN};
use crate::display::traits::LedTransport;

/// Report id prefixed to every chunk
const REPORT_ID: u8 = 0x00;

/// Exclusive handle on the panel's HID interface
pub struct HidTransport {
    device: HidDevice,
    name: String,
}

impl HidTransport {
    /// Open the first device matching the ids
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, DisplayError> {
        let api = HidApi::new()?;
        let device = api.open(vendor_id, product_id).map_err(|e| {
            debug!("hid open {:04x}:{:04x} failed: {}", vendor_id, product_id, e);
            DisplayError::DeviceNotFound { vendor_id, product_id }
        })?;

        let product = device
            .get_product_string()
            .ok()
            .flatten()
            .unwrap_or_else(|| "unknown".to_string());
        info!("Opened HID device {:04x}:{:04x} ({})", vendor_id, product_id, product);

        Ok(HidTransport {
            device,
            name: format!("hid {:04x}:{:04x}", vendor_id, product_id),
        })
    }
}

impl LedTransport for HidTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<(), DisplayError> {
        let mut report = [0u8; CHUNK_LEN + 1];
        for chunk in packet.chunks() {
            report[0] = REPORT_ID;
            report[1..].copy_from_slice(chunk);
            check_written(self.device.write(&report)?, report.len())?;
        }
        Ok(())
    }
}

/// The device must take the whole report, id byte included
fn check_written(written: usize, expected: usize) -> Result<(), DisplayError> {
    if written < expected {
        return Err(DisplayError::ShortWrite { expected, actual: written });
    }
    Ok(())
}
