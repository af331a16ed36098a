/*
 *  display/error.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the display subsystem
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

use thiserror::Error;

/// Unified error type for all display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Layout name is neither "big" nor "small"
    #[error("Unknown layout mode '{0}' (expected big or small)")]
    UnknownLayout(String),

    /// Display mode name not recognised
    #[error("Unknown display mode '{0}'")]
    UnknownMode(String),

    /// Two fields of one scene map onto the same digit segments
    #[error("Scene puts {first} and {second} on the same digits")]
    SharedDigits { first: String, second: String },

    /// No HID device with the configured ids
    #[error("No device found with vendor id {vendor_id:#06x}, product id {product_id:#06x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// HID layer error
    #[cfg(feature = "hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// Device accepted fewer bytes than were sent
    #[error("Short write: sent {expected} bytes, device took {actual}")]
    ShortWrite { expected: usize, actual: usize },

    /// Transport level failure not covered above
    #[error("Transport error: {0}")]
    Transport(String),
}
