/*
 *  display/traits.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Transport abstraction for framed LED packets
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

use crate::display::error::DisplayError;
use crate::display::packet::Packet;

/// Anything that can carry a packet to the LEDs
///
/// A write either delivers the whole packet or fails; the caller drops the
/// transport on failure and opens a fresh one later.
pub trait LedTransport: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Deliver one complete packet
    fn write_packet(&mut self, packet: &Packet) -> Result<(), DisplayError>;
}

/// Type alias for boxed transports
pub type BoxedTransport = Box<dyn LedTransport>;

/// Opens a transport for a vendor / product id pair
pub type TransportFactory = Box<dyn FnMut(u16, u16) -> Result<BoxedTransport, DisplayError> + Send>;
