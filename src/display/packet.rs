/*
 *  display/packet.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Wire framing of an LED buffer
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

use super::frame::LedBuffer;
use super::layout::BIG_LED_COUNT;

/// Total bytes per transmission
pub const PACKET_LEN: usize = 512;

/// Transmission chunk size
pub const CHUNK_LEN: usize = 128;

/// Chunks per packet
pub const CHUNK_COUNT: usize = PACKET_LEN / CHUNK_LEN;

/// Leading byte of every packet
pub const HEADER: u8 = 0x00;

const BYTES_PER_LED: usize = 3;

// the largest panel must fit one packet
const _: () = assert!(Packet::payload_len(BIG_LED_COUNT) <= PACKET_LEN);
const _: () = assert!(PACKET_LEN % CHUNK_LEN == 0);

/// One framed LED buffer, ready for the transport
#[derive(Clone, PartialEq, Eq)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// The packet split into its fixed transmission chunks
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.0.chunks_exact(CHUNK_LEN)
    }

    /// Bytes carrying LED data for `led_count` LEDs, header included
    pub const fn payload_len(led_count: usize) -> usize {
        1 + BYTES_PER_LED * led_count
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        f.debug_struct("Packet")
            .field("len", &PACKET_LEN)
            .field("used", &used)
            .finish()
    }
}

/// Serialize an LED buffer: header, then R,G,B per LED, then zero padding
pub fn frame(buffer: &LedBuffer) -> Packet {
    debug_assert!(Packet::payload_len(buffer.len()) <= PACKET_LEN);
    let mut bytes = [0u8; PACKET_LEN];
    bytes[0] = HEADER;
    for (led, color) in buffer.as_slice().iter().enumerate() {
        let at = 1 + led * BYTES_PER_LED;
        bytes[at..at + BYTES_PER_LED].copy_from_slice(&color.to_bytes());
    }
    Packet(bytes)
}
