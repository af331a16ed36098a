/*
 *  display/mod.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - seven-segment rendering and framing pipeline
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

// Core trait definitions
pub mod traits;
pub mod error;

// Rendering pipeline, bottom up
pub mod segment;
pub mod number;
pub mod color;
pub mod layout;
pub mod frame;
pub mod packet;

// Packet transports
pub mod drivers;

// Display mode controller
pub mod mode_controller;

// Display manager
pub mod manager;

// Re-exports for convenience
pub use traits::{LedTransport, BoxedTransport, TransportFactory};
pub use error::DisplayError;
pub use segment::{encode_digit, DigitPattern, Glyph, Segment};
pub use number::{render_number, render_temperature, render_usage};
pub use color::{resolve, ColorSpec, LedColor, Palette, Palettes};
pub use layout::{LayoutMode, LedMap, Section};
pub use frame::{assemble, Assembler, LedBuffer, Scene, SectionView};
pub use packet::{frame, Packet, PACKET_LEN};
pub use mode_controller::{DisplayMode, DisplayModeController, ModeControllerConfig};
pub use manager::{DisplayManager, TickOutcome};
