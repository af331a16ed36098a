/*
 *  display/drivers/mock.rs
 *
 *  digilcd - every digit counts
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock transport for testing without hardware
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

use std::sync::{Arc, Mutex};

use crate::display::error::DisplayError;
use crate::display::packet::Packet;
use crate::display::traits::LedTransport;

/// Mock transport for testing
///
/// Every packet written is recorded in shared state, so a test can keep a
/// handle after the transport itself has been moved into a manager.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

/// Internal state for the mock transport (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockTransportState {
    /// Packets delivered, oldest first
    pub packets: Vec<Packet>,

    /// Number of write attempts, failed ones included
    pub write_attempts: usize,

    /// Simulate failures (for error testing)
    pub simulate_write_failure: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockTransportState>> {
        Arc::clone(&self.state)
    }

    /// Number of packets delivered
    pub fn packet_count(&self) -> usize {
        self.state.lock().map(|s| s.packets.len()).unwrap_or(0)
    }

    pub fn last_packet(&self) -> Option<Packet> {
        self.state.lock().ok().and_then(|s| s.packets.last().cloned())
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.simulate_write_failure = failing;
        }
    }
}

impl LedTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<(), DisplayError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DisplayError::Transport("mock state poisoned".to_string()))?;
        state.write_attempts += 1;

        if state.simulate_write_failure {
            return Err(DisplayError::Transport("Simulated write failure".to_string()));
        }

        state.packets.push(packet.clone());
        Ok(())
    }
}
