// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bus reader
//!
//! Turns a channel into a [`Reading`] with exactly one bus transaction.
//! Nothing is cached between calls and failures are not retried.

use crate::bus::SpiBus;
use crate::channel::{Channel, CHANNEL_COUNT};
use crate::error::BusError;
use crate::protocol::{command_frame, decode_response, Reading, FRAME_LEN};
use tracing::trace;

/// Performs MCP3008 conversions over an exclusively owned bus
#[derive(Debug)]
pub struct BusReader<B> {
    bus: B,
}

impl<B: SpiBus> BusReader<B> {
    /// Take ownership of an open bus
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Sample one channel
    pub fn read_channel(&mut self, channel: Channel) -> Result<Reading, BusError> {
        let tx = command_frame(channel);
        let mut rx = [0u8; FRAME_LEN];
        self.bus.transfer(&tx, &mut rx)?;

        let reading = decode_response(&rx);
        trace!(%channel, raw = reading.value(), "channel sampled");
        Ok(reading)
    }

    /// Sample every channel in order, stopping at the first failure
    pub fn read_all(&mut self) -> Result<[Reading; CHANNEL_COUNT], BusError> {
        let mut readings = [Reading::default(); CHANNEL_COUNT];
        for channel in Channel::iter() {
            readings[channel.as_usize()] = self.read_channel(channel)?;
        }
        Ok(readings)
    }

    /// Borrow the underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give the bus back, e.g. to close it explicitly
    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;

    fn ch(i: u8) -> Channel {
        Channel::new(i).unwrap()
    }

    #[test]
    fn test_read_channel_one_transaction() {
        let mut bus = MockBus::new();
        bus.set_reading(ch(4), Reading::new(300));
        let mut reader = BusReader::new(bus);

        assert_eq!(reader.read_channel(ch(4)).unwrap().value(), 300);
        assert_eq!(reader.bus().transactions(), 1);
        assert_eq!(reader.bus().sent()[0], command_frame(ch(4)));
    }

    #[test]
    fn test_read_channel_full_scale() {
        let mut bus = MockBus::new();
        bus.set_reading(ch(0), Reading::MAX);
        let mut reader = BusReader::new(bus);

        assert_eq!(reader.read_channel(ch(0)).unwrap().value(), 1023);
    }

    #[test]
    fn test_read_channel_propagates_error() {
        let mut bus = MockBus::new();
        bus.fail_on(Some(ch(1)));
        let mut reader = BusReader::new(bus);

        let err = reader.read_channel(ch(1)).unwrap_err();
        assert!(matches!(err, BusError::Transfer { .. }));
        // No retry
        assert_eq!(reader.bus().transactions(), 1);
    }

    #[test]
    fn test_read_all_in_order() {
        let readings = [0, 100, 200, 300, 400, 500, 600, 1023].map(Reading::new);
        let mut reader = BusReader::new(MockBus::with_readings(readings));

        assert_eq!(reader.read_all().unwrap(), readings);
        let selectors: Vec<u8> = reader.bus().sent().iter().map(|f| f[1]).collect();
        assert_eq!(
            selectors,
            vec![0x80, 0x90, 0xA0, 0xB0, 0xC0, 0xD0, 0xE0, 0xF0]
        );
    }

    #[test]
    fn test_read_all_stops_at_first_failure() {
        let mut bus = MockBus::new();
        bus.fail_on(Some(ch(3)));
        let mut reader = BusReader::new(bus);

        assert!(reader.read_all().is_err());
        assert_eq!(reader.bus().transactions(), 4);
    }

    #[test]
    fn test_reads_are_not_cached() {
        let mut reader = BusReader::new(MockBus::new());
        assert_eq!(reader.read_channel(ch(6)).unwrap().value(), 0);

        reader.bus_mut().set_reading(ch(6), Reading::new(42));
        assert_eq!(reader.read_channel(ch(6)).unwrap().value(), 42);
        assert_eq!(reader.bus().transactions(), 2);
    }
}
