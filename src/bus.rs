// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! SPI bus abstraction
//!
//! [`SpiBus`] is the only thing the reader needs from the hardware: one
//! full-duplex transfer per call. [`RppalBus`] drives a real Linux spidev
//! port, [`MockBus`] stands in for it in tests.

use crate::channel::{Channel, CHANNEL_COUNT};
use crate::error::{BusError, InitError};
use crate::protocol::{Reading, FRAME_LEN, START_BYTE};
use std::fmt;
use std::str::FromStr;

/// SPI clock used for every transfer (1 MHz)
pub const CLOCK_HZ: u32 = 1_000_000;

/// Word size in bits
pub const BITS_PER_WORD: u8 = 8;

/// Trait for full-duplex SPI buses
pub trait SpiBus: Send {
    /// Clock out `tx` while clocking in `rx`, as a single transaction.
    ///
    /// Blocks until the transfer completes or the driver reports an error.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), BusError>;
}

impl<B: SpiBus + ?Sized> SpiBus for Box<B> {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), BusError> {
        (**self).transfer(tx, rx)
    }
}

/// Which SPI controller and chip-select line the ADC sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpiPort {
    /// Controller number (`/dev/spidev<bus>.x`)
    pub bus: u8,
    /// Chip-select line (`/dev/spidevx.<slave_select>`)
    pub slave_select: u8,
}

impl SpiPort {
    /// Create a port description
    pub const fn new(bus: u8, slave_select: u8) -> Self {
        Self { bus, slave_select }
    }

    /// Linux device node for this port
    pub fn device_path(&self) -> String {
        format!("/dev/spidev{}.{}", self.bus, self.slave_select)
    }
}

impl fmt::Display for SpiPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPI{}.{}", self.bus, self.slave_select)
    }
}

impl FromStr for SpiPort {
    type Err = InitError;

    /// Accepts `""` (default port), `"0.1"`, `"SPI0.1"` and `"/dev/spidev0.1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| InitError::InvalidPort {
            port: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(SpiPort::default());
        }

        let lower = trimmed.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("/dev/spidev")
            .or_else(|| lower.strip_prefix("spi"))
            .unwrap_or(lower.as_str());

        let (bus, ss) = rest
            .split_once('.')
            .ok_or_else(|| invalid("expected <bus>.<chip-select>"))?;
        let bus = bus
            .parse::<u8>()
            .map_err(|_| invalid("bus is not a number"))?;
        let slave_select = ss
            .parse::<u8>()
            .map_err(|_| invalid("chip-select is not a number"))?;

        Ok(SpiPort { bus, slave_select })
    }
}

#[cfg(feature = "rppal")]
pub use self::hardware::RppalBus;

#[cfg(feature = "rppal")]
mod hardware {
    use super::{SpiBus, SpiPort, BITS_PER_WORD, CLOCK_HZ};
    use crate::error::{BusError, InitError};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
    use tracing::debug;

    /// SPI bus backed by the Linux spidev driver
    ///
    /// The device is closed when this value is dropped.
    pub struct RppalBus {
        spi: Spi,
        port: SpiPort,
    }

    impl RppalBus {
        /// Open `port` at [`CLOCK_HZ`], mode 0 (CPOL = 0, CPHA = 0), 8 bits per word
        pub fn open(port: SpiPort) -> Result<Self, InitError> {
            let bus = match port.bus {
                0 => Bus::Spi0,
                1 => Bus::Spi1,
                2 => Bus::Spi2,
                3 => Bus::Spi3,
                4 => Bus::Spi4,
                5 => Bus::Spi5,
                6 => Bus::Spi6,
                _ => {
                    return Err(InitError::InvalidPort {
                        port: port.to_string(),
                        reason: "bus must be 0-6".to_string(),
                    })
                }
            };
            let slave_select = match port.slave_select {
                0 => SlaveSelect::Ss0,
                1 => SlaveSelect::Ss1,
                2 => SlaveSelect::Ss2,
                _ => {
                    return Err(InitError::InvalidPort {
                        port: port.to_string(),
                        reason: "chip-select must be 0-2".to_string(),
                    })
                }
            };

            let spi = Spi::new(bus, slave_select, CLOCK_HZ, Mode::Mode0).map_err(|e| {
                InitError::Open {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
            })?;
            spi.set_bits_per_word(BITS_PER_WORD)
                .map_err(|e| InitError::Configure {
                    port: port.to_string(),
                    reason: e.to_string(),
                })?;

            debug!(%port, clock_hz = CLOCK_HZ, "SPI port opened");
            Ok(Self { spi, port })
        }

        /// Port this bus was opened on
        pub fn port(&self) -> SpiPort {
            self.port
        }
    }

    impl SpiBus for RppalBus {
        fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), BusError> {
            let moved = self
                .spi
                .transfer(rx, tx)
                .map_err(|e| BusError::Transfer {
                    reason: e.to_string(),
                })?;
            if moved < tx.len() {
                return Err(BusError::ShortTransfer {
                    expected: tx.len(),
                    actual: moved,
                });
            }
            Ok(())
        }
    }

    impl Drop for RppalBus {
        fn drop(&mut self) {
            debug!(port = %self.port, "SPI port released");
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_open_rejects_unknown_bus() {
            let err = RppalBus::open(SpiPort::new(7, 0)).err().unwrap();
            assert_eq!(
                err,
                InitError::InvalidPort {
                    port: "SPI7.0".to_string(),
                    reason: "bus must be 0-6".to_string(),
                }
            );
        }

        #[test]
        fn test_open_rejects_unknown_chip_select() {
            let err = RppalBus::open(SpiPort::new(0, 3)).err().unwrap();
            assert!(matches!(err, InitError::InvalidPort { .. }));
            assert!(err.to_string().contains("chip-select must be 0-2"));
        }

        #[test]
        fn test_open_missing_device() {
            // No host exposes /dev/spidev6.2
            let err = RppalBus::open(SpiPort::new(6, 2)).err().unwrap();
            assert!(matches!(err, InitError::Open { ref port, .. } if port == "SPI6.2"));
        }
    }
}

/// An in-memory MCP3008 for testing
///
/// Answers each command frame with the configured reading for the selected
/// channel, and can be told to fail on one channel.
#[derive(Debug, Clone)]
pub struct MockBus {
    /// Reading returned for each channel
    readings: [Reading; CHANNEL_COUNT],
    /// Channel whose transfers fail, if any
    fail_on: Option<Channel>,
    /// Every command frame received, in order
    sent: Vec<[u8; FRAME_LEN]>,
}

impl MockBus {
    /// Create a bus that reads 0 on every channel
    pub fn new() -> Self {
        Self::with_readings([Reading::default(); CHANNEL_COUNT])
    }

    /// Create a bus with fixed per-channel readings
    pub fn with_readings(readings: [Reading; CHANNEL_COUNT]) -> Self {
        Self {
            readings,
            fail_on: None,
            sent: Vec::new(),
        }
    }

    /// Set the reading for one channel
    pub fn set_reading(&mut self, channel: Channel, reading: Reading) {
        self.readings[channel.as_usize()] = reading;
    }

    /// Make every transfer addressed to `channel` fail (or clear with `None`)
    pub fn fail_on(&mut self, channel: Option<Channel>) {
        self.fail_on = channel;
    }

    /// Command frames received so far
    pub fn sent(&self) -> &[[u8; FRAME_LEN]] {
        &self.sent
    }

    /// Number of transactions performed
    pub fn transactions(&self) -> usize {
        self.sent.len()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiBus for MockBus {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), BusError> {
        if tx.len() != FRAME_LEN || rx.len() != FRAME_LEN {
            return Err(BusError::ShortTransfer {
                expected: FRAME_LEN,
                actual: tx.len().min(rx.len()),
            });
        }
        if tx[0] != START_BYTE {
            return Err(BusError::Transfer {
                reason: format!("missing start bit: 0x{:02x}", tx[0]),
            });
        }

        self.sent.push([tx[0], tx[1], tx[2]]);

        let channel = Channel::new((tx[1] >> 4) & 0x07).ok_or_else(|| BusError::Transfer {
            reason: "channel selector out of range".to_string(),
        })?;
        if self.fail_on == Some(channel) {
            return Err(BusError::Transfer {
                reason: format!("injected fault on channel {}", channel),
            });
        }

        // Fill the don't-care bits with ones so decoders must mask them.
        let value = self.readings[channel.as_usize()].value();
        rx[0] = 0xFF;
        rx[1] = 0xFC | (value >> 8) as u8;
        rx[2] = (value & 0xFF) as u8;
        Ok(())
    }
}
