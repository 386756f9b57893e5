// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! MCP3008 wire format
//!
//! A conversion is a single 3-byte full-duplex exchange:
//!
//! ```text
//! TX:  0000_0001  1CCC_0000  xxxx_xxxx
//!      start      SGL + ch   padding
//! RX:  ????_????  ????_??BB  BBBB_BBBB
//!                       ^^ high 2 bits, then low 8 bits of the result
//! ```

use crate::channel::Channel;
use std::fmt;

/// Length of both the command and the response frame
pub const FRAME_LEN: usize = 3;

/// First byte of every command: the start bit
pub const START_BYTE: u8 = 0x01;

/// Single-ended mode flag, added to the channel selector before shifting
pub const SINGLE_ENDED: u8 = 0x08;

/// Padding clocked out while the result is shifted in
pub const PADDING_BYTE: u8 = 0x00;

/// Converter resolution
pub const RESOLUTION_BITS: u32 = 10;

/// Mask for the result bits carried in response byte 1
const HIGH_BITS_MASK: u8 = 0x03;

/// A raw 10-bit conversion result, 0..=1023
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Reading(u16);

impl Reading {
    /// Largest value the converter can produce
    pub const MAX: Reading = Reading((1 << RESOLUTION_BITS) - 1);

    /// Create a reading, discarding anything above bit 9
    pub const fn new(raw: u16) -> Self {
        Reading(raw & Self::MAX.0)
    }

    /// Raw count
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Raw count as a gauge value
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl From<Reading> for u16 {
    fn from(reading: Reading) -> u16 {
        reading.0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build the command frame that requests a single-ended conversion on `channel`
pub const fn command_frame(channel: Channel) -> [u8; FRAME_LEN] {
    [
        START_BYTE,
        (SINGLE_ENDED + channel.index()) << 4,
        PADDING_BYTE,
    ]
}

/// Extract the conversion result from a response frame
///
/// Byte 0 and the upper six bits of byte 1 are whatever the chip drove
/// while the command was still being clocked in; they are ignored.
pub const fn decode_response(rx: &[u8; FRAME_LEN]) -> Reading {
    let high = (rx[1] & HIGH_BITS_MASK) as u16;
    let low = rx[2] as u16;
    Reading((high << 8) | low)
}
