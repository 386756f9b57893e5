// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Analog input channels
//!
//! The MCP3008 has exactly eight single-ended inputs. [`Channel`] can only
//! hold a valid index, so code that takes a `Channel` never has to range-check.

use crate::error::AdcError;
use std::fmt;

/// Number of analog inputs on the chip
pub const CHANNEL_COUNT: usize = 8;

/// One of the eight analog inputs, 0..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    /// All channels in ascending order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel(0),
        Channel(1),
        Channel(2),
        Channel(3),
        Channel(4),
        Channel(5),
        Channel(6),
        Channel(7),
    ];

    /// Create a channel, or `None` if `index` is not in 0..=7
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Channel(index))
        } else {
            None
        }
    }

    /// Channel index as a byte
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Channel index for array access
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Iterate over all channels in order
    pub fn iter() -> impl Iterator<Item = Channel> {
        Self::ALL.into_iter()
    }
}

impl TryFrom<u8> for Channel {
    type Error = AdcError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::new(index).ok_or(AdcError::InvalidChannel(index))
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
