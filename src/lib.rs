// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # MCP3008 - 8-channel 10-bit ADC over SPI
//!
//! Reads raw conversion results from a Microchip MCP3008 and exposes them
//! as an on-demand metric source.
//!
//! ## Quick Start
//!
//! ```rust
//! use mcp3008::{Channel, MetricSource, MockBus, Reading, SampleCollector};
//!
//! // A real deployment opens `RppalBus::open(port)` instead.
//! let mut bus = MockBus::new();
//! bus.set_reading(Channel::new(0).unwrap(), Reading::new(512));
//!
//! let collector = SampleCollector::new(bus);
//! assert_eq!(collector.describe().len(), 8);
//!
//! let samples = collector.collect();
//! assert_eq!(samples[0].value, 512.0);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Command/response frames and the 10-bit decode
//! - [`bus`]: Full-duplex SPI seam, hardware and mock buses
//! - [`reader`]: One conversion per bus transaction
//! - [`collector`]: The metric source driven by scrapes
//! - [`channel`]: The eight analog inputs

pub mod bus;
pub mod channel;
pub mod collector;
pub mod error;
pub mod protocol;
pub mod reader;

// Re-exports for convenient access
#[cfg(feature = "rppal")]
pub use bus::RppalBus;
pub use bus::{MockBus, SpiBus, SpiPort, BITS_PER_WORD, CLOCK_HZ};
pub use channel::{Channel, CHANNEL_COUNT};
pub use collector::{CollectorStats, MetricDescriptor, MetricSource, Sample, SampleCollector};
pub use error::{AdcError, BusError, InitError, Result};
pub use protocol::{command_frame, decode_response, Reading, FRAME_LEN};
pub use reader::BusReader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
