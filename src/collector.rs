// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! On-demand sample collection
//!
//! A [`MetricSource`] describes a fixed set of gauges and produces fresh
//! values for them when asked. [`SampleCollector`] is the MCP3008 source:
//! every `collect()` is a full 8-channel sweep on the bus, taken under a
//! lock so two scrapes can never interleave transactions.
//!
//! ## Blocking
//!
//! `collect()` blocks the calling thread for the duration of eight
//! sequential transfers. No timeout is applied here; a hung transfer holds
//! the lock until the bus driver returns.

use crate::bus::SpiBus;
use crate::channel::{Channel, CHANNEL_COUNT};
use crate::error::{AdcError, BusError, Result};
use crate::protocol::Reading;
use crate::reader::BusReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Metric name prefix
pub const METRIC_PREFIX: &str = "mcp3008_channel_";

/// Static description of one channel gauge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Channel this gauge reports
    pub channel: Channel,
    /// Metric name, e.g. `mcp3008_channel_3`
    pub name: String,
    /// Help text
    pub help: String,
}

impl MetricDescriptor {
    /// Descriptor for `channel`
    pub fn for_channel(channel: Channel) -> Self {
        Self {
            channel,
            name: format!("{}{}", METRIC_PREFIX, channel),
            help: format!("Current value of the MCP3008 channel {}", channel),
        }
    }
}

/// One gauge observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Channel the value was read from
    pub channel: Channel,
    /// Raw ADC count as a gauge value
    pub value: f64,
}

/// Trait for sources that are sampled when a consumer asks for them
pub trait MetricSource: Send + Sync {
    /// The gauges this source reports, in a stable order
    fn describe(&self) -> &[MetricDescriptor];

    /// Fresh values for every described gauge, or nothing if they could
    /// not all be read
    fn collect(&self) -> Vec<Sample>;
}

/// Counters about past sweeps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Sweeps attempted
    pub sweeps: u64,
    /// Sweeps abandoned because of an error
    pub failed_sweeps: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

/// The MCP3008 metric source
///
/// Owns the bus for its whole lifetime. Build it once at startup and share
/// it by reference (or `Arc`) with whatever serves scrapes.
#[derive(Debug)]
pub struct SampleCollector<B> {
    descriptors: Vec<MetricDescriptor>,
    reader: Mutex<BusReader<B>>,
    sweeps: AtomicU64,
    failed_sweeps: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl<B: SpiBus> SampleCollector<B> {
    /// Build the descriptor table and take ownership of the bus
    pub fn new(bus: B) -> Self {
        let descriptors = Channel::iter().map(MetricDescriptor::for_channel).collect();
        Self {
            descriptors,
            reader: Mutex::new(BusReader::new(bus)),
            sweeps: AtomicU64::new(0),
            failed_sweeps: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Read all channels once, holding the bus for the whole sweep
    ///
    /// If an earlier holder of the bus panicked, this sweep fails with
    /// [`BusError::Unavailable`] and the lock is cleared for the next one.
    pub fn sweep(&self) -> Result<[Reading; CHANNEL_COUNT]> {
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        let result = self
            .lock_reader()
            .and_then(|mut reader| reader.read_all());

        result.map_err(|e| {
            self.record_failure(&e);
            AdcError::Bus(e)
        })
    }

    /// Run `f` against the bus while holding the sweep lock
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R> {
        let mut reader = self.lock_reader()?;
        Ok(f(reader.bus_mut()))
    }

    /// Snapshot of the sweep counters
    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            failed_sweeps: self.failed_sweeps.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Consume the collector and hand back the bus
    pub fn into_bus(self) -> B {
        self.reader
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_inner()
    }

    fn lock_reader(&self) -> std::result::Result<MutexGuard<'_, BusReader<B>>, BusError> {
        self.reader.lock().map_err(|poisoned| {
            drop(poisoned);
            self.reader.clear_poison();
            warn!("Bus lock was poisoned, failing this sweep");
            BusError::Unavailable {
                reason: "bus lock poisoned by an earlier sweep".to_string(),
            }
        })
    }

    fn record_failure(&self, err: &BusError) {
        self.failed_sweeps.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }
}

impl<B: SpiBus> MetricSource for SampleCollector<B> {
    fn describe(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    fn collect(&self) -> Vec<Sample> {
        match self.sweep() {
            Ok(readings) => {
                debug!("MCP3008 sweep complete");
                Channel::iter()
                    .map(|channel| Sample {
                        channel,
                        value: readings[channel.as_usize()].as_f64(),
                    })
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read MCP3008 channels");
                Vec::new()
            }
        }
    }
}
