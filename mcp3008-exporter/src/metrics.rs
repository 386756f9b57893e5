// MCP3008 Exporter - Prometheus metrics adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus adapter for MCP3008 metric sources.
//!
//! [`ChannelGauges`] wraps any [`MetricSource`] as a Prometheus collector.
//! Values are read from the source at scrape time and only emitted when the
//! source returned a complete set, so a failed sweep shows up as a gap
//! rather than as last scrape's numbers.

use mcp3008::{MetricSource, CHANNEL_COUNT};
use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while building or rendering metrics
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Registration or encoding failed inside the prometheus crate
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The encoder produced bytes that are not UTF-8
    #[error("Encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Prometheus collector that samples a [`MetricSource`] on every scrape.
///
/// Each scrape renders through its own gauges, so concurrent scrapes never
/// share a value.
pub struct ChannelGauges<S> {
    source: Arc<S>,
    opts: Vec<Opts>,
    descs: Vec<Desc>,
}

impl<S: MetricSource> ChannelGauges<S> {
    /// Build one gauge descriptor per descriptor the source advertises.
    pub fn new(source: Arc<S>) -> Result<Self, MetricsError> {
        let opts: Vec<Opts> = source
            .describe()
            .iter()
            .map(|desc| Opts::new(desc.name.clone(), desc.help.clone()))
            .collect();
        let descs = opts
            .iter()
            .map(|o| o.describe())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            opts,
            descs,
        })
    }
}

impl<S: MetricSource + 'static> Collector for ChannelGauges<S> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let samples = self.source.collect();
        if samples.len() != self.opts.len() {
            debug!(
                got = samples.len(),
                expected = self.opts.len(),
                "Incomplete sweep, emitting no channel values"
            );
            return Vec::new();
        }

        let mut families = Vec::with_capacity(CHANNEL_COUNT);
        for (opts, sample) in self.opts.iter().zip(&samples) {
            let gauge = match Gauge::with_opts(opts.clone()) {
                Ok(gauge) => gauge,
                Err(e) => {
                    warn!(metric = %opts.name, error = %e, "Failed to build gauge");
                    return Vec::new();
                }
            };
            gauge.set(sample.value);
            families.extend(gauge.collect());
        }
        families
    }
}

/// Create a registry holding only the channel gauges of `source`.
pub fn channel_registry<S: MetricSource + 'static>(
    source: Arc<S>,
) -> Result<Registry, MetricsError> {
    let registry = Registry::new();
    registry.register(Box::new(ChannelGauges::new(source)?))?;
    Ok(registry)
}

/// Encode everything in `registry` to Prometheus text format.
///
/// Gathering triggers a full sweep on the bus and blocks until it finishes.
pub fn encode_metrics(registry: &Registry) -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp3008::{Channel, MetricDescriptor, MockBus, Reading, Sample, SampleCollector};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn ch(i: u8) -> Channel {
        Channel::new(i).unwrap()
    }

    #[test]
    fn test_desc_lists_every_channel() {
        let source = Arc::new(SampleCollector::new(MockBus::new()));
        let gauges = ChannelGauges::new(source).unwrap();

        let names: Vec<String> = gauges.desc().iter().map(|d| d.fq_name.clone()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "mcp3008_channel_0");
        assert_eq!(names[7], "mcp3008_channel_7");
    }

    #[test]
    fn test_encode_metrics_renders_raw_counts() {
        let mut bus = MockBus::new();
        bus.set_reading(ch(0), Reading::new(512));
        bus.set_reading(ch(7), Reading::MAX);
        let registry = channel_registry(Arc::new(SampleCollector::new(bus))).unwrap();

        let output = encode_metrics(&registry).unwrap();
        assert!(output.contains("# HELP mcp3008_channel_0 Current value of the MCP3008 channel 0"));
        assert!(output.contains("# TYPE mcp3008_channel_0 gauge"));
        assert!(output.lines().any(|l| l == "mcp3008_channel_0 512"));
        assert!(output.lines().any(|l| l == "mcp3008_channel_7 1023"));
        assert!(output.lines().any(|l| l == "mcp3008_channel_3 0"));
    }

    #[test]
    fn test_failed_sweep_renders_no_values() {
        let mut bus = MockBus::new();
        bus.set_reading(ch(1), Reading::new(99));
        let source = Arc::new(SampleCollector::new(bus));
        let registry = channel_registry(Arc::clone(&source)).unwrap();

        // A good scrape first, so there is something that could go stale
        assert!(encode_metrics(&registry).unwrap().contains("mcp3008_channel_1 99"));

        source
            .with_bus(|bus| bus.fail_on(Some(ch(3))))
            .unwrap();
        let output = encode_metrics(&registry).unwrap();
        assert!(!output.contains("mcp3008_channel_"));

        source.with_bus(|bus| bus.fail_on(None)).unwrap();
        let output = encode_metrics(&registry).unwrap();
        assert_eq!(
            output
                .lines()
                .filter(|l| l.starts_with("mcp3008_channel_"))
                .count(),
            8
        );
    }

    /// Source whose every sweep reports one value on all channels, the
    /// sweep number.
    struct CountingSource {
        descriptors: Vec<MetricDescriptor>,
        sweeps: AtomicU64,
    }

    impl MetricSource for CountingSource {
        fn describe(&self) -> &[MetricDescriptor] {
            &self.descriptors
        }

        fn collect(&self) -> Vec<Sample> {
            let sweep = self.sweeps.fetch_add(1, Ordering::SeqCst) as f64;
            std::thread::yield_now();
            Channel::iter()
                .map(|channel| Sample {
                    channel,
                    value: sweep,
                })
                .collect()
        }
    }

    #[test]
    fn test_concurrent_scrapes_render_single_sweep() {
        let source = Arc::new(CountingSource {
            descriptors: Channel::iter().map(MetricDescriptor::for_channel).collect(),
            sweeps: AtomicU64::new(0),
        });
        let registry = Arc::new(channel_registry(source).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let output = encode_metrics(&registry).unwrap();
                        let values: Vec<&str> = output
                            .lines()
                            .filter(|l| l.starts_with("mcp3008_channel_"))
                            .filter_map(|l| l.split_whitespace().nth(1))
                            .collect();
                        assert_eq!(values.len(), 8);
                        assert!(values.iter().all(|v| *v == values[0]), "{:?}", values);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_desc_matches_collected_families() {
        let source = Arc::new(SampleCollector::new(MockBus::new()));
        let gauges = ChannelGauges::new(source).unwrap();

        let desc_names: Vec<String> = gauges.desc().iter().map(|d| d.fq_name.clone()).collect();
        let family_names: Vec<String> = gauges
            .collect()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert_eq!(desc_names, family_names);
    }

    #[test]
    fn test_each_scrape_is_a_fresh_sweep() {
        let source = Arc::new(SampleCollector::new(MockBus::new()));
        let registry = channel_registry(Arc::clone(&source)).unwrap();

        encode_metrics(&registry).unwrap();
        encode_metrics(&registry).unwrap();

        let transactions = source.with_bus(|bus| bus.transactions()).unwrap();
        assert_eq!(transactions, 16);
    }
}
