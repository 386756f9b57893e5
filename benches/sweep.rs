//! Benchmarks for MCP3008 frame handling and full sweeps

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mcp3008::{command_frame, decode_response, BusError, Channel, MetricSource, SampleCollector, SpiBus};

/// Bus that answers mid-scale on every channel without recording anything.
struct MidScaleBus;

impl SpiBus for MidScaleBus {
    fn transfer(&mut self, _tx: &[u8], rx: &mut [u8]) -> Result<(), BusError> {
        rx.copy_from_slice(&[0x00, 0x02, 0x00]);
        Ok(())
    }
}

fn bench_protocol(c: &mut Criterion) {
    let mut group = c.benchmark_group("protocol");
    group.throughput(Throughput::Elements(8));

    group.bench_function("command_frames_8_channels", |b| {
        b.iter(|| {
            for channel in Channel::iter() {
                black_box(command_frame(black_box(channel)));
            }
        })
    });

    group.bench_function("decode_8_responses", |b| {
        let frames: Vec<[u8; 3]> = (0..8u8).map(|i| [0xFF, 0xFC | (i & 0x03), i * 31]).collect();
        b.iter(|| {
            for frame in &frames {
                black_box(decode_response(black_box(frame)));
            }
        })
    });

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.throughput(Throughput::Elements(8));

    let collector = SampleCollector::new(MidScaleBus);

    group.bench_function("collect_8_channels", |b| {
        b.iter(|| {
            let samples = collector.collect();
            black_box(samples);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_protocol, bench_sweep);
criterion_main!(benches);
