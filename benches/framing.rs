//! Benchmarks for stream framing and report decoding
//!
//! Measures:
//! - Packet reassembly throughput across read sizes, from single bytes to whole reports
//! - Object report decoding per format
//!
//! Platform: Cross-platform (synthetic in-memory streams, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pixtrack::packet::{REPORT_DATA_BYTES, RawPacket, StreamFramer};
use pixtrack::sensor::{Frame, ReportFormat};
use pixtrack::source::ChunkedSource;
use pixtrack::test_utils::drifting_rectangle_stream;
use std::hint::black_box;

const FRAMES: usize = 100;

fn bench_framing_by_chunk_size(c: &mut Criterion) {
    let stream = drifting_rectangle_stream(FRAMES);

    let mut group = c.benchmark_group("stream_framing");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [1usize, 16, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &size| {
            b.iter(|| {
                let source = ChunkedSource::with_chunk_size(&stream, size);
                let mut payload_bytes = 0usize;
                let mut framer = StreamFramer::new(source, |packet: RawPacket<'_>| {
                    payload_bytes += packet.payload.len();
                    true
                });
                framer.wait_for_packets(FRAMES * 2).expect("stream holds every packet");
                drop(framer);
                black_box(payload_bytes)
            })
        });
    }

    group.finish();
}

fn bench_report_decoding(c: &mut Criterion) {
    let mut data = [0u8; REPORT_DATA_BYTES];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i * 37) as u8;
    }

    let mut group = c.benchmark_group("report_decoding");
    group.throughput(Throughput::Bytes(REPORT_DATA_BYTES as u64));

    for format in [ReportFormat::Full, ReportFormat::Compact, ReportFormat::Brightness, ReportFormat::Shape] {
        group.bench_with_input(BenchmarkId::new("format", format.code()), &format, |b, &format| {
            b.iter(|| black_box(Frame::decode(black_box(&data), format)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_framing_by_chunk_size, bench_report_decoding);
criterion_main!(benches);
