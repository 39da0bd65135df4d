//! Criterion benchmarks for the serial hot path.
//!
//! Measures line framing over differently sized chunks and port location over
//! a realistic enumeration list.
//!
//! Run with:
//! ```bash
//! cargo bench --package plantguard-core --bench framing_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plantguard_core::{locate, Delimiter, KnownDevices, LineFramer, SensorReading, SerialDescriptor};

/// One second of firmware output at 10 readings per second, CRLF-terminated.
fn sample_stream() -> Vec<u8> {
    (0..10)
        .map(|i| format!("{}\r\n", 40 + i))
        .collect::<String>()
        .into_bytes()
}

fn bench_framing(c: &mut Criterion) {
    let stream = sample_stream();
    let mut group = c.benchmark_group("line_framer");

    for chunk in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("crlf_chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut framer = LineFramer::new(Delimiter::crlf());
                let mut count = 0;
                for piece in stream.chunks(chunk) {
                    for frame in framer.push(black_box(piece)) {
                        if SensorReading::from_frame(&frame).is_some() {
                            count += 1;
                        }
                    }
                }
                count
            })
        });
    }

    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    let mut ports: Vec<SerialDescriptor> = (0..31)
        .map(|i| SerialDescriptor::new(format!("/dev/ttyS{i}")))
        .collect();
    ports.push(
        SerialDescriptor::new("/dev/ttyACM0")
            .with_manufacturer("Arduino (www.arduino.cc)")
            .with_usb_ids(0x2341, 0x0043),
    );
    let known = KnownDevices::default();

    c.bench_function("locate_last_of_32", |b| {
        b.iter(|| locate(black_box(&ports), &known).map(|d| d.path.len()))
    });
}

criterion_group!(benches, bench_framing, bench_locate);
criterion_main!(benches);
