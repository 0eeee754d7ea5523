//! Per-step cost of the gateway's hot paths
//!
//! Run with: cargo bench --bench gateway

use std::io::{self, Read};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use robot_gateway::identity::{PlayerIdentity, Team};
use robot_gateway::net::framing::{encode_frame, FrameDecoder};
use robot_gateway::net::protocol::{
    encode, AccelerometerMeasurement, CameraMeasurement, GyroMeasurement,
    PositionSensorMeasurement, SensorMeasurements, Vector3,
};
use robot_gateway::quota::store::MemoryQuotaStore;
use robot_gateway::quota::QuotaTracker;

/// Non-blocking reader handing out fixed-size chunks, then "would block"
struct ChunkedReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: usize,
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.data.len() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn humanoid_snapshot(camera: Option<(u32, u32)>) -> SensorMeasurements {
    let mut snapshot = SensorMeasurements {
        time: 4096,
        real_time: 1_700_000_000_000,
        ..Default::default()
    };
    snapshot.accelerometers.push(AccelerometerMeasurement {
        name: "accelerometer".to_string(),
        value: Vector3 { x: 0.1, y: -0.2, z: 9.81 },
    });
    snapshot.gyros.push(GyroMeasurement {
        name: "gyro".to_string(),
        value: Vector3::default(),
    });
    for i in 0..20 {
        snapshot.position_sensors.push(PositionSensorMeasurement {
            name: format!("joint_{}_sensor", i),
            value: i as f64 * 0.01,
        });
    }
    if let Some((width, height)) = camera {
        snapshot.cameras.push(CameraMeasurement {
            name: "camera".to_string(),
            width,
            height,
            quality: -1,
            image: vec![127; (width * height * 3) as usize],
        });
    }
    snapshot
}

/// Reassembly of a step's worth of requests delivered in small chunks
fn bench_frame_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_reassembly");

    let mut stream = Vec::new();
    for size in [64usize, 256, 1024, 4096] {
        stream.extend_from_slice(&encode_frame(&vec![7u8; size]));
    }
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut reader = ChunkedReader { data: &stream, pos: 0, chunk };
                let mut decoder = FrameDecoder::default();
                let mut messages = 0;
                while let Ok(Some(message)) = decoder.poll(&mut reader) {
                    black_box(&message);
                    messages += 1;
                }
                messages
            })
        });
    }
    group.finish();
}

/// Snapshot encoding with and without a raw camera frame
fn bench_snapshot_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_encode");

    for (label, camera) in [("sensors", None), ("qvga_camera", Some((320, 240)))] {
        let snapshot = humanoid_snapshot(camera);
        group.bench_function(label, |b| b.iter(|| encode(black_box(&snapshot))));
    }
    group.finish();
}

/// Quota check against a full team in memory
fn bench_quota_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("quota_check");

    for step_ms in [8u32, 16, 32] {
        let store = MemoryQuotaStore::new();
        let mut teammates: Vec<_> = (2..=4)
            .map(|player| {
                QuotaTracker::new(
                    PlayerIdentity::new(Team::Red, player),
                    4,
                    1000 * 1024 * 1024,
                    step_ms,
                    store.clone(),
                )
            })
            .collect();
        for (i, mate) in teammates.iter_mut().enumerate() {
            mate.check(0, 10_000 * (i + 1));
        }

        let mut tracker = QuotaTracker::new(
            PlayerIdentity::new(Team::Red, 1),
            4,
            1000 * 1024 * 1024,
            step_ms,
            store,
        );
        let mut time = 0u32;
        group.bench_with_input(BenchmarkId::new("step_ms", step_ms), &step_ms, |b, &step_ms| {
            b.iter(|| {
                time = time.wrapping_add(step_ms);
                black_box(tracker.check(time, 4096))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_frame_reassembly,
    bench_snapshot_encode,
    bench_quota_check,
);

criterion_main!(benches);
