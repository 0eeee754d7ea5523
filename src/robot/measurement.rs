//! Snapshot building
//!
//! Samples every active device whose period divides the controller time and
//! appends a typed record per device to the outbound snapshot.

use std::time::Instant;

use tracing::{debug, error};

use crate::host::{DeviceHost, DeviceId, DeviceKind, TouchKind};
use crate::net::protocol::{
    AccelerometerMeasurement, BumperMeasurement, CameraMeasurement, Force3DMeasurement,
    ForceMeasurement, GyroMeasurement, PositionSensorMeasurement, SensorMeasurements,
};
use crate::robot::constants::image::{HOST_CHANNELS, RAW_QUALITY, WIRE_CHANNELS};
use crate::robot::subscription::Subscriptions;

/// Whether a device with `period` is due at `time`
#[inline]
pub fn is_due(time: u32, period: u32) -> bool {
    period != 0 && time % period == 0
}

/// Drop the alpha channel of a 4-channel image, keeping channel order
pub fn strip_alpha(pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() / HOST_CHANNELS * WIRE_CHANNELS);
    for px in pixels.chunks_exact(HOST_CHANNELS) {
        out.extend_from_slice(&px[..WIRE_CHANNELS]);
    }
    out
}

/// Append a reading for every due active device
///
/// Returns the number of records added.
pub fn collect<H: DeviceHost>(
    snapshot: &mut SensorMeasurements,
    host: &H,
    subscriptions: &Subscriptions,
    time: u32,
) -> usize {
    let mut added = 0;
    for id in subscriptions.active() {
        if !is_due(time, host.sampling_period(id)) {
            continue;
        }
        if sample(snapshot, host, id) {
            added += 1;
        }
    }
    added
}

fn sample<H: DeviceHost>(snapshot: &mut SensorMeasurements, host: &H, id: DeviceId) -> bool {
    let name = host.device_name(id).to_string();
    match host.device_kind(id) {
        DeviceKind::Accelerometer => snapshot.accelerometers.push(AccelerometerMeasurement {
            name,
            value: host.values(id).into(),
        }),
        DeviceKind::Gyro => snapshot.gyros.push(GyroMeasurement {
            name,
            value: host.values(id).into(),
        }),
        DeviceKind::PositionSensor => snapshot.position_sensors.push(PositionSensorMeasurement {
            name,
            value: host.value(id),
        }),
        DeviceKind::TouchSensor(TouchKind::Bumper) => snapshot.bumpers.push(BumperMeasurement {
            name,
            value: host.value(id) == 1.0,
        }),
        DeviceKind::TouchSensor(TouchKind::Force) => snapshot.forces.push(ForceMeasurement {
            name,
            value: host.value(id),
        }),
        DeviceKind::TouchSensor(TouchKind::Force3d) => snapshot.force3ds.push(Force3DMeasurement {
            name,
            value: host.values(id).into(),
        }),
        DeviceKind::Camera => {
            let Some(image) = host.image(id) else {
                error!("Camera {} has no image", name);
                return false;
            };
            let start = Instant::now();
            let rgb = strip_alpha(image.pixels);
            debug!(
                "Camera {} {}x{} converted in {:.3} ms",
                name,
                image.width,
                image.height,
                start.elapsed().as_secs_f64() * 1000.0
            );
            snapshot.cameras.push(CameraMeasurement {
                name,
                width: image.width,
                height: image.height,
                quality: RAW_QUALITY,
                image: rgb,
            });
        }
        DeviceKind::Motor | DeviceKind::Other => {
            // Dispatch never stages these
            error!("Active device {} ({}) cannot be sampled", name, id);
            return false;
        }
    }
    true
}
