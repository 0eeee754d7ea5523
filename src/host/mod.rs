//! Simulation host capabilities consumed by the gateway
//!
//! The host owns the robot's devices and the step clock. The gateway only
//! resolves devices by name, reads sensors and writes actuator targets.

pub mod sim;

use std::fmt;

/// Opaque per-robot device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a touch sensor measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    /// Binary contact
    Bumper,
    /// Single-axis force
    Force,
    /// Three-axis force
    Force3d,
}

/// Device kind tag returned alongside every handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Motor,
    Accelerometer,
    Camera,
    Gyro,
    PositionSensor,
    TouchSensor(TouchKind),
    /// Anything the gateway cannot sample (LEDs, speakers, ...)
    Other,
}

impl DeviceKind {
    /// Whether the device can be subscribed to with a sampling period
    pub fn is_sensor(&self) -> bool {
        matches!(
            self,
            DeviceKind::Accelerometer
                | DeviceKind::Camera
                | DeviceKind::Gyro
                | DeviceKind::PositionSensor
                | DeviceKind::TouchSensor(_)
        )
    }
}

/// A resolved device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: DeviceId,
    pub kind: DeviceKind,
}

/// Borrowed camera frame, 4 channels per pixel (BGRA)
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// Capability set the gateway needs from the simulation
pub trait DeviceHost {
    /// Duration of one simulation step in milliseconds
    fn basic_time_step(&self) -> u32;

    /// Resolve a device by name
    fn resolve(&self, name: &str) -> Option<DeviceHandle>;

    /// Name of a resolved device
    fn device_name(&self, id: DeviceId) -> &str;

    /// Kind of a resolved device
    fn device_kind(&self, id: DeviceId) -> DeviceKind;

    /// Configured sampling period, 0 when disabled
    fn sampling_period(&self, id: DeviceId) -> u32;

    /// Configure sampling, 0 disables
    fn enable(&mut self, id: DeviceId, period_ms: u32);

    /// Scalar reading (position sensor, force, bumper)
    fn value(&self, id: DeviceId) -> f64;

    /// Vector reading (accelerometer, gyro, 3-axis force)
    fn values(&self, id: DeviceId) -> [f64; 3];

    /// Latest camera frame
    fn image(&self, id: DeviceId) -> Option<ImageView<'_>>;

    fn set_position(&mut self, id: DeviceId, position: f64);
    fn set_velocity(&mut self, id: DeviceId, velocity: f64);
    fn set_force(&mut self, id: DeviceId, force: f64);
    fn set_torque(&mut self, id: DeviceId, torque: f64);
    fn set_pid(&mut self, id: DeviceId, p: f64, i: f64, d: f64);
    fn set_exposure(&mut self, id: DeviceId, exposure: f64);
}
