//! In-memory robot used by the binary and by tests
//!
//! Devices live in a flat vector indexed by `DeviceId`. Readings are plain
//! fields the caller can set between steps; actuator writes are recorded so
//! they can be inspected afterwards.

use std::collections::HashMap;

use crate::host::{DeviceHandle, DeviceHost, DeviceId, DeviceKind, ImageView, TouchKind};

/// Last targets written to a motor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorState {
    pub position: Option<f64>,
    pub velocity: Option<f64>,
    pub force: Option<f64>,
    pub torque: Option<f64>,
    pub pid: Option<[f64; 3]>,
}

/// Raw camera frame plus the last exposure written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraState {
    pub width: u32,
    pub height: u32,
    /// BGRA, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    pub exposure: Option<f64>,
}

/// A single simulated device
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub sampling_period: u32,
    pub value: f64,
    pub values: [f64; 3],
    pub motor: MotorState,
    pub camera: CameraState,
}

impl SimDevice {
    fn new(name: &str, kind: DeviceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            sampling_period: 0,
            value: 0.0,
            values: [0.0; 3],
            motor: MotorState::default(),
            camera: CameraState::default(),
        }
    }
}

/// Simulated robot exposing the `DeviceHost` capability set
#[derive(Debug, Clone)]
pub struct SimRobot {
    name: String,
    basic_time_step: u32,
    devices: Vec<SimDevice>,
    by_name: HashMap<String, DeviceId>,
}

impl SimRobot {
    pub fn new(name: impl Into<String>, basic_time_step: u32) -> Self {
        Self {
            name: name.into(),
            basic_time_step,
            devices: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Robot with the device set of a small humanoid
    pub fn humanoid(name: impl Into<String>, basic_time_step: u32) -> Self {
        let mut robot = Self::new(name, basic_time_step)
            .with_device("accelerometer", DeviceKind::Accelerometer)
            .with_device("gyro", DeviceKind::Gyro)
            .with_camera("camera", 160, 120)
            .with_device("left_foot_bumper", DeviceKind::TouchSensor(TouchKind::Bumper))
            .with_device("right_foot_bumper", DeviceKind::TouchSensor(TouchKind::Bumper))
            .with_device("left_foot_force", DeviceKind::TouchSensor(TouchKind::Force3d))
            .with_device("right_foot_force", DeviceKind::TouchSensor(TouchKind::Force3d));
        for joint in ["neck", "head", "left_shoulder", "right_shoulder", "left_knee", "right_knee"] {
            robot = robot
                .with_device(joint, DeviceKind::Motor)
                .with_device(&format!("{joint}_sensor"), DeviceKind::PositionSensor);
        }
        robot
    }

    /// Add a device (builder style)
    pub fn with_device(mut self, name: &str, kind: DeviceKind) -> Self {
        self.add_device(name, kind);
        self
    }

    /// Add a camera with a black frame of the given size
    pub fn with_camera(mut self, name: &str, width: u32, height: u32) -> Self {
        let id = self.add_device(name, DeviceKind::Camera);
        let camera = &mut self.devices[id.0 as usize].camera;
        camera.width = width;
        camera.height = height;
        camera.pixels = vec![0; (width * height) as usize * 4];
        self
    }

    /// Add a device, replacing any previous device with the same name
    pub fn add_device(&mut self, name: &str, kind: DeviceKind) -> DeviceId {
        let id = DeviceId(self.devices.len() as u32);
        self.devices.push(SimDevice::new(name, kind));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Robot name as given by the simulation
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self, name: &str) -> Option<&SimDevice> {
        self.by_name.get(name).map(|id| &self.devices[id.0 as usize])
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut SimDevice> {
        let id = *self.by_name.get(name)?;
        self.devices.get_mut(id.0 as usize)
    }

    /// Set a scalar reading
    pub fn set_value(&mut self, name: &str, value: f64) {
        if let Some(device) = self.device_mut(name) {
            device.value = value;
        }
    }

    /// Set a vector reading
    pub fn set_values(&mut self, name: &str, values: [f64; 3]) {
        if let Some(device) = self.device_mut(name) {
            device.values = values;
        }
    }

    /// Replace a camera frame, `pixels` must hold `width * height * 4` bytes
    pub fn set_image(&mut self, name: &str, width: u32, height: u32, pixels: Vec<u8>) {
        if let Some(device) = self.device_mut(name) {
            device.camera.width = width;
            device.camera.height = height;
            device.camera.pixels = pixels;
        }
    }

    fn get(&self, id: DeviceId) -> Option<&SimDevice> {
        self.devices.get(id.0 as usize)
    }

    fn motor_mut(&mut self, id: DeviceId) -> Option<&mut MotorState> {
        self.devices
            .get_mut(id.0 as usize)
            .filter(|d| d.kind == DeviceKind::Motor)
            .map(|d| &mut d.motor)
    }
}

impl DeviceHost for SimRobot {
    fn basic_time_step(&self) -> u32 {
        self.basic_time_step
    }

    fn resolve(&self, name: &str) -> Option<DeviceHandle> {
        let id = *self.by_name.get(name)?;
        Some(DeviceHandle {
            id,
            kind: self.devices[id.0 as usize].kind,
        })
    }

    fn device_name(&self, id: DeviceId) -> &str {
        self.get(id).map(|d| d.name.as_str()).unwrap_or("")
    }

    fn device_kind(&self, id: DeviceId) -> DeviceKind {
        self.get(id).map(|d| d.kind).unwrap_or(DeviceKind::Other)
    }

    fn sampling_period(&self, id: DeviceId) -> u32 {
        self.get(id).map(|d| d.sampling_period).unwrap_or(0)
    }

    fn enable(&mut self, id: DeviceId, period_ms: u32) {
        if let Some(device) = self.devices.get_mut(id.0 as usize) {
            device.sampling_period = period_ms;
        }
    }

    fn value(&self, id: DeviceId) -> f64 {
        self.get(id).map(|d| d.value).unwrap_or(0.0)
    }

    fn values(&self, id: DeviceId) -> [f64; 3] {
        self.get(id).map(|d| d.values).unwrap_or([0.0; 3])
    }

    fn image(&self, id: DeviceId) -> Option<ImageView<'_>> {
        let device = self.get(id).filter(|d| d.kind == DeviceKind::Camera)?;
        Some(ImageView {
            width: device.camera.width,
            height: device.camera.height,
            pixels: &device.camera.pixels,
        })
    }

    fn set_position(&mut self, id: DeviceId, position: f64) {
        if let Some(motor) = self.motor_mut(id) {
            motor.position = Some(position);
        }
    }

    fn set_velocity(&mut self, id: DeviceId, velocity: f64) {
        if let Some(motor) = self.motor_mut(id) {
            motor.velocity = Some(velocity);
        }
    }

    fn set_force(&mut self, id: DeviceId, force: f64) {
        if let Some(motor) = self.motor_mut(id) {
            motor.force = Some(force);
        }
    }

    fn set_torque(&mut self, id: DeviceId, torque: f64) {
        if let Some(motor) = self.motor_mut(id) {
            motor.torque = Some(torque);
        }
    }

    fn set_pid(&mut self, id: DeviceId, p: f64, i: f64, d: f64) {
        if let Some(motor) = self.motor_mut(id) {
            motor.pid = Some([p, i, d]);
        }
    }

    fn set_exposure(&mut self, id: DeviceId, exposure: f64) {
        if let Some(device) = self
            .devices
            .get_mut(id.0 as usize)
            .filter(|d| d.kind == DeviceKind::Camera)
        {
            device.camera.exposure = Some(exposure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_returns_kind() {
        let robot = SimRobot::new("red player 1", 8).with_device("gyro", DeviceKind::Gyro);
        let handle = robot.resolve("gyro").unwrap();
        assert_eq!(handle.kind, DeviceKind::Gyro);
        assert_eq!(robot.device_name(handle.id), "gyro");
        assert!(robot.resolve("missing").is_none());
    }

    #[test]
    fn test_motor_writes_ignore_non_motors() {
        let mut robot = SimRobot::new("r 1", 8)
            .with_device("knee", DeviceKind::Motor)
            .with_device("gyro", DeviceKind::Gyro);
        let knee = robot.resolve("knee").unwrap().id;
        let gyro = robot.resolve("gyro").unwrap().id;

        robot.set_position(knee, 1.5);
        robot.set_position(gyro, 2.0);

        assert_eq!(robot.device("knee").unwrap().motor.position, Some(1.5));
        assert_eq!(robot.device("gyro").unwrap().motor.position, None);
    }

    #[test]
    fn test_humanoid_device_set() {
        let robot = SimRobot::humanoid("blue player 2", 8);
        assert_eq!(robot.resolve("neck").unwrap().kind, DeviceKind::Motor);
        assert_eq!(
            robot.resolve("neck_sensor").unwrap().kind,
            DeviceKind::PositionSensor
        );
        let camera = robot.resolve("camera").unwrap().id;
        let image = robot.image(camera).unwrap();
        assert_eq!(image.pixels.len(), 160 * 120 * 4);
    }
}
