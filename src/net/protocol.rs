use serde::{Deserialize, Serialize};

/// 3-component vector used for sensor readings and PID gains
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

// ============================================================================
// Client -> gateway
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorPosition {
    pub name: String,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorVelocity {
    pub name: String,
    pub velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorForce {
    pub name: String,
    pub force: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorTorque {
    pub name: String,
    pub torque: f64,
}

/// PID gains: x = P, y = I, z = D
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorPid {
    pub name: String,
    pub pid: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraQuality {
    pub name: String,
    pub quality: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraExposure {
    pub name: String,
    pub exposure: f64,
}

/// Sampling period request, 0 disables the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTimeStep {
    pub name: String,
    pub timestep: u32,
}

/// One inbound message: a batch of actuator and subscription commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuatorRequests {
    pub motor_positions: Vec<MotorPosition>,
    pub motor_velocities: Vec<MotorVelocity>,
    pub motor_forces: Vec<MotorForce>,
    pub motor_torques: Vec<MotorTorque>,
    pub motor_pids: Vec<MotorPid>,
    pub camera_qualities: Vec<CameraQuality>,
    pub camera_exposures: Vec<CameraExposure>,
    pub sensor_time_steps: Vec<SensorTimeStep>,
}

impl ActuatorRequests {
    /// Total number of commands in the batch
    pub fn len(&self) -> usize {
        self.motor_positions.len()
            + self.motor_velocities.len()
            + self.motor_forces.len()
            + self.motor_torques.len()
            + self.motor_pids.len()
            + self.camera_qualities.len()
            + self.camera_exposures.len()
            + self.sensor_time_steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Gateway -> client
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    ErrorMessage,
    WarningMessage,
}

/// Diagnostic entry carried in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: MessageType,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerMeasurement {
    pub name: String,
    pub value: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperMeasurement {
    pub name: String,
    pub value: bool,
}

/// Raw or compressed camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraMeasurement {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// -1 for raw BGR bytes
    pub quality: i32,
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceMeasurement {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Force3DMeasurement {
    pub name: String,
    pub value: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GyroMeasurement {
    pub name: String,
    pub value: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSensorMeasurement {
    pub name: String,
    pub value: f64,
}

/// Per-step reply: readings of every due sensor plus diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMeasurements {
    /// Controller time in ms since the session was accepted
    pub time: u32,
    /// Wall clock in ms since the Unix epoch
    pub real_time: u64,
    pub messages: Vec<Message>,
    pub accelerometers: Vec<AccelerometerMeasurement>,
    pub bumpers: Vec<BumperMeasurement>,
    pub cameras: Vec<CameraMeasurement>,
    pub forces: Vec<ForceMeasurement>,
    pub force3ds: Vec<Force3DMeasurement>,
    pub gyros: Vec<GyroMeasurement>,
    pub position_sensors: Vec<PositionSensorMeasurement>,
}

impl SensorMeasurements {
    pub fn warn(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            message_type: MessageType::WarningMessage,
            text: text.into(),
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            message_type: MessageType::ErrorMessage,
            text: text.into(),
        });
    }

    /// Number of sensor readings (diagnostics excluded)
    pub fn measurement_count(&self) -> usize {
        self.accelerometers.len()
            + self.bumpers.len()
            + self.cameras.len()
            + self.forces.len()
            + self.force3ds.len()
            + self.gyros.len()
            + self.position_sensors.len()
    }

    /// Drop everything, ready for the next step
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
