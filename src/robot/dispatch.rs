//! Actuator command dispatch
//!
//! Applies one decoded batch to the robot. Problems never fail the batch;
//! each one becomes a warning for the next snapshot.

use crate::host::{DeviceHandle, DeviceHost, DeviceKind};
use crate::net::protocol::{ActuatorRequests, SensorTimeStep};
use crate::robot::subscription::Subscriptions;

/// Validation outcome reported to the client as a warning entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandWarning {
    #[error("Motor \"{name}\" not found, {command} command ignored.")]
    MotorNotFound { name: String, command: &'static str },
    #[error("Camera \"{name}\" not found, {command} command ignored.")]
    CameraNotFound { name: String, command: &'static str },
    #[error("CameraQuality is not yet implemented, ignored.")]
    QualityNotImplemented,
    #[error("Device \"{0}\" not found, time step command, ignored.")]
    DeviceNotFound(String),
    #[error("Device \"{0}\" is not supported, time step command, ignored.")]
    UnsupportedDevice(String),
    #[error("Time step for \"{name}\" should be greater or equal to {min}, ignoring {requested} value.")]
    PeriodTooSmall { name: String, min: u32, requested: u32 },
    #[error("Time step for \"{name}\" should be a multiple of {step}, ignoring {requested} value.")]
    PeriodMisaligned { name: String, step: u32, requested: u32 },
    #[error("Malformed actuator request: {0}")]
    Malformed(String),
}

fn motor<H: DeviceHost>(host: &H, name: &str) -> Option<DeviceHandle> {
    host.resolve(name).filter(|h| h.kind == DeviceKind::Motor)
}

fn camera<H: DeviceHost>(host: &H, name: &str) -> Option<DeviceHandle> {
    host.resolve(name).filter(|h| h.kind == DeviceKind::Camera)
}

/// Apply every command of a batch, returning the warnings in command order
///
/// Subscription changes are staged in `subscriptions`; newly enabled devices
/// only become reportable after the next `commit`.
pub fn apply<H: DeviceHost>(
    requests: &ActuatorRequests,
    host: &mut H,
    subscriptions: &mut Subscriptions,
) -> Vec<CommandWarning> {
    let mut warnings = Vec::new();

    macro_rules! motor_command {
        ($list:expr, $command:literal, |$m:ident, $id:ident| $apply:expr) => {
            for $m in &$list {
                match motor(host, &$m.name) {
                    Some(handle) => {
                        let $id = handle.id;
                        $apply;
                    }
                    None => warnings.push(CommandWarning::MotorNotFound {
                        name: $m.name.clone(),
                        command: $command,
                    }),
                }
            }
        };
    }

    motor_command!(requests.motor_positions, "position", |m, id| {
        host.set_position(id, m.position)
    });
    motor_command!(requests.motor_velocities, "velocity", |m, id| {
        host.set_velocity(id, m.velocity)
    });
    motor_command!(requests.motor_forces, "force", |m, id| {
        host.set_force(id, m.force)
    });
    motor_command!(requests.motor_torques, "torque", |m, id| {
        host.set_torque(id, m.torque)
    });
    motor_command!(requests.motor_pids, "PID", |m, id| {
        host.set_pid(id, m.pid.x, m.pid.y, m.pid.z)
    });

    for quality in &requests.camera_qualities {
        if camera(host, &quality.name).is_some() {
            warnings.push(CommandWarning::QualityNotImplemented);
        } else {
            warnings.push(CommandWarning::CameraNotFound {
                name: quality.name.clone(),
                command: "quality",
            });
        }
    }

    for exposure in &requests.camera_exposures {
        match camera(host, &exposure.name) {
            Some(handle) => host.set_exposure(handle.id, exposure.exposure),
            None => warnings.push(CommandWarning::CameraNotFound {
                name: exposure.name.clone(),
                command: "exposure",
            }),
        }
    }

    for step in &requests.sensor_time_steps {
        if let Err(warning) = apply_time_step(step, host, subscriptions) {
            warnings.push(warning);
        }
    }

    warnings
}

/// Validate and apply one sampling-period request
fn apply_time_step<H: DeviceHost>(
    request: &SensorTimeStep,
    host: &mut H,
    subscriptions: &mut Subscriptions,
) -> Result<(), CommandWarning> {
    let handle = host
        .resolve(&request.name)
        .ok_or_else(|| CommandWarning::DeviceNotFound(request.name.clone()))?;
    let basic = host.basic_time_step();
    let period = request.timestep;

    if period != 0 && period < basic {
        return Err(CommandWarning::PeriodTooSmall {
            name: request.name.clone(),
            min: basic,
            requested: period,
        });
    }
    if basic != 0 && period % basic != 0 {
        return Err(CommandWarning::PeriodMisaligned {
            name: request.name.clone(),
            step: basic,
            requested: period,
        });
    }
    if !handle.kind.is_sensor() {
        return Err(CommandWarning::UnsupportedDevice(request.name.clone()));
    }

    host.enable(handle.id, period);
    if period == 0 {
        subscriptions.disable(handle.id);
    } else {
        subscriptions.stage(handle.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimRobot;
    use crate::host::TouchKind;
    use crate::net::protocol::{
        CameraExposure, CameraQuality, MotorForce, MotorPid, MotorPosition, MotorTorque,
        MotorVelocity, Vector3,
    };
    use crate::robot::subscription::SubscriptionState;

    fn robot() -> SimRobot {
        SimRobot::new("red player 1", 32)
            .with_device("knee", DeviceKind::Motor)
            .with_device("accelerometer", DeviceKind::Accelerometer)
            .with_device("bumper", DeviceKind::TouchSensor(TouchKind::Bumper))
            .with_device("led", DeviceKind::Other)
            .with_camera("camera", 2, 2)
    }

    fn time_step(name: &str, timestep: u32) -> ActuatorRequests {
        ActuatorRequests {
            sensor_time_steps: vec![SensorTimeStep {
                name: name.to_string(),
                timestep,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_motor_commands_applied() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let requests = ActuatorRequests {
            motor_positions: vec![MotorPosition { name: "knee".into(), position: 0.5 }],
            motor_velocities: vec![MotorVelocity { name: "knee".into(), velocity: 2.0 }],
            motor_forces: vec![MotorForce { name: "knee".into(), force: 3.0 }],
            motor_torques: vec![MotorTorque { name: "knee".into(), torque: 4.0 }],
            motor_pids: vec![MotorPid {
                name: "knee".into(),
                pid: Vector3 { x: 10.0, y: 0.1, z: 1.0 },
            }],
            ..Default::default()
        };

        let warnings = apply(&requests, &mut robot, &mut subs);

        assert!(warnings.is_empty());
        let motor = &robot.device("knee").unwrap().motor;
        assert_eq!(motor.position, Some(0.5));
        assert_eq!(motor.velocity, Some(2.0));
        assert_eq!(motor.force, Some(3.0));
        assert_eq!(motor.torque, Some(4.0));
        assert_eq!(motor.pid, Some([10.0, 0.1, 1.0]));
    }

    #[test]
    fn test_unknown_names_warn_once_each() {
        let cases = vec![
            ActuatorRequests {
                motor_positions: vec![MotorPosition { name: "ghost".into(), position: 1.0 }],
                ..Default::default()
            },
            ActuatorRequests {
                motor_pids: vec![MotorPid { name: "ghost".into(), pid: Vector3::default() }],
                ..Default::default()
            },
            ActuatorRequests {
                camera_qualities: vec![CameraQuality { name: "ghost".into(), quality: 50 }],
                ..Default::default()
            },
            ActuatorRequests {
                camera_exposures: vec![CameraExposure { name: "ghost".into(), exposure: 1.0 }],
                ..Default::default()
            },
            time_step("ghost", 32),
        ];

        for requests in cases {
            let mut robot = robot();
            let before = format!("{:?}", robot);
            let mut subs = Subscriptions::new();

            let warnings = apply(&requests, &mut robot, &mut subs);

            assert_eq!(warnings.len(), 1, "{requests:?}");
            assert!(warnings[0].to_string().contains("\"ghost\""));
            assert_eq!(format!("{:?}", robot), before);
            assert_eq!(subs.pending_count(), 0);
        }
    }

    #[test]
    fn test_warning_texts() {
        let warning = CommandWarning::MotorNotFound {
            name: "arm".into(),
            command: "torque",
        };
        assert_eq!(warning.to_string(), "Motor \"arm\" not found, torque command ignored.");

        let warning = CommandWarning::PeriodMisaligned {
            name: "gyro".into(),
            step: 32,
            requested: 48,
        };
        assert_eq!(
            warning.to_string(),
            "Time step for \"gyro\" should be a multiple of 32, ignoring 48 value."
        );
    }

    #[test]
    fn test_motor_command_on_non_motor() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let requests = ActuatorRequests {
            motor_positions: vec![MotorPosition { name: "accelerometer".into(), position: 1.0 }],
            ..Default::default()
        };
        let warnings = apply(&requests, &mut robot, &mut subs);
        assert_eq!(
            warnings,
            vec![CommandWarning::MotorNotFound {
                name: "accelerometer".into(),
                command: "position"
            }]
        );
    }

    #[test]
    fn test_camera_commands() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let requests = ActuatorRequests {
            camera_qualities: vec![CameraQuality { name: "camera".into(), quality: 80 }],
            camera_exposures: vec![CameraExposure { name: "camera".into(), exposure: 0.7 }],
            ..Default::default()
        };
        let warnings = apply(&requests, &mut robot, &mut subs);
        assert_eq!(warnings, vec![CommandWarning::QualityNotImplemented]);
        assert_eq!(robot.device("camera").unwrap().camera.exposure, Some(0.7));
    }

    #[test]
    fn test_enable_stages_pending() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let id = robot.resolve("accelerometer").unwrap().id;

        let warnings = apply(&time_step("accelerometer", 64), &mut robot, &mut subs);

        assert!(warnings.is_empty());
        assert_eq!(subs.state(id), SubscriptionState::Pending);
        assert_eq!(robot.sampling_period(id), 64);
    }

    #[test]
    fn test_disable_removes_immediately() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let id = robot.resolve("bumper").unwrap().id;
        apply(&time_step("bumper", 32), &mut robot, &mut subs);
        subs.commit();

        let warnings = apply(&time_step("bumper", 0), &mut robot, &mut subs);

        assert!(warnings.is_empty());
        assert_eq!(subs.state(id), SubscriptionState::Inactive);
        assert_eq!(robot.sampling_period(id), 0);
    }

    #[test]
    fn test_period_too_small_rejected() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let warnings = apply(&time_step("accelerometer", 16), &mut robot, &mut subs);
        assert_eq!(
            warnings[0].to_string(),
            "Time step for \"accelerometer\" should be greater or equal to 32, ignoring 16 value."
        );
        assert_eq!(subs.pending_count(), 0);
        assert_eq!(robot.device("accelerometer").unwrap().sampling_period, 0);
    }

    #[test]
    fn test_period_misaligned_rejected() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let warnings = apply(&time_step("accelerometer", 48), &mut robot, &mut subs);
        assert!(matches!(warnings[0], CommandWarning::PeriodMisaligned { requested: 48, .. }));
        assert_eq!(subs.pending_count(), 0);
    }

    #[test]
    fn test_unsupported_device() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        for name in ["led", "knee"] {
            let warnings = apply(&time_step(name, 32), &mut robot, &mut subs);
            assert_eq!(warnings, vec![CommandWarning::UnsupportedDevice(name.to_string())]);
        }
        assert_eq!(subs.pending_count(), 0);
    }

    #[test]
    fn test_idempotent_batch() {
        let mut robot = robot();
        let mut subs = Subscriptions::new();
        let mut requests = time_step("accelerometer", 64);
        requests.motor_positions.push(MotorPosition { name: "knee".into(), position: 1.25 });

        apply(&requests, &mut robot, &mut subs);
        subs.commit();
        let first = format!("{:?}", robot);
        let first_state = subs.state(robot.resolve("accelerometer").unwrap().id);

        apply(&requests, &mut robot, &mut subs);
        subs.commit();

        assert_eq!(format!("{:?}", robot), first);
        assert_eq!(subs.state(robot.resolve("accelerometer").unwrap().id), first_state);
    }
}
