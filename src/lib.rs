//! Robot Gateway Library
//!
//! Per-robot network gateway driven by the simulation step loop. Accepts a
//! single remote controller, applies its actuator requests to the robot and
//! replies every step with a framed snapshot of the enabled sensors, within
//! a bandwidth quota shared by the robot's team.

pub mod config;
pub mod gateway;
pub mod host;
pub mod identity;
pub mod metrics;
pub mod net;
pub mod quota;
pub mod robot;
