//! Client-facing network layer: admission, framing, wire types and the session

pub mod access;
pub mod framing;
pub mod protocol;
pub mod session;
