/// Handshake tokens sent right after TCP accept, outside the framed stream
pub mod handshake {
    /// Sent to an admitted peer
    pub const WELCOME: &[u8; 8] = b"Welcome\0";
    /// Sent to a refused peer before the socket is closed
    pub const REFUSED: &[u8; 8] = b"Refused\0";
}

/// Framing limits
pub mod net {
    /// Size of the big-endian length header
    pub const HEADER_SIZE: usize = 4;
    /// Default cap on an inbound payload (16 MiB)
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
    /// Outbound frames kept while the peer is not draining its socket
    pub const MAX_OUTBOUND_BACKLOG: usize = 8;
}

/// Team bandwidth quota
pub mod quota {
    /// Bytes a team may receive over the trailing window
    /// NOTE: the error text says MB/s but this is a byte count per second of sim time
    pub const TEAM_QUOTA: u64 = 1000 * 1024 * 1024;
    /// Length of the sliding window in milliseconds of simulated time
    pub const WINDOW_MS: u32 = 1000;
    /// Players per team
    pub const TEAM_SIZE: u8 = 4;
}

/// Step timing diagnostics
pub mod timing {
    /// Allowed wall time per step before diagnostics are forced
    pub const STEP_BUDGET_MS: f64 = 1.0;
    /// 0 silent, 1 on overrun, 2 step cost every step, 3 phase recap every step
    pub const BENCHMARK_LEVEL: u8 = 1;
    /// Step samples kept by the rolling monitor
    pub const HISTORY_SAMPLES: usize = 500;
}

/// Image measurements
pub mod image {
    /// Reported quality for raw (uncompressed) images
    pub const RAW_QUALITY: i32 = -1;
    /// Channels delivered by the host camera (BGRA)
    pub const HOST_CHANNELS: usize = 4;
    /// Channels sent to the client (BGR)
    pub const WIRE_CHANNELS: usize = 3;
}
