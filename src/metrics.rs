//! Gateway counters
//!
//! Process-wide counters updated by the step loop, rendered as Prometheus
//! text or JSON for whoever scrapes the process log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

/// Step samples kept for percentiles
const STEP_HISTORY: usize = 1000;

/// Metrics registry for one gateway
#[derive(Debug)]
pub struct Metrics {
    // Admission
    pub sessions_accepted: AtomicU64,
    pub sessions_refused: AtomicU64,
    pub sessions_closed: AtomicU64,

    // Inbound
    pub messages_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub warnings_emitted: AtomicU64,

    // Outbound
    pub snapshots_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub quota_overrides: AtomicU64,

    // Step timing (microseconds)
    pub step_count: AtomicU64,
    pub step_time_us: AtomicU64,
    pub step_time_p95_us: AtomicU64,
    pub step_time_p99_us: AtomicU64,
    pub step_time_max_us: AtomicU64,

    start_time: Instant,

    step_history: RwLock<VecDeque<u64>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_accepted: u64,
    pub sessions_refused: u64,
    pub sessions_closed: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub warnings_emitted: u64,
    pub snapshots_sent: u64,
    pub bytes_sent: u64,
    pub quota_overrides: u64,
    pub step_count: u64,
    pub step_time_p95_us: u64,
    pub step_time_p99_us: u64,
    pub step_time_max_us: u64,
    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_accepted: AtomicU64::new(0),
            sessions_refused: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            warnings_emitted: AtomicU64::new(0),
            snapshots_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            quota_overrides: AtomicU64::new(0),
            step_count: AtomicU64::new(0),
            step_time_us: AtomicU64::new(0),
            step_time_p95_us: AtomicU64::new(0),
            step_time_p99_us: AtomicU64::new(0),
            step_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            step_history: RwLock::new(VecDeque::with_capacity(STEP_HISTORY)),
        }
    }

    /// Count one decoded inbound message
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count snapshots fully written to the socket
    pub fn record_sent(&self, snapshots: u64, bytes: u64) {
        self.snapshots_sent.fetch_add(snapshots, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a step time and update percentiles
    pub fn record_step_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.step_time_us.store(us, Ordering::Relaxed);
        self.step_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.step_history.write();
        history.push_back(us);
        while history.len() > STEP_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.step_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.step_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.step_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_accepted: self.sessions_accepted.load(Ordering::Relaxed),
            sessions_refused: self.sessions_refused.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            warnings_emitted: self.warnings_emitted.load(Ordering::Relaxed),
            snapshots_sent: self.snapshots_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            quota_overrides: self.quota_overrides.load(Ordering::Relaxed),
            step_count: self.step_count.load(Ordering::Relaxed),
            step_time_p95_us: self.step_time_p95_us.load(Ordering::Relaxed),
            step_time_p99_us: self.step_time_p99_us.load(Ordering::Relaxed),
            step_time_max_us: self.step_time_max_us.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("robot_gateway_sessions_accepted_total", "Client connections admitted", "counter",
            self.sessions_accepted.load(Ordering::Relaxed));
        metric!("robot_gateway_sessions_refused_total", "Client connections refused", "counter",
            self.sessions_refused.load(Ordering::Relaxed));
        metric!("robot_gateway_sessions_closed_total", "Sessions torn down", "counter",
            self.sessions_closed.load(Ordering::Relaxed));

        metric!("robot_gateway_messages_received_total", "Actuator requests received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("robot_gateway_bytes_received_total", "Actuator request payload bytes", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("robot_gateway_warnings_total", "Warning entries sent to the client", "counter",
            self.warnings_emitted.load(Ordering::Relaxed));

        metric!("robot_gateway_snapshots_sent_total", "Sensor snapshots sent", "counter",
            self.snapshots_sent.load(Ordering::Relaxed));
        metric!("robot_gateway_bytes_sent_total", "Sensor snapshot payload bytes", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("robot_gateway_quota_overrides_total", "Snapshots replaced by the quota error", "counter",
            self.quota_overrides.load(Ordering::Relaxed));

        metric!("robot_gateway_step_time_microseconds", "Last step time in microseconds", "gauge",
            self.step_time_us.load(Ordering::Relaxed));
        metric!("robot_gateway_step_time_p95_microseconds", "95th percentile step time", "gauge",
            self.step_time_p95_us.load(Ordering::Relaxed));
        metric!("robot_gateway_step_time_p99_microseconds", "99th percentile step time", "gauge",
            self.step_time_p99_us.load(Ordering::Relaxed));
        metric!("robot_gateway_step_time_max_microseconds", "Maximum step time", "gauge",
            self.step_time_max_us.load(Ordering::Relaxed));
        metric!("robot_gateway_step_count", "Total steps processed", "counter",
            self.step_count.load(Ordering::Relaxed));
        metric!("robot_gateway_uptime_seconds", "Gateway uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON rendering of `snapshot`
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
