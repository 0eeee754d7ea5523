//! Step orchestrator
//!
//! One `Gateway` serves one robot. `step` is called once per simulation
//! tick: while no client is connected it makes a single non-blocking accept
//! attempt, otherwise it drains inbound requests, builds and sends the
//! snapshot, and times each phase against the step budget.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::host::DeviceHost;
use crate::identity::PlayerIdentity;
use crate::metrics::Metrics;
use crate::net::access::{peer_hostname, AccessControl};
use crate::net::framing::{write_token, Flush, FramingError};
use crate::net::protocol::{decode, encode, ActuatorRequests, SensorMeasurements};
use crate::net::session::Session;
use crate::quota::store::QuotaStore;
use crate::quota::QuotaTracker;
use crate::robot::constants::{handshake, net::MAX_OUTBOUND_BACKLOG, timing::HISTORY_SAMPLES};
use crate::robot::dispatch::{self, CommandWarning};
use crate::robot::measurement;
use crate::robot::performance::{Phase, PhaseTimer, StepMonitor};
use crate::robot::subscription::Subscriptions;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What one step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No client and nobody waiting to connect
    Idle,
    /// A client was admitted; no snapshot is sent on this step
    Accepted,
    /// A client was turned away
    Refused,
    /// Connected step completed
    Served {
        messages: usize,
        measurements: usize,
        bytes: usize,
        quota_exceeded: bool,
    },
    /// The session ended during this step
    Closed,
}

pub struct Gateway<H, Q> {
    config: GatewayConfig,
    identity: PlayerIdentity,
    listener: TcpListener,
    access: AccessControl,
    session: Option<Session<TcpStream>>,
    host: H,
    /// Survives reconnects, like the host-side sampling periods
    subscriptions: Subscriptions,
    quota: QuotaTracker<Q>,
    snapshot: SensorMeasurements,
    /// Milliseconds of simulated time since the current client was accepted
    controller_time: u32,
    monitor: StepMonitor,
    metrics: Arc<Metrics>,
}

impl<H: DeviceHost, Q: QuotaStore> Gateway<H, Q> {
    /// Bind the listener; failure here is fatal for the robot
    pub fn new(
        config: GatewayConfig,
        identity: PlayerIdentity,
        host: H,
        store: Q,
    ) -> Result<Self, GatewayError> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).map_err(|source| GatewayError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;

        let step_ms = host.basic_time_step();
        let quota = QuotaTracker::new(identity, config.team_size, config.team_quota, step_ms, store);
        info!(
            "Listening on {} ({} ms step, allowed hosts: {:?})",
            listener.local_addr()?,
            step_ms,
            config.allowed_hosts
        );

        Ok(Self {
            access: AccessControl::new(config.allowed_hosts.clone()),
            monitor: StepMonitor::new(config.step_budget, HISTORY_SAMPLES),
            config,
            identity,
            listener,
            session: None,
            host,
            subscriptions: Subscriptions::new(),
            quota,
            snapshot: SensorMeasurements::default(),
            controller_time: 0,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Run one simulation tick
    pub fn step(&mut self) -> StepOutcome {
        let mut timer = PhaseTimer::start();
        let outcome = if self.session.is_some() {
            self.serve(&mut timer)
        } else {
            let outcome = self.accept();
            timer.mark(Phase::Accept);
            outcome
        };

        if outcome != StepOutcome::Idle {
            timer.report(self.config.benchmark_level, self.config.step_budget);
        }
        self.monitor.record(timer.total());
        self.metrics.record_step_time(timer.total());
        outcome
    }

    /// Single non-blocking admission attempt
    fn accept(&mut self) -> StepOutcome {
        let (mut stream, addr) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return StepOutcome::Idle,
            Err(e) => {
                warn!("Accept failed: {}", e);
                return StepOutcome::Idle;
            }
        };

        let peer = peer_hostname(&addr);
        let admission = self.access.admit(&peer);
        let token = if admission.is_allowed() {
            handshake::WELCOME
        } else {
            handshake::REFUSED
        };

        // The token goes out before any framed traffic, so it is written blocking
        let sent = stream
            .set_nonblocking(false)
            .map_err(FramingError::from)
            .and_then(|_| write_token(&mut stream, token));
        if let Err(e) = sent {
            warn!("Handshake with {} failed: {}", peer, e);
            return StepOutcome::Closed;
        }

        if !admission.is_allowed() {
            self.metrics.sessions_refused.fetch_add(1, Ordering::Relaxed);
            return StepOutcome::Refused;
        }

        if let Err(e) = stream.set_nonblocking(true) {
            warn!("Cannot make connection with {} non-blocking: {}", peer, e);
            return StepOutcome::Closed;
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Cannot disable Nagle for {}: {}", peer, e);
        }

        self.controller_time = 0;
        self.snapshot.clear();
        self.session = Some(Session::new(
            stream,
            peer,
            self.config.max_message_size,
            MAX_OUTBOUND_BACKLOG,
        ));
        self.metrics.sessions_accepted.fetch_add(1, Ordering::Relaxed);
        StepOutcome::Accepted
    }

    fn serve(&mut self, timer: &mut PhaseTimer) -> StepOutcome {
        self.controller_time = self
            .controller_time
            .wrapping_add(self.host.basic_time_step());

        // Receive
        let Some(session) = self.session.as_mut() else {
            return StepOutcome::Idle;
        };
        session.tick();
        let mut messages = 0;
        let mut failure = None;
        loop {
            match session.poll_message() {
                Ok(Some(payload)) => {
                    messages += 1;
                    self.metrics.record_received(payload.len());
                    debug!("Received {} bytes", payload.len());
                    let warnings = match decode::<ActuatorRequests>(&payload) {
                        Ok(requests) => {
                            dispatch::apply(&requests, &mut self.host, &mut self.subscriptions)
                        }
                        Err(e) => vec![CommandWarning::Malformed(e.to_string())],
                    };
                    self.metrics
                        .warnings_emitted
                        .fetch_add(warnings.len() as u64, Ordering::Relaxed);
                    for warning in warnings {
                        self.snapshot.warn(warning.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        timer.mark(Phase::Receive);
        if let Some(e) = failure {
            self.close(e);
            return StepOutcome::Closed;
        }

        // Build
        self.snapshot.time = self.controller_time;
        self.snapshot.real_time = wall_clock_ms();
        let measurements = measurement::collect(
            &mut self.snapshot,
            &self.host,
            &self.subscriptions,
            self.controller_time,
        );
        timer.mark(Phase::Build);

        // Update
        let promoted = self.subscriptions.commit();
        if promoted > 0 {
            debug!("{} device(s) start reporting next step", promoted);
        }
        timer.mark(Phase::Update);

        // Send
        let outcome = self.send(messages, measurements);
        timer.mark(Phase::Send);
        outcome
    }

    fn send(&mut self, messages: usize, measurements: usize) -> StepOutcome {
        let mut payload = match encode(&self.snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Cannot encode snapshot: {}", e);
                self.snapshot.clear();
                return StepOutcome::Served {
                    messages,
                    measurements,
                    bytes: 0,
                    quota_exceeded: false,
                };
            }
        };

        let total = self.quota.check(self.controller_time, payload.len());
        let quota_exceeded = self.quota.enforce(total);
        if quota_exceeded {
            let message = self.quota.exceeded_message();
            info!("Team sent {} bytes over the last second: {}", total, message);
            let (time, real_time) = (self.snapshot.time, self.snapshot.real_time);
            self.snapshot.clear();
            self.snapshot.time = time;
            self.snapshot.real_time = real_time;
            self.snapshot.error(message);
            self.metrics.quota_overrides.fetch_add(1, Ordering::Relaxed);
            payload = match encode(&self.snapshot) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Cannot encode quota error: {}", e);
                    Vec::new()
                }
            };
        }
        self.snapshot.clear();

        let Some(session) = self.session.as_mut() else {
            return StepOutcome::Closed;
        };
        let (frames, bytes) = (session.messages_sent, session.bytes_sent);
        let result = session.send(&payload);
        self.metrics
            .record_sent(session.messages_sent - frames, session.bytes_sent - bytes);
        match result {
            Ok(Flush::Complete) => {}
            Ok(Flush::Stalled) => debug!(
                "Client is not draining its socket, {} frame(s) queued",
                session.outbound_backlog()
            ),
            Err(e) => {
                self.close(e);
                return StepOutcome::Closed;
            }
        }

        StepOutcome::Served {
            messages,
            measurements,
            bytes: payload.len(),
            quota_exceeded,
        }
    }

    /// Tear down the session; subscriptions and host sampling are kept
    fn close(&mut self, reason: FramingError) {
        let Some(session) = self.session.take() else {
            return;
        };
        let age = session.created_at.elapsed().as_secs_f64();
        match reason {
            FramingError::ConnectionClosed => info!(
                "Client {} disconnected after {} steps ({:.1} s)",
                session.peer, session.steps, age
            ),
            e => warn!(
                "Closing connection with {} after {:.1} s: {}",
                session.peer, age, e
            ),
        }
        if session.has_partial_message() {
            debug!(
                "Discarding partial {}-byte request",
                session.partial_message_len()
            );
        }
        self.snapshot.clear();
        self.metrics.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn controller_time(&self) -> u32 {
        self.controller_time
    }

    pub fn identity(&self) -> PlayerIdentity {
        self.identity
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn quota(&self) -> &QuotaTracker<Q> {
        &self.quota
    }

    pub fn monitor(&self) -> &StepMonitor {
        &self.monitor
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
