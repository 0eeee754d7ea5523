use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use robot_gateway::config::GatewayConfig;
use robot_gateway::gateway::Gateway;
use robot_gateway::host::sim::SimRobot;
use robot_gateway::identity::PlayerIdentity;
use robot_gateway::quota::store::FileQuotaStore;

/// Basic time step of the simulated robot
const SIM_STEP_MS: u32 = 8;
/// Steps between metrics summaries
const SUMMARY_EVERY: u64 = 10_000;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let robot_name = std::env::var("ROBOT_NAME").unwrap_or_else(|_| "red player 1".to_string());
    let identity = PlayerIdentity::from_robot_name(&robot_name)
        .with_context(|| format!("Cannot derive player identity from '{}'", robot_name))?;

    let span = info_span!("player", team = %identity.team, player = identity.player);
    let _guard = span.enter();

    info!("Robot gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load(std::env::args().skip(1))
        .context("Usage: robot-gateway <port> [allowed host]...")?;
    info!(
        "Configuration loaded: {}:{}, quota={} bytes, team_size={}",
        config.bind_address, config.port, config.team_quota, config.team_size
    );

    let store = FileQuotaStore::new(&config.quota_dir);
    let robot = SimRobot::humanoid(robot_name, SIM_STEP_MS);
    let mut gateway = Gateway::new(config, identity, robot, store)?;

    let step = Duration::from_millis(SIM_STEP_MS as u64);
    let mut steps: u64 = 0;
    loop {
        let started = Instant::now();
        gateway.step();
        steps += 1;

        if steps % SUMMARY_EVERY == 0 {
            info!("{}", gateway.monitor().status_message());
            info!("Metrics: {}", gateway.metrics().to_json());
            debug!("\n{}", gateway.metrics().to_prometheus());
        }

        if let Some(rest) = step.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
