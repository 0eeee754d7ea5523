use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::robot::constants::{net, quota, timing};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing port argument")]
    MissingPort,
    #[error("Invalid port '{0}'")]
    InvalidPort(String),
    #[error("{0}")]
    Invalid(String),
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the listener to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Peer hostnames allowed to connect
    pub allowed_hosts: Vec<String>,
    /// Wall time a step may take before diagnostics are forced
    pub step_budget: Duration,
    /// 0 silent, 1 on overrun, 2 step cost every step, 3 phase recap every step
    pub benchmark_level: u8,
    /// Bytes the team may send over the trailing second
    pub team_quota: u64,
    /// Players per team
    pub team_size: u8,
    /// Directory holding the shared quota records
    pub quota_dir: PathBuf,
    /// Largest inbound payload accepted
    pub max_message_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 10001,
            allowed_hosts: Vec::new(),
            step_budget: Duration::from_secs_f64(timing::STEP_BUDGET_MS / 1000.0),
            benchmark_level: timing::BENCHMARK_LEVEL,
            team_quota: quota::TEAM_QUOTA,
            team_size: quota::TEAM_SIZE,
            quota_dir: PathBuf::from("."),
            max_message_size: net::MAX_MESSAGE_SIZE,
        }
    }
}

impl GatewayConfig {
    /// Build from process arguments: `port` then zero or more allowed hostnames
    ///
    /// `args` excludes the program name.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let port = args.next().ok_or(ConfigError::MissingPort)?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;

        Ok(Self {
            port,
            allowed_hosts: args.collect(),
            ..Self::default()
        })
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from a variable lookup, ignoring invalid values
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                self.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(budget) = lookup("STEP_BUDGET_MS") {
            match budget.parse::<f64>() {
                Ok(ms) if ms > 0.0 && ms.is_finite() => {
                    self.step_budget = Duration::from_secs_f64(ms / 1000.0);
                }
                Ok(_) => tracing::warn!("STEP_BUDGET_MS must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid STEP_BUDGET_MS '{}', using default", budget),
            }
        }

        if let Some(level) = lookup("BENCHMARK_LEVEL") {
            match level.parse::<u8>() {
                Ok(parsed) if parsed <= 3 => self.benchmark_level = parsed,
                Ok(_) => tracing::warn!("BENCHMARK_LEVEL must be 0-3, using default"),
                Err(_) => tracing::warn!("Invalid BENCHMARK_LEVEL '{}', using default", level),
            }
        }

        if let Some(bytes) = lookup("TEAM_QUOTA_BYTES") {
            match bytes.parse::<u64>() {
                Ok(parsed) if parsed > 0 => self.team_quota = parsed,
                Ok(_) => tracing::warn!("TEAM_QUOTA_BYTES must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid TEAM_QUOTA_BYTES '{}', using default", bytes),
            }
        }

        if let Some(size) = lookup("TEAM_SIZE") {
            match size.parse::<u8>() {
                Ok(parsed) if parsed > 0 => self.team_size = parsed,
                Ok(_) => tracing::warn!("TEAM_SIZE must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid TEAM_SIZE '{}', using default", size),
            }
        }

        if let Some(dir) = lookup("QUOTA_DIR") {
            self.quota_dir = PathBuf::from(dir);
        }

        if let Some(size) = lookup("MAX_MESSAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.max_message_size = parsed,
                Ok(_) => tracing::warn!("MAX_MESSAGE_SIZE must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid MAX_MESSAGE_SIZE '{}', using default", size),
            }
        }
    }

    /// Arguments plus environment overrides, validated
    pub fn load<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::from_args(args)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("Port cannot be 0".to_string()));
        }
        if self.team_quota == 0 {
            return Err(ConfigError::Invalid("team_quota must be at least 1".to_string()));
        }
        if self.team_size == 0 {
            return Err(ConfigError::Invalid("team_size must be at least 1".to_string()));
        }
        if self.step_budget.is_zero() {
            return Err(ConfigError::Invalid("step_budget must be > 0".to_string()));
        }
        Ok(())
    }
}
