//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::{
    tick_period, HEARTBEAT_INTERVAL_MS, HEARTBEAT_TIMEOUT_MULTIPLE, LAG_COMP_MS, SIMULATION_TPS,
};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma separated. Empty means any.
    pub client_origin: String,

    /// Physics ticks per second
    pub tick_rate_hz: u32,
    /// Period of the liveness ping cycle
    pub heartbeat_interval_ms: u64,
    /// How many heartbeat periods a participant may go without a pong
    pub heartbeat_timeout_multiple: u32,
    /// Render-time offset sent to clients in `init`
    pub lag_comp_ms: u64,
    /// Inbound messages allowed per connection per second
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            tick_rate_hz: parse_var("TICK_RATE_HZ", SIMULATION_TPS)?,
            heartbeat_interval_ms: parse_var("HEARTBEAT_INTERVAL_MS", HEARTBEAT_INTERVAL_MS)?,
            heartbeat_timeout_multiple: parse_var(
                "HEARTBEAT_TIMEOUT_MULTIPLE",
                HEARTBEAT_TIMEOUT_MULTIPLE,
            )?,
            lag_comp_ms: parse_var("LAG_COMP_MS", LAG_COMP_MS)?,
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("TICK_RATE_HZ"));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid("HEARTBEAT_INTERVAL_MS"));
        }
        if self.heartbeat_timeout_multiple == 0 {
            return Err(ConfigError::Invalid("HEARTBEAT_TIMEOUT_MULTIPLE"));
        }
        Ok(self)
    }

    pub fn tick_period(&self) -> Duration {
        tick_period(self.tick_rate_hz)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// A participant whose last pong is older than this is considered dead
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_interval() * self.heartbeat_timeout_multiple
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: String::new(),
            tick_rate_hz: SIMULATION_TPS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_multiple: HEARTBEAT_TIMEOUT_MULTIPLE,
            lag_comp_ms: LAG_COMP_MS,
            input_rate_limit: INPUT_RATE_LIMIT,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
