//! Configuration for the Ceph dashboard endpoint, transport retries and the
//! operation engine

use crate::error::{CephError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide ceiling for operation resubmissions.
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

pub const DEFAULT_RETRY_COUNT: u32 = 10;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLL_CYCLES: u32 = 60;

/// Dashboard endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub protocol: String,
    pub api_path: String,
    pub skip_tls: bool,
    /// Per-request timeout in seconds
    pub timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 8443,
            protocol: "https".to_string(),
            api_path: "api".to_string(),
            skip_tls: false,
            timeout: 300,
        }
    }
}

impl ServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL for an API sub path, e.g. `https://host:8443/api/block/image`
    pub fn url(&self, sub_path: &str) -> String {
        format!(
            "{}://{}:{}/{}/{}",
            self.protocol,
            self.address,
            self.port,
            self.api_path.trim_matches('/'),
            sub_path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(CephError::Validation(
                "Server address cannot be empty".to_string(),
            ));
        }
        if self.protocol != "http" && self.protocol != "https" {
            return Err(CephError::Validation(format!(
                "Invalid protocol: {}. Must be http or https",
                self.protocol
            )));
        }
        if self.port == 0 {
            return Err(CephError::Validation(
                "Port must be greater than 0".to_string(),
            ));
        }
        if self.timeout == 0 {
            return Err(CephError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        // the assembled URL must parse
        url::Url::parse(&self.url(""))?;
        Ok(())
    }
}

/// Transport-level retry budget applied to mutating requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub retry_count: u32,
    pub retry_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: DEFAULT_RETRY_WAIT,
        }
    }
}

impl RetryConfig {
    pub fn new(retry_count: u32, retry_wait: Duration) -> Self {
        Self {
            retry_count,
            retry_wait,
        }
    }
}

/// Limits for the operation engine: resubmissions and task polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub max_poll_cycles: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_cycles: DEFAULT_MAX_POLL_CYCLES,
        }
    }
}

impl EngineConfig {
    /// Use one iteration limit for both the attempt ceiling and the poll budget
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_attempts = iterations;
        self.max_poll_cycles = iterations;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_poll_cycles(mut self, max_poll_cycles: u32) -> Self {
        self.max_poll_cycles = max_poll_cycles;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(CephError::Validation(format!(
                "max_attempts must be between 1 and {}",
                MAX_ATTEMPTS_LIMIT
            )));
        }
        if self.max_poll_cycles == 0 {
            return Err(CephError::Validation(
                "max_poll_cycles must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub retry: RetryConfig,
    pub engine: EngineConfig,
    pub verbose: bool,
}

impl ClientConfig {
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.engine.validate()
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CEPH_ADDRESS") {
            config.server.address = val;
        }
        if let Some(port) = env_parse("CEPH_PORT") {
            config.server.port = port;
        }
        if let Ok(val) = std::env::var("CEPH_PROTOCOL") {
            config.server.protocol = val;
        }
        if let Ok(val) = std::env::var("CEPH_API_PATH") {
            config.server.api_path = val;
        }
        if let Ok(val) = std::env::var("CEPH_SKIP_TLS") {
            config.server.skip_tls = env_flag(&val);
        }
        if let Some(timeout) = env_parse("CEPH_TIMEOUT") {
            config.server.timeout = timeout;
        }
        if let Some(count) = env_parse("CEPH_RETRY_COUNT") {
            config.retry.retry_count = count;
        }
        if let Some(secs) = env_parse("CEPH_RETRY_WAIT_SECS") {
            config.retry.retry_wait = Duration::from_secs(secs);
        }
        if let Some(attempts) = env_parse("CEPH_MAX_ATTEMPTS") {
            config.engine.max_attempts = attempts;
        }
        if let Some(ms) = env_parse("CEPH_POLL_INTERVAL_MS") {
            config.engine.poll_interval = Duration::from_millis(ms);
        }
        if let Some(cycles) = env_parse("CEPH_MAX_POLL_CYCLES") {
            config.engine.max_poll_cycles = cycles;
        }
        if let Ok(val) = std::env::var("CEPH_VERBOSE") {
            config.verbose = env_flag(&val);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
