//! Gateway configuration.
//!
//! Built once in `main` from CLI flags (each with a `LIVEOPS_*` environment
//! fallback) and passed by value to the components that need it:
//!
//! ```bash
//! LIVEOPS_LISTEN_ADDR=0.0.0.0:8080
//! DATABASE_URL=sqlite://liveops.db?mode=rwc   # or legacy LIVEOPS_DB_PATH=liveops.db
//! LIVEOPS_LOG_LEVEL=info
//! LIVEOPS_SNIFF_TIMEOUT_MS=5000
//! LIVEOPS_SNIFF_MAX_BYTES=64
//! ```

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::mux::matcher::PREFACE_LEN;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://liveops.db?mode=rwc";
pub const DEFAULT_SNIFF_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SNIFF_MAX_BYTES: usize = 64;
pub const DEFAULT_BOOTSTRAP_VALID_DAYS: i64 = 30;

/// Read-only configuration of a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub log_level: String,
    /// Upper bound on how long a new connection may take to be classified.
    pub sniff_timeout: Duration,
    /// Upper bound on how many leading bytes are buffered for classification.
    pub sniff_max_bytes: usize,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address: {0}")]
    InvalidListenAddr(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Classification timeout must be greater than zero")]
    ZeroSniffTimeout,

    #[error("Classification byte budget must be at least {min} bytes, got {got}")]
    SniffBudgetTooSmall { min: usize, got: usize },
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: "info".to_string(),
            sniff_timeout: DEFAULT_SNIFF_TIMEOUT,
            sniff_max_bytes: DEFAULT_SNIFF_MAX_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Assemble and validate a configuration from raw CLI values.
    pub fn new(
        listen_addr: &str,
        database_url: String,
        log_level: String,
        sniff_timeout_ms: u64,
        sniff_max_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let listen_addr = listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(listen_addr.to_string()))?;

        let config = Self {
            listen_addr,
            database_url,
            log_level,
            sniff_timeout: Duration::from_millis(sniff_timeout_ms),
            sniff_max_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))?;

        if self.sniff_timeout.is_zero() {
            return Err(ConfigError::ZeroSniffTimeout);
        }
        // The RPC matcher needs to see the whole preface to say yes.
        if self.sniff_max_bytes < PREFACE_LEN {
            return Err(ConfigError::SniffBudgetTooSmall {
                min: PREFACE_LEN,
                got: self.sniff_max_bytes,
            });
        }
        Ok(())
    }
}

/// Pick the database URL: explicit URL, then legacy path, then the default file.
pub fn resolve_database_url(
    database_url: Option<String>,
    legacy_db_path: Option<String>,
) -> String {
    if let Some(url) = database_url {
        url
    } else if let Some(path) = legacy_db_path {
        if path.starts_with("sqlite:") {
            path
        } else {
            format!("sqlite://{}?mode=rwc", path)
        }
    } else {
        DEFAULT_DATABASE_URL.to_string()
    }
}
