pub mod mounts;

use std::env;
use std::net::SocketAddr;

pub use mounts::{DriverConfig, MountConfig, load_mounts};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1:5244)
    pub bind_addr: SocketAddr,

    /// HMAC secret for caller tokens (default: "secret")
    pub jwt_secret: String,

    /// Mount definitions (default: "mounts.json")
    pub mounts_file: String,

    /// Bound on each upstream provider call in seconds (default: 30)
    pub upstream_timeout_secs: u64,

    /// CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5244)),
            jwt_secret: "secret".to_string(),
            mounts_file: "mounts.json".to_string(),
            upstream_timeout_secs: 30,
            allowed_origins: Vec::new(),
        }
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| o.to_string())
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.bind_addr),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            mounts_file: env::var("MOUNTS_FILE").unwrap_or(default.mounts_file),

            upstream_timeout_secs: env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.upstream_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development and tests (short upstream timeout)
    pub fn development() -> Self {
        Self {
            jwt_secret: "dev-secret".to_string(),
            upstream_timeout_secs: 5,
            ..Self::default()
        }
    }
}
