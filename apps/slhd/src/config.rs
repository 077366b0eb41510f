//! # Server Configuration
//!
//! Settings for the HTTP server, read from an optional TOML file and then
//! overridden by environment variables.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = "https://slhd.example.go.id"
//! rate_limit = 50
//! dashboard_cache_secs = 600
//! body_limit_bytes = 2097152
//! ```
//!
//! ## Environment Variables
//!
//! - `SLHD_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//! - `SLHD_RATE_LIMIT`: Requests per second (0 disables)
//! - `SLHD_DASHBOARD_CACHE_SECS`: Dashboard cache lifetime (0 disables)
//!
//! `SLHD_API_KEY` and `SLHD_LOG_FORMAT` are read where they are used.

use serde::{Deserialize, Serialize};
use slhd_core::SlhdError;
use slhd_core::primitives::DASHBOARD_CACHE_SECS;
use std::path::Path;

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Default request body limit: 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` keeps the localhost-only CORS default.
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
    pub dashboard_cache_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            dashboard_cache_secs: DASHBOARD_CACHE_SECS,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerConfig,
}

impl ServerConfig {
    /// Parse the `[server]` table of a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, SlhdError> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| SlhdError::InvalidInput(format!("Config parse error: {}", e)))?;
        Ok(file.server)
    }

    /// Read the file (when given), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SlhdError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    SlhdError::Io(format!("Cannot read config '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup`. Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origins) = lookup("SLHD_CORS_ORIGINS") {
            self.cors_origins = Some(origins);
        }
        if let Some(raw) = lookup("SLHD_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rps) => self.rate_limit = rps,
                Err(_) => tracing::warn!("Ignoring invalid SLHD_RATE_LIMIT '{}'", raw),
            }
        }
        if let Some(raw) = lookup("SLHD_DASHBOARD_CACHE_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.dashboard_cache_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid SLHD_DASHBOARD_CACHE_SECS '{}'", raw),
            }
        }
    }

    /// `host:port` for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_table_uses_defaults() {
        let config = ServerConfig::from_toml("").expect("parse");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.dashboard_cache_secs, 600);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config = ServerConfig::from_toml("[server]\nport = 9000\nrate_limit = 0\n")
            .expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.rate_limit, 0);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn malformed_toml_is_invalid_input() {
        assert!(matches!(
            ServerConfig::from_toml("[server\nport = 1"),
            Err(SlhdError::InvalidInput(_))
        ));
    }

    #[test]
    fn environment_overrides_file() {
        let env: BTreeMap<&str, &str> = [
            ("SLHD_CORS_ORIGINS", "*"),
            ("SLHD_RATE_LIMIT", "25"),
            ("SLHD_DASHBOARD_CACHE_SECS", "soon"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.cors_origins.as_deref(), Some("*"));
        assert_eq!(config.rate_limit, 25);
        // Unparseable value leaves the default in place.
        assert_eq!(config.dashboard_cache_secs, 600);
    }
}
