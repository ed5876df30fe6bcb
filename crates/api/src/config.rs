//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use a2e_error::Result;
use a2e_resilience::RateLimitConfig;
use a2e_response::ResponseFormat;
use a2e_validator::ValidationLevel;

/// The server's JSON configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub vault: VaultConfig,
    pub auth: AuthConfig,
    pub catalogs: CatalogConfig,
    pub monitoring: MonitoringConfig,
    pub rate_limiting: RateLimitingConfig,
    pub retry: RetrySection,
    pub validation: ValidationSection,
    pub responses: ResponseSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultConfig {
    pub path: PathBuf,
    /// Environment variable holding the base64 master key. The key itself
    /// never appears in the config file.
    pub master_key_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("credentials.vault.json"),
            master_key_env: "A2E_MASTER_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    pub path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("agent_auth.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub api_definitions: Option<PathBuf>,
    pub sql_queries: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitoringConfig {
    pub log_dir: PathBuf,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitingConfig {
    pub enabled: Option<bool>,
    pub requests_per_minute: Option<u32>,
    pub requests_per_hour: Option<u32>,
    pub requests_per_day: Option<u32>,
    pub api_calls_per_minute: Option<u32>,
    pub api_calls_per_hour: Option<u32>,
    pub throttle_delay_ms: Option<u64>,
}

impl RateLimitingConfig {
    /// Resolve against the library defaults.
    pub fn to_limits(&self) -> RateLimitConfig {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute.unwrap_or(defaults.requests_per_minute),
            requests_per_hour: self.requests_per_hour.unwrap_or(defaults.requests_per_hour),
            requests_per_day: self.requests_per_day.unwrap_or(defaults.requests_per_day),
            api_calls_per_minute: self
                .api_calls_per_minute
                .unwrap_or(defaults.api_calls_per_minute),
            api_calls_per_hour: self.api_calls_per_hour.unwrap_or(defaults.api_calls_per_hour),
            throttle: self.throttle_delay_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSection {
    pub level: ValidationLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseSection {
    pub format: ResponseFormat,
}

impl ServerConfig {
    /// Load the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.vault.master_key_env, "A2E_MASTER_KEY");
        assert_eq!(config.rate_limiting.to_limits().requests_per_minute, 60);
        assert_eq!(config.validation.level, ValidationLevel::Moderate);
    }

    #[test]
    fn partial_overrides_merge_with_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"server": {"port": 9999}, "rateLimiting": {"requestsPerMinute": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        let limits = config.rate_limiting.to_limits();
        assert_eq!(limits.requests_per_minute, 2);
        assert_eq!(limits.requests_per_hour, 1_000);
    }
}
