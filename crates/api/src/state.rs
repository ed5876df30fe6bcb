//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use a2e_auth::AgentDirectory;
use a2e_credential::{CredentialVault, MasterKey};
use a2e_engine::{Engine, EngineServices, InMemoryStorage};
use a2e_error::Result;
use a2e_journal::AuditJournal;
use a2e_registry::{ApiCatalog, SqlCatalog};
use a2e_resilience::{CacheConfig, RateLimiter, ResultCache, RetryPolicy};
use a2e_response::ResponseFormat;
use a2e_validator::ValidationLevel;

use crate::config::ServerConfig;

/// Everything the route handlers need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<AgentDirectory>,
    pub vault: Arc<CredentialVault>,
    pub apis: Arc<ApiCatalog>,
    pub sql: Arc<SqlCatalog>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResultCache>,
    pub journal: Arc<AuditJournal>,
    pub engine: Arc<Engine>,
    pub validation_level: ValidationLevel,
    pub response_format: ResponseFormat,
}

impl AppState {
    /// Wire the process-lifetime services from the configuration.
    pub fn build(config: &ServerConfig) -> Result<Self> {
        let master = match std::env::var(&config.vault.master_key_env) {
            Ok(encoded) => MasterKey::from_base64(&encoded)?,
            Err(_) => {
                warn!(
                    env = %config.vault.master_key_env,
                    "master key not set; generating an ephemeral key (stored credentials will not \
                     be readable after restart)"
                );
                MasterKey::generate()
            }
        };

        let vault = Arc::new(CredentialVault::open(&master, &config.vault.path)?);
        let directory = Arc::new(AgentDirectory::open(&config.auth.path)?);

        let apis = match &config.catalogs.api_definitions {
            Some(path) if path.exists() => Arc::new(ApiCatalog::load_file(path)?),
            _ => Arc::new(ApiCatalog::new()),
        };
        let sql = match &config.catalogs.sql_queries {
            Some(path) if path.exists() => Arc::new(SqlCatalog::load_file(path)?),
            _ => Arc::new(SqlCatalog::new()),
        };

        let limiter = Arc::new(RateLimiter::new(config.rate_limiting.to_limits()));
        let cache = Arc::new(ResultCache::new(CacheConfig::default()));
        let journal = Arc::new(AuditJournal::open(&config.monitoring.log_dir)?);

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: config.retry.max_retries.unwrap_or(retry_defaults.max_retries),
            initial_delay: config
                .retry
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.initial_delay),
            max_delay: config
                .retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.max_delay),
            ..retry_defaults
        };

        let services = EngineServices::new(
            Arc::clone(&vault),
            Arc::clone(&limiter),
            Arc::clone(&cache),
            Arc::clone(&journal),
        )
        .with_storage("memory", Arc::new(InMemoryStorage::new()))
        .with_retry_policy(retry);
        let engine = Arc::new(Engine::new(Arc::new(services)));

        info!(
            apis = apis.len(),
            sql = sql.len(),
            credentials = vault.len(),
            "application state ready"
        );

        Ok(Self {
            directory,
            vault,
            apis,
            sql,
            limiter,
            cache,
            journal,
            engine,
            validation_level: config.validation.level,
            response_format: config.responses.format,
        })
    }
}
