//! Long-lived services and per-execution options.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use a2e_core::AgentId;
use a2e_credential::CredentialVault;
use a2e_journal::AuditJournal;
use a2e_resilience::{RateLimiter, ResultCache, RetryPolicy};
use a2e_response::ResponseFormat;

use crate::storage::StorageBackend;

/// The process-lifetime singletons the engine works against. Constructed
/// once at startup and shared by every execution; the engine itself keeps
/// no state between executions.
pub struct EngineServices {
    pub vault: Arc<CredentialVault>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResultCache>,
    pub journal: Arc<AuditJournal>,
    /// Named backing stores for `StoreData`.
    pub storage: HashMap<String, Arc<dyn StorageBackend>>,
    pub http: reqwest::Client,
    pub retry: RetryPolicy,
}

impl EngineServices {
    pub fn new(
        vault: Arc<CredentialVault>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResultCache>,
        journal: Arc<AuditJournal>,
    ) -> Self {
        Self {
            vault,
            limiter,
            cache,
            journal,
            storage: HashMap::new(),
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_storage(mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        self.storage.insert(name.into(), backend);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for EngineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineServices")
            .field("storage", &self.storage.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Options for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub agent_id: AgentId,
    pub format: ResponseFormat,
    /// Wall-clock bound on the whole execution; on expiry remaining
    /// operations are cancelled and a partial response is emitted.
    pub max_execution_time: Option<Duration>,
}

impl ExecutionOptions {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            format: ResponseFormat::default(),
            max_execution_time: None,
        }
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_execution_time(mut self, bound: Duration) -> Self {
        self.max_execution_time = Some(bound);
        self
    }
}
