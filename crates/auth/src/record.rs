//! Agent records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use a2e_core::{AgentId, ApiId, CredentialId};

/// A registered agent, as persisted. Carries the *hash* of the API key,
/// never the key itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    /// Hex SHA-256 of the API key.
    pub api_key_hash: String,
    /// Permitted API ids; empty means all.
    #[serde(default)]
    pub allowed_apis: Vec<ApiId>,
    /// Permitted credential ids; empty means all.
    #[serde(default)]
    pub allowed_credentials: Vec<CredentialId>,
    /// Permitted operation kinds; empty means all.
    #[serde(default)]
    pub allowed_operations: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

/// Operator-facing projection of an agent: everything except the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentSummary {
    pub id: AgentId,
    pub name: String,
    pub allowed_apis: Vec<ApiId>,
    pub allowed_credentials: Vec<CredentialId>,
    pub allowed_operations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<&AgentRecord> for AgentSummary {
    fn from(record: &AgentRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            allowed_apis: record.allowed_apis.clone(),
            allowed_credentials: record.allowed_credentials.clone(),
            allowed_operations: record.allowed_operations.clone(),
            created_at: record.created_at,
            last_used: record.last_used,
        }
    }
}
