//! The agent directory: registration, authentication, authorization.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use a2e_core::{AgentId, ApiId, CredentialId};
use a2e_credential::CredentialMetadata;
use a2e_error::{A2eError, Result};
use a2e_registry::ApiDefinition;

use crate::projection::{CapabilityView, CredentialCapability};
use crate::record::{AgentRecord, AgentSummary};

#[derive(Serialize, Deserialize)]
struct DirectoryFile {
    agents: Vec<AgentRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    agent_id: AgentId,
    iat: i64,
    exp: i64,
}

/// Registry of agents with authentication and allow-list checks.
pub struct AgentDirectory {
    agents: RwLock<BTreeMap<AgentId, AgentRecord>>,
    path: Option<PathBuf>,
    /// Process-local token signing key; not persisted, so tokens do not
    /// survive restarts (API keys do).
    signing_key: [u8; 32],
}

impl AgentDirectory {
    /// In-memory directory (tests, ephemeral deployments).
    pub fn new() -> Self {
        let mut signing_key = [0u8; 32];
        rand::rng().fill_bytes(&mut signing_key);
        Self {
            agents: RwLock::new(BTreeMap::new()),
            path: None,
            signing_key,
        }
    }

    /// Directory persisted at `path`; loads existing records when present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut directory = Self::new();
        directory.path = Some(path.clone());

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: DirectoryFile = serde_json::from_str(&raw)?;
            let mut agents = directory.agents.write();
            for record in file.agents {
                agents.insert(record.id.clone(), record);
            }
            info!(agents = agents.len(), "loaded agent directory");
        }

        Ok(directory)
    }

    /// Register an agent and return its API key. The key is returned
    /// exactly once; only its hash is stored.
    pub fn register(
        &self,
        id: AgentId,
        name: impl Into<String>,
        allowed_apis: Vec<ApiId>,
        allowed_credentials: Vec<CredentialId>,
        allowed_operations: Vec<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Result<String> {
        if self.agents.read().contains_key(&id) {
            return Err(A2eError::validation(format!("agent '{id}' already exists")));
        }

        let mut key_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut key_bytes);
        let api_key = URL_SAFE_NO_PAD.encode(key_bytes);

        let record = AgentRecord {
            id: id.clone(),
            name: name.into(),
            api_key_hash: hash_key(&api_key),
            allowed_apis,
            allowed_credentials,
            allowed_operations,
            metadata,
            created_at: Utc::now(),
            last_used: None,
        };

        self.agents.write().insert(id.clone(), record);
        self.persist()?;
        info!(agent = %id, "registered agent");
        Ok(api_key)
    }

    /// Remove an agent.
    pub fn remove(&self, id: &AgentId) -> Result<()> {
        self.agents
            .write()
            .remove(id)
            .ok_or_else(|| A2eError::not_found("Agent", id))?;
        self.persist()?;
        info!(agent = %id, "removed agent");
        Ok(())
    }

    /// Authenticate a raw API key. Compares hashes in constant time and
    /// touches `last_used` on success.
    pub fn authenticate(&self, api_key: &str) -> Option<AgentId> {
        let candidate = hash_key(api_key);
        let mut agents = self.agents.write();

        let matched = agents
            .values_mut()
            .find(|record| bool::from(record.api_key_hash.as_bytes().ct_eq(candidate.as_bytes())));

        let record = matched?;
        record.last_used = Some(Utc::now());
        let id = record.id.clone();
        drop(agents);

        if let Err(err) = self.persist() {
            warn!(error = %err, "failed to persist last_used timestamp");
        }
        Some(id)
    }

    /// Issue a short-lived signed token for an agent.
    pub fn issue_token(&self, agent_id: &AgentId, ttl: Duration) -> Result<String> {
        if !self.agents.read().contains_key(agent_id) {
            return Err(A2eError::not_found("Agent", agent_id));
        }

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            agent_id: agent_id.clone(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| A2eError::execution(format!("failed to sign token: {e}")))
    }

    /// Verify a signed token. Expired and malformed tokens are
    /// indistinguishable: both yield `None`.
    pub fn verify_token(&self, token: &str) -> Option<AgentId> {
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&self.signing_key),
            &Validation::default(),
        )
        .ok()?;

        let id = data.claims.agent_id;
        if self.agents.read().contains_key(&id) {
            Some(id)
        } else {
            None
        }
    }

    /// Authenticate an inbound request from its headers: `X-API-Key` with
    /// the raw key, or `Authorization: Bearer` with a signed token.
    pub fn authenticate_headers(
        &self,
        api_key: Option<&str>,
        authorization: Option<&str>,
    ) -> Option<AgentId> {
        if let Some(key) = api_key {
            if let Some(id) = self.authenticate(key) {
                return Some(id);
            }
        }

        if let Some(value) = authorization {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return self.verify_token(token);
            }
        }

        None
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.read().contains_key(id)
    }

    /// Operator-facing list; key hashes are not included.
    pub fn list(&self) -> Vec<AgentSummary> {
        self.agents.read().values().map(AgentSummary::from).collect()
    }

    /// Whether an agent may call the given API. Empty allow-list means all.
    pub fn is_api_allowed(&self, agent_id: &AgentId, api_id: &ApiId) -> bool {
        self.allowed(agent_id, |record| {
            record.allowed_apis.is_empty() || record.allowed_apis.contains(api_id)
        })
    }

    /// Whether an agent may use the given credential.
    pub fn is_credential_allowed(&self, agent_id: &AgentId, credential_id: &CredentialId) -> bool {
        self.allowed(agent_id, |record| {
            record.allowed_credentials.is_empty()
                || record.allowed_credentials.contains(credential_id)
        })
    }

    /// Whether an agent may dispatch the given operation kind.
    pub fn is_operation_allowed(&self, agent_id: &AgentId, operation: &str) -> bool {
        self.allowed(agent_id, |record| {
            record.allowed_operations.is_empty()
                || record.allowed_operations.iter().any(|op| op == operation)
        })
    }

    fn allowed(&self, agent_id: &AgentId, check: impl Fn(&AgentRecord) -> bool) -> bool {
        self.agents.read().get(agent_id).is_some_and(check)
    }

    /// Project the full catalog down to what one agent may see. Unknown
    /// agents get the empty view.
    pub fn filter_capabilities(
        &self,
        agent_id: &AgentId,
        apis: Vec<ApiDefinition>,
        credentials: Vec<CredentialMetadata>,
        operations: Vec<String>,
    ) -> CapabilityView {
        if !self.contains(agent_id) {
            return CapabilityView::empty();
        }

        let available_apis = apis
            .into_iter()
            .filter(|api| self.is_api_allowed(agent_id, &api.id))
            .collect();
        let available_credentials = credentials
            .into_iter()
            .filter(|cred| self.is_credential_allowed(agent_id, &cred.id))
            .map(CredentialCapability::from)
            .collect();
        let supported_operations = operations
            .into_iter()
            .filter(|op| self.is_operation_allowed(agent_id, op))
            .collect();

        CapabilityView {
            available_apis,
            available_credentials,
            supported_operations,
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = DirectoryFile {
            agents: self.agents.read().values().cloned().collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        debug!(path = %path.display(), "persisted agent directory");
        Ok(())
    }
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDirectory")
            .field("agents", &self.agents.read().len())
            .field("persistent", &self.path.is_some())
            .finish()
    }
}

fn hash_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn agent(id: &str) -> AgentId {
        AgentId::new(id).unwrap()
    }

    fn register(directory: &AgentDirectory, id: &str, apis: &[&str]) -> String {
        directory
            .register(
                agent(id),
                id.to_string(),
                apis.iter().map(|a| ApiId::new(a).unwrap()).collect(),
                vec![],
                vec![],
                BTreeMap::new(),
            )
            .unwrap()
    }

    #[test]
    fn register_returns_key_once_and_stores_only_hash() {
        let directory = AgentDirectory::new();
        let key = register(&directory, "reporter", &[]);

        // 256 bits, url-safe base64, no padding.
        assert_eq!(key.len(), 43);
        let listed = serde_json::to_string(&directory.list()).unwrap();
        assert!(!listed.contains(&key));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let directory = AgentDirectory::new();
        register(&directory, "reporter", &[]);
        let err = directory
            .register(
                agent("reporter"),
                "Reporter",
                vec![],
                vec![],
                vec![],
                BTreeMap::new(),
            )
            .unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn api_key_authentication_roundtrip() {
        let directory = AgentDirectory::new();
        let key = register(&directory, "reporter", &[]);

        assert_eq!(directory.authenticate(&key), Some(agent("reporter")));
        assert_eq!(directory.authenticate("wrong-key"), None);
    }

    #[test]
    fn authentication_touches_last_used() {
        let directory = AgentDirectory::new();
        let key = register(&directory, "reporter", &[]);
        assert!(directory.list()[0].last_used.is_none());
        directory.authenticate(&key);
        assert!(directory.list()[0].last_used.is_some());
    }

    #[test]
    fn token_roundtrip_and_expiry() {
        let directory = AgentDirectory::new();
        register(&directory, "reporter", &[]);

        let token = directory
            .issue_token(&agent("reporter"), Duration::from_secs(3600))
            .unwrap();
        assert_eq!(directory.verify_token(&token), Some(agent("reporter")));

        // Malformed and foreign tokens fail identically.
        assert_eq!(directory.verify_token("not-a-token"), None);
        let other = AgentDirectory::new();
        register(&other, "reporter", &[]);
        let foreign = other
            .issue_token(&agent("reporter"), Duration::from_secs(3600))
            .unwrap();
        assert_eq!(directory.verify_token(&foreign), None);
    }

    #[test]
    fn header_authentication_supports_both_schemes() {
        let directory = AgentDirectory::new();
        let key = register(&directory, "reporter", &[]);
        let token = directory
            .issue_token(&agent("reporter"), Duration::from_secs(60))
            .unwrap();

        assert_eq!(
            directory.authenticate_headers(Some(&key), None),
            Some(agent("reporter"))
        );
        assert_eq!(
            directory.authenticate_headers(None, Some(&format!("Bearer {token}"))),
            Some(agent("reporter"))
        );
        assert_eq!(directory.authenticate_headers(None, Some("Basic abc")), None);
        assert_eq!(directory.authenticate_headers(None, None), None);
    }

    #[test]
    fn empty_allow_list_means_all() {
        let directory = AgentDirectory::new();
        register(&directory, "open", &[]);
        register(&directory, "restricted", &["user-api"]);

        let user_api = ApiId::new("user-api").unwrap();
        let other_api = ApiId::new("other-api").unwrap();

        assert!(directory.is_api_allowed(&agent("open"), &user_api));
        assert!(directory.is_api_allowed(&agent("open"), &other_api));
        assert!(directory.is_api_allowed(&agent("restricted"), &user_api));
        assert!(!directory.is_api_allowed(&agent("restricted"), &other_api));

        // Unknown agents are always denied.
        assert!(!directory.is_api_allowed(&agent("ghost"), &user_api));
    }

    #[test]
    fn directory_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_auth.json");

        let key = {
            let directory = AgentDirectory::open(&path).unwrap();
            register(&directory, "reporter", &["user-api"])
        };

        let reloaded = AgentDirectory::open(&path).unwrap();
        assert_eq!(reloaded.authenticate(&key), Some(agent("reporter")));
        assert!(reloaded.is_api_allowed(&agent("reporter"), &ApiId::new("user-api").unwrap()));
        assert!(!reloaded.is_api_allowed(&agent("reporter"), &ApiId::new("other").unwrap()));
    }
}
