//! The credential vault.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use a2e_core::CredentialId;
use a2e_error::{A2eError, Result};
use a2e_registry::search::{keyword_score, rank, SemanticIndex};

use crate::cipher::{MasterKey, VaultCipher};
use crate::record::{
    CredentialKind, CredentialMetadata, CredentialRecord, CredentialReference,
};
use crate::secure::SecureString;

#[derive(Serialize, Deserialize)]
struct VaultFile {
    credentials: Vec<CredentialRecord>,
}

/// Encrypted credential store.
///
/// Reads dominate; writes (registration, rotation, removal) happen
/// out-of-band of executions, so the record map sits behind a single
/// reader-writer lock. The cipher is immutable after construction.
pub struct CredentialVault {
    cipher: VaultCipher,
    records: RwLock<BTreeMap<CredentialId, CredentialRecord>>,
    path: Option<PathBuf>,
    semantic: Option<Arc<dyn SemanticIndex>>,
}

impl CredentialVault {
    /// In-memory vault (tests, ephemeral deployments).
    pub fn new(master: &MasterKey) -> Self {
        Self {
            cipher: VaultCipher::new(master),
            records: RwLock::new(BTreeMap::new()),
            path: None,
            semantic: None,
        }
    }

    /// Vault persisted at `path`; loads existing records when present.
    pub fn open(master: &MasterKey, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut vault = Self::new(master);
        vault.path = Some(path.clone());

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: VaultFile = serde_json::from_str(&raw)?;
            let mut records = vault.records.write();
            for record in file.credentials {
                records.insert(record.id.clone(), record);
            }
            info!(credentials = records.len(), "loaded credential vault");
        }

        Ok(vault)
    }

    /// Attach the optional semantic-search collaborator. Only metadata and
    /// descriptions are ever indexed.
    pub fn with_semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Seal and store a credential, persisting the vault file when
    /// configured.
    pub async fn store(
        &self,
        id: CredentialId,
        kind: CredentialKind,
        plaintext: &str,
        metadata: BTreeMap<String, Value>,
        description: impl Into<String>,
    ) -> Result<()> {
        let record = CredentialRecord {
            id: id.clone(),
            kind: kind.clone(),
            encrypted_value: self.cipher.seal(plaintext)?,
            metadata,
            description: description.into(),
        };

        self.records.write().insert(id.clone(), record.clone());
        self.persist()?;
        self.index_record(&record).await;

        info!(credential = %id, kind = %kind, "stored credential");
        Ok(())
    }

    /// Remove a credential from the vault.
    pub fn remove(&self, id: &CredentialId) -> Result<()> {
        self.records
            .write()
            .remove(id)
            .ok_or_else(|| A2eError::not_found("Credential", id))?;
        self.persist()?;
        info!(credential = %id, "removed credential");
        Ok(())
    }

    /// Metadata-only view of one credential.
    pub fn metadata(&self, id: &CredentialId) -> Option<CredentialMetadata> {
        self.records.read().get(id).map(CredentialMetadata::from)
    }

    /// Metadata-only view of every credential.
    pub fn list(&self) -> Vec<CredentialMetadata> {
        self.records
            .read()
            .values()
            .map(CredentialMetadata::from)
            .collect()
    }

    pub fn contains(&self, id: &CredentialId) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Resolve a structural reference to the decrypted secret.
    ///
    /// This is the only path that returns plaintext. Callers must not let
    /// the returned value reach any audit, response, log, or cache entry.
    pub fn resolve(&self, reference: &CredentialReference) -> Result<SecureString> {
        let records = self.records.read();
        let record = records
            .get(reference.id())
            .ok_or_else(|| A2eError::not_found("Credential", reference.id()))?;
        self.cipher.open(&record.encrypted_value)
    }

    /// Walk a configuration tree, replacing every `credentialRef` leaf with
    /// the formatted plaintext. Returns the new tree plus the ids injected
    /// (for the audit journal). The input is never mutated.
    pub fn inject(&self, config: &Value) -> Result<(Value, Vec<CredentialId>)> {
        let mut used = Vec::new();
        let injected = self.inject_value(config, &mut used)?;
        Ok((injected, used))
    }

    fn inject_value(&self, value: &Value, used: &mut Vec<CredentialId>) -> Result<Value> {
        if let Some(reference) = CredentialReference::from_value(value) {
            let secret = self.resolve(&reference)?;
            let kind = self
                .metadata(reference.id())
                .map(|meta| meta.kind)
                .unwrap_or(CredentialKind::Other(String::new()));
            used.push(reference.id().clone());
            return Ok(Value::String(format_secret(&kind, &secret)));
        }

        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, inner) in map {
                    out.insert(key.clone(), self.inject_value(inner, used)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.inject_value(item, used)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Search credentials by metadata, semantically when possible.
    pub async fn search(
        &self,
        query: &str,
        kind: Option<&CredentialKind>,
        top_k: usize,
    ) -> Result<Vec<(f64, CredentialMetadata)>> {
        if let Some(index) = &self.semantic {
            match index.search(query, Some("credential"), top_k * 2).await {
                Ok(hits) => {
                    let mut out = Vec::new();
                    for hit in hits {
                        let Ok(meta) = serde_json::from_value::<CredentialMetadata>(hit.payload)
                        else {
                            continue;
                        };
                        if kind.is_some_and(|k| &meta.kind != k) {
                            continue;
                        }
                        // Only surface credentials that still exist.
                        if !self.contains(&meta.id) {
                            continue;
                        }
                        out.push((hit.score, meta));
                        if out.len() == top_k {
                            break;
                        }
                    }
                    return Ok(out);
                }
                Err(err) => {
                    warn!(error = %err, "semantic credential search failed, falling back to keywords");
                }
            }
        }
        Ok(self.keyword_search(query, kind, top_k))
    }

    fn keyword_search(
        &self,
        query: &str,
        kind: Option<&CredentialKind>,
        top_k: usize,
    ) -> Vec<(f64, CredentialMetadata)> {
        let records = self.records.read();
        let candidates = records
            .values()
            .filter(|record| kind.is_none_or(|k| &record.kind == k))
            .map(|record| {
                let metadata_text = record
                    .metadata
                    .iter()
                    .map(|(k, v)| format!("{k} {v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                let score = keyword_score(
                    query,
                    &[
                        (record.description.as_str(), 3),
                        (metadata_text.as_str(), 2),
                        (record.id.as_str(), 1),
                    ],
                );
                (score, record.id.to_string(), CredentialMetadata::from(record))
            })
            .collect();
        rank(candidates, top_k)
            .into_iter()
            .map(|(score, meta)| (f64::from(score), meta))
            .collect()
    }

    /// Re-index every credential's metadata into the semantic index.
    pub async fn index_all(&self) -> Result<()> {
        let records: Vec<CredentialRecord> = self.records.read().values().cloned().collect();
        for record in &records {
            self.index_record(record).await;
        }
        Ok(())
    }

    async fn index_record(&self, record: &CredentialRecord) {
        let Some(index) = &self.semantic else {
            return;
        };
        // The sealed blob and plaintext never reach the index.
        let meta = CredentialMetadata::from(record);
        let text = format!("{} credential: {}", meta.kind, meta.description);
        let payload = match serde_json::to_value(&meta) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, credential = %meta.id, "failed to serialize credential metadata");
                return;
            }
        };
        if let Err(err) = index
            .index("credential", meta.id.as_str(), &text, payload)
            .await
        {
            warn!(error = %err, credential = %meta.id, "failed to index credential metadata");
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = VaultFile {
            credentials: self.records.read().values().cloned().collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        debug!(path = %path.display(), "persisted credential vault");
        Ok(())
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("credentials", &self.len())
            .field("persistent", &self.path.is_some())
            .finish()
    }
}

/// Format a resolved secret for injection, by credential kind.
fn format_secret(kind: &CredentialKind, secret: &SecureString) -> String {
    match kind {
        CredentialKind::BearerToken => format!("Bearer {}", secret.expose()),
        _ => secret.expose().to_string(),
    }
}
