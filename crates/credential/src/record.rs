//! Credential records and the wire-level reference form.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use a2e_core::CredentialId;

use crate::cipher::SealedBlob;

/// Kind tag of a credential, driving injection formatting.
///
/// The set is open on the wire: unknown tags round-trip through
/// [`CredentialKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKind {
    BearerToken,
    ApiKey,
    Password,
    Username,
    Other(String),
}

impl CredentialKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BearerToken => "bearer-token",
            Self::ApiKey => "api-key",
            Self::Password => "password",
            Self::Username => "username",
            Self::Other(tag) => tag,
        }
    }

    /// Hint shown next to the credential in the capability view.
    pub fn usage_hint(&self) -> &'static str {
        match self {
            Self::BearerToken => {
                "Use in Authorization header: {\"credentialRef\": {\"id\": \"...\"}}"
            }
            Self::ApiKey => "Use in X-API-Key header: {\"credentialRef\": {\"id\": \"...\"}}",
            Self::Password => "Use for database connections or basic auth",
            Self::Username => "Use with a password for basic auth",
            Self::Other(_) => "Reference using {\"credentialRef\": {\"id\": \"...\"}}",
        }
    }
}

impl From<&str> for CredentialKind {
    fn from(s: &str) -> Self {
        match s {
            "bearer-token" => Self::BearerToken,
            "api-key" => Self::ApiKey,
            "password" => Self::Password,
            "username" => Self::Username,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CredentialKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CredentialKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A stored credential: everything persisted about one secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: CredentialId,
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    /// Authenticated ciphertext of the plaintext secret.
    pub encrypted_value: SealedBlob,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub description: String,
}

/// Metadata-only projection of a credential — what list/search return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetadata {
    pub id: CredentialId,
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub description: String,
}

impl From<&CredentialRecord> for CredentialMetadata {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind.clone(),
            metadata: record.metadata.clone(),
            description: record.description.clone(),
        }
    }
}

/// The structural reference an agent places in a workflow:
/// `{"credentialRef": {"id": "api-token"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialReference {
    #[serde(rename = "credentialRef")]
    pub credential_ref: CredentialRefBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRefBody {
    pub id: CredentialId,
}

impl CredentialReference {
    pub fn new(id: CredentialId) -> Self {
        Self {
            credential_ref: CredentialRefBody { id },
        }
    }

    pub fn id(&self) -> &CredentialId {
        &self.credential_ref.id
    }

    /// Try to read a JSON value as a credential reference. Only the exact
    /// single-entry `{"credentialRef": {...}}` shape qualifies.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 1 || !map.contains_key("credentialRef") {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}
