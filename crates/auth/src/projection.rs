//! Capability projection: the only view of the catalog an agent ever sees.

use serde::{Deserialize, Serialize};

use a2e_credential::CredentialMetadata;
use a2e_registry::ApiDefinition;

/// A credential as advertised to agents: metadata plus a usage hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCapability {
    #[serde(flatten)]
    pub credential: CredentialMetadata,
    pub usage: String,
}

impl From<CredentialMetadata> for CredentialCapability {
    fn from(credential: CredentialMetadata) -> Self {
        let usage = credential.kind.usage_hint().to_string();
        Self { credential, usage }
    }
}

/// The filtered capability set for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityView {
    pub available_apis: Vec<ApiDefinition>,
    pub available_credentials: Vec<CredentialCapability>,
    pub supported_operations: Vec<String>,
}

impl CapabilityView {
    /// The empty view, returned for unknown agents.
    pub fn empty() -> Self {
        Self {
            available_apis: Vec::new(),
            available_credentials: Vec::new(),
            supported_operations: Vec::new(),
        }
    }
}
