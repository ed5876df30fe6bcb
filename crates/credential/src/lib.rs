//! # A2E Credential Vault
//!
//! Encrypted storage and resolution of credentials. Agents reference
//! credentials by id through the structural form
//! `{"credentialRef": {"id": "..."}}`; only the resolution path
//! ([`CredentialVault::resolve`] and [`CredentialVault::inject`]) ever
//! produces plaintext, and every listing or search surface returns
//! metadata-only projections.
//!
//! The sealing scheme derives a data-encryption key from the master key
//! with PBKDF2-HMAC-SHA256 (fixed per-vault salt, 100 000 iterations) and
//! seals plaintexts with AES-256-GCM. The master key is never persisted.

pub mod cipher;
pub mod record;
pub mod secure;
pub mod vault;

pub use cipher::{MasterKey, SealedBlob, VaultCipher};
pub use record::{CredentialKind, CredentialMetadata, CredentialRecord, CredentialReference};
pub use secure::SecureString;
pub use vault::CredentialVault;
