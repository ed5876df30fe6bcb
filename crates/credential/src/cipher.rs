//! Key derivation and authenticated encryption for the vault.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use a2e_error::{A2eError, Result};

use crate::secure::SecureString;

/// Fixed per-vault salt for the key derivation.
const VAULT_SALT: &[u8] = b"a2e.vault.salt.v1";

/// PBKDF2 iteration count. The vault contract requires at least 100 000.
const KDF_ITERATIONS: u32 = 100_000;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// The vault master key. Held in memory only; zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Generate a fresh random master key (development convenience; in
    /// production the key material comes from the environment).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Decode a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = B64
            .decode(encoded.trim())
            .map_err(|e| A2eError::validation(format!("invalid master key encoding: {e}")))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| A2eError::validation("master key must be exactly 32 bytes"))?;
        Ok(Self(bytes))
    }

    /// Base64 form, for handing a generated key to the operator once.
    pub fn to_base64(&self) -> String {
        B64.encode(self.0)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey[REDACTED]")
    }
}

/// An authenticated-ciphertext blob: base64 of `nonce ‖ ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedBlob(String);

impl SealedBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Seals and opens credential plaintexts.
///
/// The data-encryption key is derived once at construction; the master key
/// itself is not retained.
pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    /// Derive the data-encryption key from the master key.
    pub fn new(master: &MasterKey) -> Self {
        let mut okm = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(master.as_bytes(), VAULT_SALT, KDF_ITERATIONS, &mut okm);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm));
        okm.zeroize();
        Self { cipher }
    }

    /// Authenticated-encrypt a plaintext into a sealed blob.
    pub fn seal(&self, plaintext: &str) -> Result<SealedBlob> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| A2eError::execution("failed to seal credential"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(SealedBlob(B64.encode(blob)))
    }

    /// Decrypt and authenticate a sealed blob.
    pub fn open(&self, sealed: &SealedBlob) -> Result<SecureString> {
        let blob = B64
            .decode(sealed.as_str())
            .map_err(|e| A2eError::execution(format!("corrupt sealed blob: {e}")))?;

        if blob.len() < NONCE_LEN {
            return Err(A2eError::execution("sealed blob too short"));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

        let mut plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| A2eError::execution("failed to open sealed blob"))?;

        let text = String::from_utf8(plaintext.clone())
            .map_err(|_| A2eError::execution("sealed blob is not valid UTF-8"))?;
        plaintext.zeroize();
        Ok(SecureString::new(text))
    }
}

impl std::fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VaultCipher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seal_open_roundtrip() {
        let cipher = VaultCipher::new(&MasterKey::generate());
        let sealed = cipher.seal("secret-XYZ").unwrap();
        assert_eq!(cipher.open(&sealed).unwrap().expose(), "secret-XYZ");
    }

    #[test]
    fn sealed_blob_does_not_contain_plaintext() {
        let cipher = VaultCipher::new(&MasterKey::generate());
        let sealed = cipher.seal("secret-XYZ").unwrap();
        assert!(!sealed.as_str().contains("secret-XYZ"));
    }

    #[test]
    fn sealing_is_nonce_randomized() {
        let cipher = VaultCipher::new(&MasterKey::generate());
        let a = cipher.seal("same plaintext").unwrap();
        let b = cipher.seal("same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_master_key_fails_to_open() {
        let sealed = VaultCipher::new(&MasterKey::generate())
            .seal("secret")
            .unwrap();
        let other = VaultCipher::new(&MasterKey::generate());
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn tampered_blob_fails_authentication() {
        let cipher = VaultCipher::new(&MasterKey::generate());
        let sealed = cipher.seal("secret").unwrap();
        let mut raw = B64.decode(sealed.as_str()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = SealedBlob(B64.encode(raw));
        assert!(cipher.open(&tampered).is_err());
    }

    #[test]
    fn master_key_base64_roundtrip() {
        let key = MasterKey::generate();
        let back = MasterKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.to_base64(), back.to_base64());
    }

    #[test]
    fn master_key_rejects_wrong_length() {
        assert!(MasterKey::from_base64(&B64.encode([0u8; 16])).is_err());
        assert!(MasterKey::from_base64("not base64 at all!").is_err());
    }
}
