//! In-memory secret handling.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Plaintext credential material, zeroed on drop and never printed.
///
/// Deliberately implements neither `Serialize` nor `Deserialize`: a
/// resolved plaintext must not be able to ride along into any persisted or
/// logged structure by accident. There is also no `PartialEq` — comparing
/// secrets goes through [`SecureString::matches`], which is constant-time.
pub struct SecureString {
    inner: SecretString,
}

impl SecureString {
    /// Take ownership of a plaintext secret.
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(plaintext.into()),
        }
    }

    /// Borrow the plaintext. The borrow keeps the secret alive; callers
    /// must not copy it into anything that outlives the resolution path.
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Constant-time comparison against a candidate string. Length is
    /// checked first; equal-length inputs are compared without
    /// short-circuiting.
    pub fn matches(&self, candidate: &str) -> bool {
        let secret = self.inner.expose_secret().as_bytes();
        let candidate = candidate.as_bytes();
        if secret.len() != candidate.len() {
            return false;
        }
        secret.ct_eq(candidate).into()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureString(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_shows_the_secret() {
        let secret = SecureString::new("hunter2");
        assert_eq!(format!("{secret:?}"), "SecureString(***)");
    }

    #[test]
    fn matches_compares_without_leaking() {
        let secret = SecureString::new("same-value");
        assert!(secret.matches("same-value"));
        assert!(!secret.matches("other-value"));
        assert!(!secret.matches("same-valu"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn expose_borrows_the_plaintext() {
        let secret = SecureString::new("value");
        assert_eq!(secret.expose(), "value");
        assert_eq!(secret.expose().len(), 5);
    }
}
