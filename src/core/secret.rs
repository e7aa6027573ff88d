//! One-time secret derivation
//!
//! Each external build ticket carries a fresh secret derived from the
//! server's long-lived key: HMAC-SHA256 of a random nonce.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use std::path::Path;

use crate::config::defaults::{SECRET_NONCE_LEN, SERVER_KEY_LEN};
use crate::error::{BuildError, CryptoError};
use crate::infra::filesystem;

type HmacSha256 = Hmac<Sha256>;

/// Source of one-time secrets
pub trait SecretDeriver: Send + Sync {
    /// Derive a fresh secret
    fn derive(&self) -> Result<String, CryptoError>;
}

/// Long-lived server key material
#[derive(Clone, PartialEq, Eq)]
pub struct ServerKey([u8; SERVER_KEY_LEN]);

impl ServerKey {
    /// Generate new random key material
    pub fn generate() -> Self {
        let mut key = [0u8; SERVER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Decode hex-encoded key material
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| CryptoError::KeyMaterial {
            error: e.to_string(),
        })?;
        let key: [u8; SERVER_KEY_LEN] =
            bytes.try_into().map_err(|bytes: Vec<u8>| CryptoError::KeyMaterial {
                error: format!("expected {SERVER_KEY_LEN} bytes, got {}", bytes.len()),
            })?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Load the key at `path`, creating it on first use
    pub fn load_or_create(path: &Path) -> Result<Self, BuildError> {
        if path.exists() {
            let encoded = filesystem::read_file(path)?;
            return Ok(Self::from_hex(&encoded)?);
        }

        tracing::info!("Creating server key at {}", path.display());
        let key = Self::generate();
        filesystem::write_atomic(path, key.to_hex().as_bytes())?;
        filesystem::restrict_to_owner(path)?;
        Ok(key)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerKey(..)")
    }
}

/// Derives secrets as HMAC-SHA256(server key, random nonce)
#[derive(Debug, Clone)]
pub struct HmacSecretDeriver {
    key: ServerKey,
}

impl HmacSecretDeriver {
    pub fn new(key: ServerKey) -> Self {
        Self { key }
    }
}

impl SecretDeriver for HmacSecretDeriver {
    fn derive(&self) -> Result<String, CryptoError> {
        let mut nonce = [0u8; SECRET_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut mac =
            HmacSha256::new_from_slice(self.key.as_bytes()).map_err(|e| CryptoError::Derive {
                error: e.to_string(),
            })?;
        mac.update(&nonce);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hex_roundtrip() {
        let key = ServerKey::generate();
        assert_eq!(ServerKey::from_hex(&key.to_hex()).unwrap(), key);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(ServerKey::from_hex("abcd").is_err());
        assert!(ServerKey::from_hex("not hex").is_err());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let key = ServerKey::generate();
        assert_eq!(format!("{key:?}"), "ServerKey(..)");
    }

    #[test]
    fn test_load_or_create_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.key");
        let first = ServerKey::load_or_create(&path).unwrap();
        let second = ServerKey::load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_secrets_are_fresh() {
        let deriver = HmacSecretDeriver::new(ServerKey::generate());
        let a = deriver.derive().unwrap();
        let b = deriver.derive().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
