//! Sealed token store
//!
//! OAuth credential tuples are persisted on upload-request rows only for the
//! lifetime of the job, as an AES-256-GCM ciphertext of the JSON serialization
//! of `[key, secret]`. The 32-byte key comes base64-encoded from the
//! `TOKEN_ENCRYPTION_KEY` environment variable; the process refuses to start
//! without it.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An OAuth access token tuple. Serializes as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct AccessToken {
    pub key: String,
    pub secret: String,
}

impl AccessToken {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl From<(String, String)> for AccessToken {
    fn from((key, secret): (String, String)) -> Self {
        Self { key, secret }
    }
}

impl From<AccessToken> for (String, String) {
    fn from(token: AccessToken) -> Self {
        (token.key, token.secret)
    }
}

/// Seals and unseals credential tuples with AES-256-GCM.
#[derive(Clone)]
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl TokenVault {
    /// Build from a raw 32-byte key (used by tests; avoids env mutation).
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, AppError> {
        if key_bytes.len() != 32 {
            return Err(AppError::Config(
                "Token encryption key must be 32 bytes (256 bits)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build from the base64-encoded key string.
    pub fn from_base64(key_str: &str) -> Result<Self, AppError> {
        let key_bytes = general_purpose::STANDARD
            .decode(key_str)
            .map_err(|e| AppError::Config(format!("Failed to decode encryption key: {}", e)))?;
        Self::from_key_bytes(&key_bytes)
    }

    /// Seal an access token tuple into a base64 ciphertext.
    pub fn seal(&self, token: &AccessToken) -> Result<String, AppError> {
        let plaintext = serde_json::to_string(token)
            .map_err(|e| AppError::Crypto(format!("Failed to serialize token: {}", e)))?;
        self.seal_str(&plaintext)
    }

    /// Unseal a ciphertext back into the token tuple. Tampered or truncated
    /// input yields a crypto error.
    pub fn unseal(&self, sealed: &str) -> Result<AccessToken, AppError> {
        let plaintext = self.unseal_str(sealed)?;
        serde_json::from_str(&plaintext)
            .map_err(|e| AppError::Crypto(format!("Sealed token is not a token tuple: {}", e)))
    }

    /// Seal an arbitrary string payload (used for the session store).
    pub fn seal_str(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))?;

        // nonce || ciphertext, base64-encoded
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(&combined))
    }

    pub fn unseal_str(&self, sealed: &str) -> Result<String, AppError> {
        let combined = general_purpose::STANDARD
            .decode(sealed)
            .map_err(|e| AppError::Crypto(format!("Failed to decode sealed data: {}", e)))?;

        if combined.len() < 12 {
            return Err(AppError::Crypto("Sealed data too short".to_string()));
        }

        let nonce = Nonce::from_slice(&combined[..12]);
        let ciphertext = &combined[12..];

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Crypto(format!("Invalid UTF-8 in sealed data: {}", e)))
    }
}
