/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Encryption of application secrets at rest.
//!
//! Values are sealed with AES-256-GCM. The stored format is
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use eitri_utils::telemetry::prelude::*;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("ciphertext too short")]
    Truncated,

    #[error("ciphertext could not be authenticated with this key")]
    Authentication,

    #[error("decrypted value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM key with its fingerprint.
pub struct EncryptionKey {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl EncryptionKey {
    /// Creates a new encryption key from raw bytes.
    pub fn new(key: [u8; 32]) -> Self {
        let hash = Sha256::digest(key);
        Self {
            cipher: Aes256Gcm::new(&key.into()),
            fingerprint: hex::encode(&hash[..8]),
        }
    }

    /// Creates a new random encryption key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key)
    }

    /// Creates a key from a hex-encoded string.
    pub fn from_hex(hex: &str) -> Result<Self, EncryptionError> {
        let bytes = hex::decode(hex.trim())
            .map_err(|e| EncryptionError::InvalidKey(format!("invalid hex encoding: {}", e)))?;

        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            EncryptionError::InvalidKey(format!("key must be 32 bytes, got {} bytes", bytes.len()))
        })?;
        Ok(Self::new(key))
    }

    /// Short key identifier safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| EncryptionError::Authentication)?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend(ciphertext);
        Ok(output)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if sealed.len() < NONCE_LEN {
            return Err(EncryptionError::Truncated);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| EncryptionError::Authentication)
    }

    pub fn encrypt_string(&self, value: &str) -> Result<Vec<u8>, EncryptionError> {
        self.encrypt(value.as_bytes())
    }

    pub fn decrypt_string(&self, sealed: &[u8]) -> Result<String, EncryptionError> {
        Ok(String::from_utf8(self.decrypt(sealed)?)?)
    }
}

/// Builds the process key from configuration.
///
/// # Arguments
/// * `key_hex` - Optional hex-encoded 32-byte key. If None, a random key is generated.
pub fn key_from_config(key_hex: Option<&str>) -> Result<EncryptionKey, EncryptionError> {
    let key = match key_hex {
        Some(hex) if !hex.trim().is_empty() => {
            info!("Initializing encryption key from configuration");
            EncryptionKey::from_hex(hex)?
        }
        _ => {
            warn!(
                "No encryption key configured, generating random key. Secrets stored by this \
                 process will be unreadable after a restart. Configure EITRI__SECRETS__ENCRYPTION_KEY."
            );
            EncryptionKey::generate()
        }
    };

    info!("Encryption key fingerprint: {}", key.fingerprint());
    Ok(key)
}
