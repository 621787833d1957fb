/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Decrypts and exposes an application's secret set.

use crate::store::{SecretStore, StoreError};
use crate::utils::encryption::{EncryptionError, EncryptionKey};
use eitri_models::models::{NewSecret, Secret};
use eitri_utils::telemetry::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to load secrets: {0}")]
    Store(#[from] StoreError),

    #[error("failed to decrypt secret '{name}': {source}")]
    Decrypt {
        name: String,
        #[source]
        source: EncryptionError,
    },

    #[error("failed to encrypt secret: {0}")]
    Encrypt(#[source] EncryptionError),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
    key: Arc<EncryptionKey>,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>, key: Arc<EncryptionKey>) -> Self {
        Self { store, key }
    }

    /// Returns every secret of the application as `name -> plaintext`.
    ///
    /// One undecryptable secret fails the whole resolution; callers never see a partial set.
    pub fn resolve(&self, application_id: Uuid) -> Result<HashMap<String, String>, SecretError> {
        let secrets = self.store.list_for_application(application_id)?;
        let mut resolved = HashMap::with_capacity(secrets.len());

        for secret in secrets {
            let value = self
                .key
                .decrypt_string(&secret.value)
                .map_err(|source| SecretError::Decrypt {
                    name: secret.name.clone(),
                    source,
                })?;
            resolved.insert(secret.name, value);
        }

        debug!(
            application_id = %application_id,
            "Resolved {} secrets",
            resolved.len()
        );
        Ok(resolved)
    }

    /// Encrypts `value` and stores it under `name`, replacing any previous value.
    pub fn set(
        &self,
        application_id: Uuid,
        name: &str,
        value: &str,
    ) -> Result<Secret, SecretError> {
        let sealed = self.key.encrypt_string(value).map_err(SecretError::Encrypt)?;
        let new_secret =
            NewSecret::new(application_id, name.to_string(), sealed).map_err(SecretError::Invalid)?;

        let secret = self.store.upsert(&new_secret)?;
        info!(application_id = %application_id, "Stored secret '{}'", secret.name);
        Ok(secret)
    }
}
