/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Secrets Module
//!
//! Per-application secrets referenced from job templates as `{{secrets.<name>}}`.
//! `value` always holds ciphertext; decryption happens in the server's secret resolver.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::secrets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Secret {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub application_id: Uuid,
    pub name: String,
    /// Encrypted value (nonce || ciphertext)
    #[serde(skip_serializing)]
    pub value: Vec<u8>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::secrets)]
pub struct NewSecret {
    pub application_id: Uuid,
    pub name: String,
    pub value: Vec<u8>,
}

/// Returns true if `name` can be referenced from a `{{secrets.<name>}}` placeholder.
pub fn is_valid_secret_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

impl NewSecret {
    /// Creates a new `NewSecret` from an already encrypted value.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `NewSecret`, or an error message if validation fails.
    pub fn new(application_id: Uuid, name: String, value: Vec<u8>) -> Result<Self, String> {
        if !is_valid_secret_name(&name) {
            return Err(format!(
                "Invalid secret name '{}': use letters, digits, '_', '-' or '.'",
                name
            ));
        }
        if value.is_empty() {
            return Err("Secret value cannot be empty".to_string());
        }

        Ok(NewSecret {
            application_id,
            name,
            value,
        })
    }
}
