/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::dal::DAL;
use crate::store::StoreError;
use diesel::prelude::*;
use diesel::upsert::excluded;
use eitri_models::models::{NewSecret, Secret};
use eitri_models::schema::secrets;
use uuid::Uuid;

/// Data Access Layer for encrypted application secrets.
pub struct SecretsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> SecretsDAL<'a> {
    /// Lists every secret of an application, ordered by name.
    pub fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Secret>, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(secrets::table
            .filter(secrets::application_id.eq(application_id))
            .order(secrets::name.asc())
            .load::<Secret>(conn)?)
    }

    /// Inserts a secret, replacing the value if the application already has one with that name.
    pub fn upsert(&self, new_secret: &NewSecret) -> Result<Secret, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::insert_into(secrets::table)
            .values(new_secret)
            .on_conflict((secrets::application_id, secrets::name))
            .do_update()
            .set(secrets::value.eq(excluded(secrets::value)))
            .get_result(conn)?)
    }
}
