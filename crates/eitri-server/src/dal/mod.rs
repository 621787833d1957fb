/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer over PostgreSQL.
//!
//! `DAL` hands out one accessor per table and implements the [`JobStore`] and
//! [`SecretStore`] traits by delegating to them.

mod jobs;
mod secrets;

pub use jobs::JobsDAL;
pub use secrets::SecretsDAL;

use crate::db::ConnectionPool;
use crate::store::{JobStore, SecretStore, StoreError};
use eitri_models::models::{Job, NewJob, NewSecret, Secret};
use uuid::Uuid;

#[derive(Clone)]
pub struct DAL {
    pub pool: ConnectionPool,
}

impl DAL {
    pub fn new(pool: ConnectionPool) -> Self {
        DAL { pool }
    }

    pub fn jobs(&self) -> JobsDAL {
        JobsDAL { dal: self }
    }

    pub fn secrets(&self) -> SecretsDAL {
        SecretsDAL { dal: self }
    }
}

impl JobStore for DAL {
    fn create(&self, job: &NewJob) -> Result<Job, StoreError> {
        self.jobs().create(job)
    }

    fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.jobs().get(id)
    }

    fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Job>, StoreError> {
        self.jobs().list_for_application(application_id)
    }

    fn update_phase(&self, id: Uuid, phase: &str) -> Result<usize, StoreError> {
        self.jobs().update_phase(id, phase)
    }

    fn delete(&self, id: Uuid) -> Result<usize, StoreError> {
        self.jobs().hard_delete(id)
    }
}

impl SecretStore for DAL {
    fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Secret>, StoreError> {
        self.secrets().list_for_application(application_id)
    }

    fn upsert(&self, secret: &NewSecret) -> Result<Secret, StoreError> {
        self.secrets().upsert(secret)
    }
}
