/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Persistence seams consumed by the submitter, the API and the pod lifecycle controller.
//!
//! [`crate::dal::DAL`] implements both traits over PostgreSQL; [`memory::MemoryStore`]
//! implements them in process for tests and local runs without a database.

use eitri_cluster::controller::JobPhaseStore;
use eitri_models::models::{Job, NewJob, NewSecret, PodPhase, Secret};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection unavailable: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("invalid database configuration: {0}")]
    Config(String),
}

/// Job records.
pub trait JobStore: Send + Sync {
    fn create(&self, job: &NewJob) -> Result<Job, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Jobs of one application, newest first.
    fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Job>, StoreError>;

    /// Returns the number of rows updated (0 for an unknown job).
    fn update_phase(&self, id: Uuid, phase: &str) -> Result<usize, StoreError>;

    /// Returns the number of rows removed (0 for an unknown job).
    fn delete(&self, id: Uuid) -> Result<usize, StoreError>;
}

/// Encrypted per-application secrets.
pub trait SecretStore: Send + Sync {
    fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Secret>, StoreError>;

    /// Inserts the secret or replaces the value of the existing (application, name) pair.
    fn upsert(&self, secret: &NewSecret) -> Result<Secret, StoreError>;
}

/// Feeds phases observed by the pod lifecycle controller into a [`JobStore`].
pub struct StorePhases {
    jobs: Arc<dyn JobStore>,
}

impl StorePhases {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }
}

impl JobPhaseStore for StorePhases {
    fn update_phase(
        &self,
        job_id: Uuid,
        phase: &PodPhase,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let updated = self.jobs.update_phase(job_id, phase.as_str())?;
        if updated == 0 {
            return Err(format!("job {} does not exist", job_id).into());
        }
        Ok(())
    }
}

pub mod memory {
    //! Process-local store backed by `RwLock`ed maps.

    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::{PoisonError, RwLock};

    #[derive(Default)]
    pub struct MemoryStore {
        jobs: RwLock<HashMap<Uuid, Job>>,
        secrets: RwLock<HashMap<(Uuid, String), Secret>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl JobStore for MemoryStore {
        fn create(&self, job: &NewJob) -> Result<Job, StoreError> {
            let now = Utc::now();
            let record = Job {
                id: job.id,
                created_at: now,
                updated_at: now,
                application_id: job.application_id,
                name: job.name.clone(),
                namespace: job.namespace.clone(),
                phase: job.phase.clone(),
                spec: job.spec.clone(),
                meta: job.meta.clone(),
            };
            self.jobs
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(record.id, record.clone());
            Ok(record)
        }

        fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            Ok(jobs.get(&id).cloned())
        }

        fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Job>, StoreError> {
            let mut jobs: Vec<Job> = self
                .jobs
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .filter(|job| job.application_id == application_id)
                .cloned()
                .collect();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(jobs)
        }

        fn update_phase(&self, id: Uuid, phase: &str) -> Result<usize, StoreError> {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            match jobs.get_mut(&id) {
                Some(job) => {
                    job.phase = phase.to_string();
                    job.updated_at = Utc::now();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn delete(&self, id: Uuid) -> Result<usize, StoreError> {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            Ok(usize::from(jobs.remove(&id).is_some()))
        }
    }

    impl SecretStore for MemoryStore {
        fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Secret>, StoreError> {
            let mut secrets: Vec<Secret> = self
                .secrets
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .filter(|secret| secret.application_id == application_id)
                .cloned()
                .collect();
            secrets.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(secrets)
        }

        fn upsert(&self, secret: &NewSecret) -> Result<Secret, StoreError> {
            let now = Utc::now();
            let mut secrets = self.secrets.write().unwrap_or_else(PoisonError::into_inner);
            let record = secrets
                .entry((secret.application_id, secret.name.clone()))
                .and_modify(|existing| {
                    existing.value = secret.value.clone();
                    existing.updated_at = now;
                })
                .or_insert_with(|| Secret {
                    id: Uuid::new_v4(),
                    created_at: now,
                    updated_at: now,
                    application_id: secret.application_id,
                    name: secret.name.clone(),
                    value: secret.value.clone(),
                });
            Ok(record.clone())
        }
    }
}
