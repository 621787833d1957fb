/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::dal::DAL;
use crate::store::StoreError;
use diesel::prelude::*;
use eitri_models::models::{Job, NewJob};
use eitri_models::schema::jobs;
use uuid::Uuid;

/// Data Access Layer for Job operations.
pub struct JobsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> JobsDAL<'a> {
    /// Creates a new job in the database.
    ///
    /// # Arguments
    ///
    /// * `new_job` - A reference to the NewJob struct containing the job details.
    ///
    /// # Returns
    ///
    /// A Result containing the created Job on success, or a StoreError on failure.
    pub fn create(&self, new_job: &NewJob) -> Result<Job, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::insert_into(jobs::table)
            .values(new_job)
            .get_result(conn)?)
    }

    /// Retrieves a job by its UUID.
    pub fn get(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(jobs::table
            .filter(jobs::id.eq(job_id))
            .first(conn)
            .optional()?)
    }

    /// Lists the jobs of an application, newest first.
    pub fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(jobs::table
            .filter(jobs::application_id.eq(application_id))
            .order(jobs::created_at.desc())
            .load::<Job>(conn)?)
    }

    /// Sets the phase of a job.
    ///
    /// # Returns
    ///
    /// The number of affected rows (0 or 1).
    pub fn update_phase(&self, job_id: Uuid, phase: &str) -> Result<usize, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::update(jobs::table.filter(jobs::id.eq(job_id)))
            .set(jobs::phase.eq(phase))
            .execute(conn)?)
    }

    /// Hard deletes a job from the database.
    ///
    /// # Returns
    ///
    /// The number of affected rows (0 or 1).
    pub fn hard_delete(&self, job_id: Uuid) -> Result<usize, StoreError> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::delete(jobs::table.filter(jobs::id.eq(job_id))).execute(conn)?)
    }
}
