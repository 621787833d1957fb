/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Jobs Module
//!
//! A `Job` is the internal record of one execution request and the cluster Job
//! created for it.
//!
//! ## Core Data Model
//!
//! - `id`: Uuid - Internal identifier, also written to the pods' correlation label
//! - `created_at` / `updated_at`: DateTime<Utc> - Managed by the database
//! - `application_id`: Uuid - Owning application
//! - `name`: String - Final cluster Job name (`<template-name>-<suffix>`)
//! - `namespace`: String - Namespace the cluster Job lives in
//! - `phase`: String - Last observed pod phase (see [`PodPhase`])
//! - `spec`: serde_json::Value - The submitted template spec, placeholders intact
//! - `meta`: serde_json::Value - Object metadata returned by the cluster
//!
//! Records are inserted only after the cluster accepted the Job, and `phase` is only
//! mutated by the pod lifecycle controller afterwards.

use crate::models::phase::PodPhase;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Longest name the cluster accepts for a Job object.
pub const MAX_JOB_NAME_LENGTH: usize = 63;

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    AsChangeset,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    PartialEq,
    ToSchema,
)]
#[diesel(table_name = crate::schema::jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    /// Unique identifier for the job
    pub id: Uuid,
    /// Timestamp when the job was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when the job was last updated
    pub updated_at: DateTime<Utc>,
    /// Application the job was submitted for
    pub application_id: Uuid,
    /// Name of the cluster Job
    #[schema(example = "nightly-report-qhzkvbwmra")]
    pub name: String,
    /// Namespace of the cluster Job
    #[schema(example = "default")]
    pub namespace: String,
    /// Last observed pod phase
    #[schema(example = "Running")]
    pub phase: String,
    /// Template spec as submitted
    #[schema(value_type = Object)]
    pub spec: serde_json::Value,
    /// Object metadata returned by the cluster
    #[schema(value_type = Object)]
    pub meta: serde_json::Value,
}

/// Represents a new job to be inserted into the database.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub application_id: Uuid,
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub spec: serde_json::Value,
    pub meta: serde_json::Value,
}

impl NewJob {
    /// Creates a new `NewJob` instance in the `Pending` phase.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier already written to the cluster Job's correlation label
    /// * `application_id` - Owning application
    /// * `name` - Final cluster Job name
    /// * `namespace` - Namespace of the cluster Job
    /// * `spec` - Template spec as submitted
    /// * `meta` - Object metadata returned by the cluster
    ///
    /// # Returns
    ///
    /// A `Result` containing the `NewJob`, or an error message if validation fails.
    pub fn new(
        id: Uuid,
        application_id: Uuid,
        name: String,
        namespace: String,
        spec: serde_json::Value,
        meta: serde_json::Value,
    ) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Job name cannot be empty".to_string());
        }
        if name.len() > MAX_JOB_NAME_LENGTH {
            return Err(format!(
                "Job name cannot exceed {} characters",
                MAX_JOB_NAME_LENGTH
            ));
        }
        if namespace.trim().is_empty() {
            return Err("Namespace cannot be empty".to_string());
        }

        Ok(NewJob {
            id,
            application_id,
            name,
            namespace,
            phase: PodPhase::Pending.to_string(),
            spec,
            meta,
        })
    }
}
