/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data models for our application to interact with
pub mod jobs;
pub mod phase;
pub mod secrets;

pub use jobs::{Job, NewJob};
pub use phase::PodPhase;
pub use secrets::{NewSecret, Secret};
