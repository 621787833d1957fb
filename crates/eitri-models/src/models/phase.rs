/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Pod phase vocabulary shared by the controller and the persisted job record.
//!
//! The cluster reports phases as free-form strings. The known values get their own
//! variants; anything else is carried verbatim in `Unrecognized` so that a newer
//! cluster vocabulary round-trips through the database unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// The cluster's own "Unknown" phase (node unreachable and similar).
    Unknown,
    Unrecognized(String),
}

impl PodPhase {
    pub fn as_str(&self) -> &str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
            PodPhase::Unrecognized(raw) => raw.as_str(),
        }
    }

    /// Whether a pod in this phase should have its logs tailed.
    pub fn is_running(&self) -> bool {
        matches!(self, PodPhase::Running)
    }

    /// Builds a phase from the optional `status.phase` of a pod.
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some(raw) => raw.parse().unwrap_or(PodPhase::Unknown),
            None => PodPhase::Unknown,
        }
    }
}

impl FromStr for PodPhase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Unknown" | "" => PodPhase::Unknown,
            other => PodPhase::Unrecognized(other.to_string()),
        })
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PodPhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PodPhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PodPhase::from_str(&raw).unwrap_or(PodPhase::Unknown))
    }
}
