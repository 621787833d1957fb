/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Log Archive
//!
//! Durable per-job, per-pod log files:
//!
//! ```text
//! <logs-root>/<job-id>/<pod-name>/logs.log
//! ```
//!
//! Files are append-only, newline-delimited UTF-8 and created lazily on the first line.
//! Each file has exactly one writer (the pod's tailer) for its lifetime, so writes are
//! not coordinated beyond that writer's own ordering. Nothing here ever truncates.

use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use eitri_utils::telemetry::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// File name used for every pod's archive.
pub const ARCHIVE_FILE_NAME: &str = "logs.log";

/// Root of the on-disk archive.
#[derive(Debug, Clone)]
pub struct LogArchive {
    root: PathBuf,
}

/// One archived pod log as returned by [`LogArchive::read_job`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArchivedFile {
    /// Pod name the file belongs to
    pub file: String,
    pub file_data: ArchivedFileData,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArchivedFileData {
    pub date_created: DateTime<Utc>,
    pub path: String,
    /// One entry per archived line, newlines removed
    pub logs: Vec<String>,
}

fn validate_pod_name(pod: &str) -> Result<(), ArchiveError> {
    if pod.is_empty() || pod == "." || pod == ".." || pod.contains('/') || pod.contains('\\') {
        return Err(ArchiveError::InvalidPodName(pod.to_string()));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl LogArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every pod archive of a job.
    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// Path of the archive file for one (job, pod) pair.
    pub fn file_path(&self, job_id: Uuid, pod: &str) -> Result<PathBuf, ArchiveError> {
        validate_pod_name(pod)?;
        Ok(self.job_dir(job_id).join(pod).join(ARCHIVE_FILE_NAME))
    }

    /// Returns a writer for the (job, pod) pair. Nothing touches the disk until the first line.
    pub fn writer(&self, job_id: Uuid, pod: &str) -> Result<ArchiveWriter, ArchiveError> {
        Ok(ArchiveWriter {
            path: self.file_path(job_id, pod)?,
            file: None,
            lines_written: 0,
        })
    }

    /// Reads every pod archive of a job, oldest file first.
    ///
    /// A job without an archive directory yields an empty list.
    pub async fn read_job(&self, job_id: Uuid) -> Result<Vec<ArchivedFile>, ArchiveError> {
        let job_dir = self.job_dir(job_id);
        let mut entries = match fs::read_dir(&job_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&job_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&job_dir, e))?
        {
            let pod_dir = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => {}
                Ok(_) => {
                    debug!("Skipping non-directory archive entry {}", pod_dir.display());
                    continue;
                }
                Err(e) => return Err(io_error(&pod_dir, e)),
            }
            let path = pod_dir.join(ARCHIVE_FILE_NAME);

            let metadata = match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&path, e)),
            };

            // Birth time is not available on every filesystem
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map_err(|e| io_error(&path, e))?;

            let contents = fs::read(&path).await.map_err(|e| io_error(&path, e))?;
            let logs = String::from_utf8_lossy(&contents)
                .lines()
                .map(str::to_string)
                .collect();

            files.push(ArchivedFile {
                file: entry.file_name().to_string_lossy().into_owned(),
                file_data: ArchivedFileData {
                    date_created: DateTime::<Utc>::from(created),
                    path: path.display().to_string(),
                    logs,
                },
            });
        }

        files.sort_by(|a, b| {
            a.file_data
                .date_created
                .cmp(&b.file_data.date_created)
                .then_with(|| a.file.cmp(&b.file))
        });
        Ok(files)
    }
}

/// Append-only writer for a single pod's archive file.
#[derive(Debug)]
pub struct ArchiveWriter {
    path: PathBuf,
    file: Option<File>,
    lines_written: u64,
}

impl ArchiveWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    async fn open(&mut self) -> Result<&mut File, ArchiveError> {
        match self.file {
            Some(ref mut file) => Ok(file),
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| io_error(parent, e))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| io_error(&self.path, e))?;
                Ok(self.file.insert(file))
            }
        }
    }

    /// Appends one line followed by a newline.
    pub async fn append_line(&mut self, line: &str) -> Result<(), ArchiveError> {
        let path = self.path.clone();
        let file = self.open().await?;

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line.as_bytes());
        record.push(b'\n');

        file.write_all(&record)
            .await
            .map_err(|e| io_error(&path, e))?;
        self.lines_written += 1;
        Ok(())
    }

    /// Flushes buffered data; called once the tailer is done with the file.
    pub async fn finish(&mut self) -> Result<(), ArchiveError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await.map_err(|e| io_error(&self.path, e))?;
        }
        Ok(())
    }
}
