/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Per-pod worker that follows a pod's log output into the archive.
//!
//! Lines from this worker are never broadcast to live viewers; live subscriptions
//! open their own stream. The tailer stops at end-of-stream, on the first read
//! error, or when cancelled. There is no retry.

use crate::archive::LogArchive;
use crate::k8s::PodLogSource;
use crate::metrics;
use eitri_utils::telemetry::prelude::*;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The pod a tailer follows and the job it is archived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailTarget {
    pub job_id: Uuid,
    pub namespace: String,
    pub pod: String,
}

/// Why a tailer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    /// The pod's log stream closed normally.
    EndOfStream,
    /// Cancelled by the controller.
    Cancelled,
    /// The stream returned an error mid-read.
    StreamError,
    /// The stream could not be opened.
    OpenError,
    /// The archive path for the pod could not be formed.
    ArchiveError,
}

impl TailOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            TailOutcome::EndOfStream => "end_of_stream",
            TailOutcome::Cancelled => "cancelled",
            TailOutcome::StreamError => "stream_error",
            TailOutcome::OpenError => "open_error",
            TailOutcome::ArchiveError => "archive_error",
        }
    }
}

/// Follows `target`'s logs and appends each line to its archive file.
///
/// # Arguments
/// * `logs` - Log-fetch primitive
/// * `archive` - Archive the lines are appended to
/// * `target` - Job, namespace and pod to follow
/// * `since_seconds` - Bounded lookback applied when the stream is opened
/// * `cancel` - Stops the tailer and drops the stream promptly
///
/// # Returns
/// The reason the tailer stopped.
pub async fn tail_pod(
    logs: &dyn PodLogSource,
    archive: &LogArchive,
    target: &TailTarget,
    since_seconds: Option<i64>,
    cancel: CancellationToken,
) -> TailOutcome {
    let mut writer = match archive.writer(target.job_id, &target.pod) {
        Ok(writer) => writer,
        Err(e) => {
            error!(job_id = %target.job_id, pod = %target.pod, "Cannot archive pod logs: {}", e);
            return TailOutcome::ArchiveError;
        }
    };

    let mut lines = tokio::select! {
        _ = cancel.cancelled() => return TailOutcome::Cancelled,
        opened = logs.follow(&target.namespace, &target.pod, since_seconds) => match opened {
            Ok(lines) => lines,
            Err(e) => {
                warn!(
                    job_id = %target.job_id,
                    pod = %target.pod,
                    "Failed to open log stream: {}", e
                );
                return TailOutcome::OpenError;
            }
        },
    };

    info!(
        job_id = %target.job_id,
        pod = %target.pod,
        "Tailing pod logs into {}",
        writer.path().display()
    );

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break TailOutcome::Cancelled,
            next = lines.next() => match next {
                None => break TailOutcome::EndOfStream,
                Some(Ok(line)) => {
                    trace!(pod = %target.pod, "{}", line);
                    match writer.append_line(&line).await {
                        Ok(()) => metrics::archived_lines_total().inc(),
                        // Keep reading; a later write may succeed once space frees up
                        Err(e) => error!(pod = %target.pod, "Failed to archive log line: {}", e),
                    }
                }
                Some(Err(e)) => {
                    warn!(job_id = %target.job_id, pod = %target.pod, "Log stream failed: {}", e);
                    break TailOutcome::StreamError;
                }
            },
        }
    };

    if let Err(e) = writer.finish().await {
        error!(pod = %target.pod, "Failed to flush archive: {}", e);
    }

    info!(
        job_id = %target.job_id,
        pod = %target.pod,
        lines = writer.lines_written(),
        "Stopped tailing pod logs ({})",
        outcome.as_label()
    );
    outcome
}
