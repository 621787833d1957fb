/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::KubeCluster;
use crate::error::ClusterError;
use async_trait::async_trait;
use eitri_utils::telemetry::prelude::*;
use futures::stream::BoxStream;
use futures::{AsyncBufRead, AsyncBufReadExt, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};

/// A pod's log output, one item per line with the trailing newline removed.
///
/// Dropping the stream closes the underlying request.
pub type LogLineStream = BoxStream<'static, Result<String, ClusterError>>;

/// Log-fetch primitive shared by the archive tailers and live subscriptions.
#[async_trait]
pub trait PodLogSource: Send + Sync {
    /// Opens a following read of a pod's log output.
    ///
    /// # Arguments
    /// * `namespace` - Namespace of the pod
    /// * `pod` - Pod name
    /// * `since_seconds` - Lookback window; `None` replays the full history
    async fn follow(
        &self,
        namespace: &str,
        pod: &str,
        since_seconds: Option<i64>,
    ) -> Result<LogLineStream, ClusterError>;
}

#[async_trait]
impl PodLogSource for KubeCluster {
    async fn follow(
        &self,
        namespace: &str,
        pod: &str,
        since_seconds: Option<i64>,
    ) -> Result<LogLineStream, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            follow: true,
            since_seconds,
            ..Default::default()
        };

        debug!("Opening log stream for pod {}/{}", namespace, pod);
        let reader = pods.log_stream(pod, &params).await?;

        Ok(decode_lines(reader))
    }
}

/// Splits a raw log byte stream into lines.
///
/// Bytes that are not valid UTF-8 are replaced rather than failing the stream, and a
/// trailing `\r\n` or `\n` is removed. A final line without a newline is still yielded.
pub fn decode_lines<R>(reader: R) -> LogLineStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    futures::stream::try_unfold(reader, next_line)
        .map_err(ClusterError::from)
        .boxed()
}

async fn next_line<R>(mut reader: R) -> std::io::Result<Option<(String, R)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some((String::from_utf8_lossy(&buf).into_owned(), reader)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    async fn collect(bytes: &'static [u8]) -> Vec<String> {
        decode_lines(Cursor::new(bytes))
            .try_collect::<Vec<String>>()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_fatal() {
        let lines = collect(b"before\ncaf\xe9 latin1\nafter\n").await;
        assert_eq!(lines, vec!["before", "caf\u{FFFD} latin1", "after"]);
    }

    #[tokio::test]
    async fn test_crlf_and_unterminated_last_line() {
        let lines = collect(b"one\r\ntwo\n\nlast").await;
        assert_eq!(lines, vec!["one", "two", "", "last"]);
    }
}
