/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Module
//!
//! Prometheus metrics for the cluster-facing workers: the pod watch, the lifecycle
//! controller, the log tailers and Kubernetes API calls.

use prometheus::{CounterVec, Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Pod events consumed by the lifecycle controller
/// Labels: event (applied/deleted)
pub fn pod_events_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "eitri_pod_events_total",
            "Total number of pod watch events processed by the lifecycle controller",
        );
        let counter =
            CounterVec::new(opts, &["event"]).expect("Failed to create pod events counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register pod events counter");
        counter
    })
}

/// Number of log tailers currently running
pub fn active_tailers() -> &'static IntGauge {
    static GAUGE: OnceLock<IntGauge> = OnceLock::new();
    GAUGE.get_or_init(|| {
        let opts = Opts::new("eitri_active_tailers", "Number of pod log tailers running");
        let gauge = IntGauge::with_opts(opts).expect("Failed to create active tailers gauge");
        registry()
            .register(Box::new(gauge.clone()))
            .expect("Failed to register active tailers gauge");
        gauge
    })
}

/// Log lines appended to the archive
pub fn archived_lines_total() -> &'static IntCounter {
    static COUNTER: OnceLock<IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "eitri_archived_lines_total",
            "Total number of log lines appended to the archive",
        );
        let counter =
            IntCounter::with_opts(opts).expect("Failed to create archived lines counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register archived lines counter");
        counter
    })
}

/// Tailer exits
/// Labels: reason (end_of_stream/cancelled/stream_error/open_error/archive_error)
pub fn tailer_exits_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "eitri_tailer_exits_total",
            "Total number of log tailer exits by reason",
        );
        let counter =
            CounterVec::new(opts, &["reason"]).expect("Failed to create tailer exits counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register tailer exits counter");
        counter
    })
}

/// Kubernetes operations counter
/// Labels: operation (create_job/get_job/delete_job)
pub fn kubernetes_operations_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "eitri_kubernetes_operations_total",
            "Total number of Kubernetes API operations by type",
        );
        let counter = CounterVec::new(opts, &["operation"])
            .expect("Failed to create Kubernetes operations counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register Kubernetes operations counter");
        counter
    })
}

/// Encodes all registered metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
