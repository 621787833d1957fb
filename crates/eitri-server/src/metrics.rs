/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Module
//!
//! This module provides Prometheus metrics for the eitri server.
//! It exposes metrics about job submissions, the hub and live subscriptions.

use prometheus::{CounterVec, Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Job submissions
/// Labels: status (created/invalid/secrets_error/cluster_error/store_error)
pub fn jobs_submitted_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "eitri_jobs_submitted_total",
            "Total number of job submissions by outcome",
        );
        let counter =
            CounterVec::new(opts, &["status"]).expect("Failed to create job submissions counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register job submissions counter");
        counter
    })
}

/// Clients registered with the hub
pub fn hub_clients() -> &'static IntGauge {
    static GAUGE: OnceLock<IntGauge> = OnceLock::new();
    GAUGE.get_or_init(|| {
        let gauge = IntGauge::with_opts(Opts::new(
            "eitri_hub_clients",
            "Number of live viewer connections registered with the hub",
        ))
        .expect("Failed to create hub clients gauge");
        registry()
            .register(Box::new(gauge.clone()))
            .expect("Failed to register hub clients gauge");
        gauge
    })
}

/// Non-empty rooms
pub fn hub_rooms() -> &'static IntGauge {
    static GAUGE: OnceLock<IntGauge> = OnceLock::new();
    GAUGE.get_or_init(|| {
        let gauge = IntGauge::with_opts(Opts::new("eitri_hub_rooms", "Number of hub rooms"))
            .expect("Failed to create hub rooms gauge");
        registry()
            .register(Box::new(gauge.clone()))
            .expect("Failed to register hub rooms gauge");
        gauge
    })
}

/// Messages skipped because a client's queue was full
pub fn hub_dropped_messages_total() -> &'static IntCounter {
    static COUNTER: OnceLock<IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let counter = IntCounter::with_opts(Opts::new(
            "eitri_hub_dropped_messages_total",
            "Total number of broadcast messages dropped for slow clients",
        ))
        .expect("Failed to create dropped messages counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register dropped messages counter");
        counter
    })
}

/// Live tails opened by subscribe requests
pub fn live_subscriptions_total() -> &'static IntCounter {
    static COUNTER: OnceLock<IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let counter = IntCounter::with_opts(Opts::new(
            "eitri_live_subscriptions_total",
            "Total number of live log subscriptions started",
        ))
        .expect("Failed to create live subscriptions counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register live subscriptions counter");
        counter
    })
}

/// Encodes server and cluster metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if encoder.encode(&registry().gather(), &mut buffer).is_err() {
        return String::new();
    }
    let mut output = String::from_utf8(buffer).unwrap_or_default();
    output.push_str(&eitri_cluster::metrics::encode_metrics());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_both_registries() {
        jobs_submitted_total().with_label_values(&["created"]).inc();
        eitri_cluster::metrics::archived_lines_total().inc();

        let output = encode_metrics();
        assert!(output.contains("eitri_jobs_submitted_total"));
        assert!(output.contains("eitri_archived_lines_total"));
    }
}
