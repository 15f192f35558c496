// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters for block and report activity.

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

pub struct ServiceMetrics {
    registry: Registry,
    /// Labelled by outcome: blocked, already_blocked, unblocked, not_blocked, imported
    pub block_actions: IntCounterVec,
    /// Labelled by event: filed, user_reply, admin_update, deleted
    pub report_events: IntCounterVec,
    /// Labelled by side effect: gallery_revocation, notification
    pub degraded_side_effects: IntCounterVec,
}

impl ServiceMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let block_actions = IntCounterVec::new(
            Opts::new("match_abuse_block_actions_total", "Block and unblock actions"),
            &["outcome"],
        )?;
        let report_events = IntCounterVec::new(
            Opts::new("match_abuse_report_events_total", "Abuse report workflow events"),
            &["event"],
        )?;
        let degraded_side_effects = IntCounterVec::new(
            Opts::new(
                "match_abuse_degraded_side_effects_total",
                "Side effects that failed without failing the action",
            ),
            &["side_effect"],
        )?;

        registry.register(Box::new(block_actions.clone()))?;
        registry.register(Box::new(report_events.clone()))?;
        registry.register(Box::new(degraded_side_effects.clone()))?;

        Ok(Self {
            registry,
            block_actions,
            report_events,
            degraded_side_effects,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

static METRICS: Lazy<Option<ServiceMetrics>> = Lazy::new(|| match ServiceMetrics::new() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        error!("Failed to register metrics: {}", e);
        None
    }
});

pub fn metrics() -> Option<&'static ServiceMetrics> {
    METRICS.as_ref()
}

pub fn record_block_action(outcome: &str) {
    record_block_action_by(outcome, 1);
}

/// Count `n` block actions with the same outcome at once
pub fn record_block_action_by(outcome: &str, n: usize) {
    if let Some(m) = metrics() {
        m.block_actions.with_label_values(&[outcome]).inc_by(n as u64);
    }
}

pub fn record_report_event(event: &str) {
    if let Some(m) = metrics() {
        m.report_events.with_label_values(&[event]).inc();
    }
}

pub fn record_degraded(side_effect: &str) {
    if let Some(m) = metrics() {
        m.degraded_side_effects.with_label_values(&[side_effect]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_increment_adds_the_whole_count() {
        record_block_action_by("batch_check", 3);
        record_block_action_by("batch_check", 0);

        let counted = metrics()
            .map(|m| m.block_actions.with_label_values(&["batch_check"]).get())
            .unwrap();
        assert_eq!(counted, 3);
    }

    #[test]
    fn encoded_output_names_the_counters() {
        record_report_event("encode_check");
        let text = metrics().unwrap().encode().unwrap();
        assert!(text.contains("match_abuse_report_events_total"));
    }
}
