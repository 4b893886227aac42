//! Prometheus metrics collection for siteroute
//!
//! Tracks:
//! - Report outcomes by source (model/fallback) and fallback reason
//! - Completion request latency
//!
//! Call `gather()` to render the Prometheus text format.

use crate::completion::{FallbackReason, ReportSource};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Label value used when a report came from the model
const NO_REASON: &str = "none";

/// Metrics collector for report generation
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    report_outcomes: IntCounterVec,
    completion_duration: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 1 model series + 4 fallback reasons = 5 time series
        let report_outcomes = IntCounterVec::new(
            Opts::new(
                "siteroute_report_outcomes_total",
                "Total report generations by source and fallback reason",
            ),
            &["source", "reason"],
        )?;

        let completion_duration = Histogram::with_opts(
            HistogramOpts::new(
                "siteroute_completion_duration_seconds",
                "Latency of completion requests that reached the network, in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        registry.register(Box::new(report_outcomes.clone()))?;
        registry.register(Box::new(completion_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            report_outcomes,
            completion_duration,
        })
    }

    /// Record how a report was produced
    pub fn record_outcome(
        &self,
        source: ReportSource,
        reason: Option<FallbackReason>,
    ) -> Result<(), prometheus::Error> {
        let reason_label = reason.map_or(NO_REASON, |r| r.as_str());
        self.report_outcomes
            .get_metric_with_label_values(&[source.as_str(), reason_label])?
            .inc();
        Ok(())
    }

    /// Record the duration of a completion request
    ///
    /// # Errors
    ///
    /// Returns an error if `seconds` is NaN, infinite, or negative.
    pub fn record_completion_duration(&self, seconds: f64) -> Result<(), prometheus::Error> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Invalid completion duration: {} (must be finite and non-negative)",
                seconds
            )));
        }
        self.completion_duration.observe(seconds);
        Ok(())
    }

    /// Current count for one outcome label pair
    pub fn outcome_count(&self, source: ReportSource, reason: Option<FallbackReason>) -> u64 {
        let reason_label = reason.map_or(NO_REASON, |r| r.as_str());
        self.report_outcomes
            .get_metric_with_label_values(&[source.as_str(), reason_label])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Number of completion durations observed
    pub fn completion_count(&self) -> u64 {
        self.completion_duration.get_sample_count()
    }

    /// Render all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_families.len(),
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}
