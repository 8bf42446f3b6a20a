//! Pipeline counters for imports, runs and alerts.

use std::time::{Duration, Instant};

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use serde::Serialize;

use crate::models::{ImportSummary, RunSummary};
use crate::notify::DispatchReport;

/// Counter: new listings written by imports
pub const ROWS_IMPORTED: &str = "land_analyzer_rows_imported_total";
/// Counter: existing listings updated by imports
pub const ROWS_UPDATED: &str = "land_analyzer_rows_updated_total";
/// Counter: rows rejected by parsing or the store
pub const ROWS_SKIPPED: &str = "land_analyzer_rows_skipped_total";
/// Counter: addresses the geocoder could not resolve
pub const GEOCODE_FAILURES: &str = "land_analyzer_geocode_failures_total";
/// Histogram: seconds per import
pub const IMPORT_DURATION: &str = "land_analyzer_import_duration_seconds";
/// Gauge: streets in the latest run
pub const STREETS_ANALYZED: &str = "land_analyzer_streets_analyzed";
/// Gauge: parcels scored in the latest run
pub const OPPORTUNITIES_SCORED: &str = "land_analyzer_opportunities_scored";
/// Gauge: parcels left unscored in the latest run
pub const INSUFFICIENT_DATA: &str = "land_analyzer_insufficient_data_parcels";
/// Histogram: seconds per analysis run
pub const RUN_DURATION: &str = "land_analyzer_run_duration_seconds";
/// Counter: alerts delivered
pub const ALERTS_SENT: &str = "land_analyzer_alerts_sent_total";
/// Counter: alert deliveries that failed
pub const ALERTS_FAILED: &str = "land_analyzer_alerts_failed_total";
/// Counter: failed operations, labeled by type and operation
pub const ERRORS: &str = "land_analyzer_errors_total";

/// Pipeline counters, mirrored to the `metrics` facade.
///
/// The in-process tallies back the CLI summaries and the `/api/stats`
/// endpoint; whatever recorder is installed sees the same numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    /// Imports completed
    pub imports_total: u64,
    /// New listings across all imports
    pub rows_imported_total: u64,
    /// Updated listings across all imports
    pub rows_updated_total: u64,
    /// Rejected rows across all imports
    pub rows_skipped_total: u64,
    /// Unresolved addresses across all imports
    pub geocode_failures_total: u64,
    /// Analysis runs completed
    pub runs_total: u64,
    /// Streets in the latest run
    pub streets_analyzed: u64,
    /// Parcels scored in the latest run
    pub opportunities_scored: u64,
    /// Parcels left unscored in the latest run
    pub insufficient_data_parcels: u64,
    /// Alerts delivered
    pub alerts_sent_total: u64,
    /// Alert deliveries that failed
    pub alerts_failed_total: u64,
    /// Failed operations
    pub errors_total: u64,
}

impl PipelineMetrics {
    /// Install the no-op recorder so the facade calls are cheap when nothing exports them
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {}", e))?;
        Ok(())
    }

    /// Record the outcome of one CSV import
    pub fn record_import(&mut self, summary: &ImportSummary, duration: Duration) {
        self.imports_total += 1;
        self.rows_imported_total += summary.imported as u64;
        self.rows_updated_total += summary.updated as u64;
        self.rows_skipped_total += summary.skipped as u64;
        self.geocode_failures_total += summary.geocode_failures as u64;

        counter!(ROWS_IMPORTED).increment(summary.imported as u64);
        counter!(ROWS_UPDATED).increment(summary.updated as u64);
        counter!(ROWS_SKIPPED).increment(summary.skipped as u64);
        counter!(GEOCODE_FAILURES).increment(summary.geocode_failures as u64);
        histogram!(IMPORT_DURATION).record(duration.as_secs_f64());
    }

    /// Record the outcome of one analysis run; the gauges reflect the latest run
    pub fn record_run(&mut self, summary: &RunSummary, duration: Duration) {
        self.runs_total += 1;
        self.streets_analyzed = summary.streets as u64;
        self.opportunities_scored = summary.opportunities as u64;
        self.insufficient_data_parcels = summary.insufficient_data.len() as u64;

        gauge!(STREETS_ANALYZED).set(summary.streets as f64);
        gauge!(OPPORTUNITIES_SCORED).set(summary.opportunities as f64);
        gauge!(INSUFFICIENT_DATA).set(summary.insufficient_data.len() as f64);
        histogram!(RUN_DURATION).record(duration.as_secs_f64());
    }

    /// Record notification delivery
    pub fn record_alerts(&mut self, report: &DispatchReport) {
        self.alerts_sent_total += report.sent as u64;
        self.alerts_failed_total += report.failed as u64;

        counter!(ALERTS_SENT).increment(report.sent as u64);
        counter!(ALERTS_FAILED).increment(report.failed as u64);
    }

    /// Record a failed operation
    pub fn record_error(&mut self, error_type: &str, operation: &str) {
        self.errors_total += 1;
        counter!(ERRORS, "type" => error_type.to_string(), "operation" => operation.to_string())
            .increment(1);
    }
}

/// Measures an operation for [`PipelineMetrics`]
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    /// Start timing now
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since [`MetricsTimer::start`]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
