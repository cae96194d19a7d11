//! Query-path metrics, exported on `/metrics` by the binary that mounts
//! this router. Mirrors the teacher's `s3_metrics()`/`OperationTimer`
//! pattern: a handful of named counters/histograms recorded inline, no
//! registry object threaded through call sites.

use std::time::Instant;

/// Starts a timer for one stage of the query pipeline; record its duration
/// with [`OperationTimer::finish`].
pub struct OperationTimer {
    name: &'static str,
    started: Instant,
}

impl OperationTimer {
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self { name, started: Instant::now() }
    }

    pub fn finish(self) {
        metrics::histogram!("sharing_stage_duration_seconds", "stage" => self.name)
            .record(self.started.elapsed().as_secs_f64());
    }
}

pub fn record_query() {
    metrics::counter!("sharing_queries_total").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("sharing_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rows_served(count: u64) {
    metrics::counter!("sharing_rows_served_total").increment(count);
}
