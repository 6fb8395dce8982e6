use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

/// Cycles failing in a row before the exporter reports itself unhealthy.
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// What one cycle did, for logs and the `/status` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at_ms: i64,
    pub duration_ms: u64,
    pub groups_discovered: usize,
    pub groups_selected: usize,
    pub groups_with_lag: usize,
    pub group_failures: usize,
    pub series: usize,
    pub reconciled: bool,
    pub metric_failures: usize,
    pub threshold_failures: usize,
    pub batches_published: usize,
    pub batches_failed: usize,
    /// Failed batches whose error may clear on its own (transport, 429, 5xx).
    pub batches_retryable: usize,
}

/// State shared between the scheduler and the health server.
pub struct PipelineStatus {
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    last_report: RwLock<Option<CycleReport>>,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn record_success(&self, report: CycleReport) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
        *self
            .last_report
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    /// Count a failed cycle and return the number of consecutive failures so far.
    pub fn record_failure(&self) -> u32 {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= UNHEALTHY_AFTER_FAILURES {
            self.healthy.store(false, Ordering::SeqCst);
        }
        failures
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Ready once any cycle has completed.
    pub fn is_ready(&self) -> bool {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::new()
    }
}
