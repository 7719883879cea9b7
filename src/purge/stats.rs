use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregated outcome of one purge run.
///
/// Created when the executor starts, mutated as each repository is
/// processed, finalized and reported once at the end. Never persisted;
/// the checkpoint carries the durable per-repository record.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeStats {
    pub total_found: usize,
    pub total_deleted: usize,
    pub total_failed: usize,
    pub total_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

impl PurgeStats {
    pub fn new(total_found: usize) -> Self {
        Self {
            total_found,
            total_deleted: 0,
            total_failed: 0,
            total_skipped: 0,
            started_at: Utc::now(),
            finished_at: None,
            errors: Vec::new(),
        }
    }

    pub fn record_deleted(&mut self) {
        self.total_deleted += 1;
    }

    pub fn record_skipped(&mut self) {
        self.total_skipped += 1;
    }

    pub fn record_failed(&mut self, error: String) {
        self.total_failed += 1;
        self.errors.push(error);
    }

    /// Record a problem that does not mark the run as failed.
    pub fn record_warning(&mut self, warning: String) {
        self.errors.push(warning);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when any per-repository failure was recorded; the process
    /// exit code reflects this.
    pub fn is_failure(&self) -> bool {
        self.total_failed > 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}
