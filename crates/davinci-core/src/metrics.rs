//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocation and no locking.
pub struct Metrics {
    pipelines_started: AtomicU64,
    stages_completed: AtomicU64,
    stages_failed: AtomicU64,
    artifacts_written: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            pipelines_started: AtomicU64::new(0),
            stages_completed: AtomicU64::new(0),
            stages_failed: AtomicU64::new(0),
            artifacts_written: AtomicU64::new(0),
        }
    }

    pub fn inc_pipelines_started(&self) {
        self.pipelines_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pipelines_started", "counter incremented");
    }

    pub fn inc_stages_completed(&self) {
        self.stages_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stages_completed", "counter incremented");
    }

    pub fn inc_stages_failed(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stages_failed", "counter incremented");
    }

    pub fn inc_artifacts_written(&self) {
        self.artifacts_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_written", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            pipelines_started = self.pipelines_started(),
            stages_completed = self.stages_completed(),
            stages_failed = self.stages_failed(),
            artifacts_written = self.artifacts_written(),
        );
    }

    pub fn pipelines_started(&self) -> u64 {
        self.pipelines_started.load(Ordering::Relaxed)
    }

    pub fn stages_completed(&self) -> u64 {
        self.stages_completed.load(Ordering::Relaxed)
    }

    pub fn stages_failed(&self) -> u64 {
        self.stages_failed.load(Ordering::Relaxed)
    }

    pub fn artifacts_written(&self) -> u64 {
        self.artifacts_written.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.pipelines_started.store(0, Ordering::Relaxed);
        self.stages_completed.store(0, Ordering::Relaxed);
        self.stages_failed.store(0, Ordering::Relaxed);
        self.artifacts_written.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_pipelines_started();
        m.inc_stages_completed();
        m.inc_stages_completed();
        m.inc_stages_failed();
        m.inc_artifacts_written();
        assert_eq!(m.pipelines_started(), 1);
        assert_eq!(m.stages_completed(), 2);
        assert_eq!(m.stages_failed(), 1);
        assert_eq!(m.artifacts_written(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_pipelines_started();
        m.inc_artifacts_written();
        m.reset();
        assert_eq!(m.pipelines_started(), 0);
        assert_eq!(m.artifacts_written(), 0);
    }
}
