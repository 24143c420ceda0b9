//! Structured observability hooks for pipeline run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for key lifecycle events: run start/finish, stage
//!   start/finish/failure, verdicts
//!
//! Events are emitted at `info!` level with an `event` field so they can be
//! filtered out of JSON logs.

use tracing::info;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("3f2a...", "aerial_screw", 42);
/// // all tracing calls are now associated with the run
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id, slug and seed.
    pub fn enter(run_id: &str, slug: &str, seed: u64) -> Self {
        let span = tracing::info_span!("davinci.run", run_id = %run_id, slug = %slug, seed = seed);
        Self {
            _span: span.entered(),
        }
    }
}

/// Build (but do not enter) the run span, for instrumenting futures.
pub fn run_span(run_id: &str, slug: &str, seed: u64) -> tracing::Span {
    tracing::info_span!("davinci.run", run_id = %run_id, slug = %slug, seed = seed)
}

pub fn emit_run_started(run_id: &str, slug: &str, seed: u64) {
    info!(event = "run.started", run_id = %run_id, slug = %slug, seed = seed);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, stages_completed: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        stages_completed = stages_completed,
        success = success,
    );
}

pub fn emit_stage_started(stage: &str) {
    info!(event = "stage.started", stage = %stage);
}

pub fn emit_stage_completed(stage: &str, duration_ms: u64) {
    info!(event = "stage.completed", stage = %stage, duration_ms = duration_ms);
}

pub fn emit_stage_skipped(stage: &str) {
    info!(event = "stage.skipped", stage = %stage);
}

/// Stage failure (warning level).
pub fn emit_stage_failed(stage: &str, kind: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "stage.failed", stage = %stage, kind = %kind, error = %error);
}

pub fn emit_verdict(slug: &str, verdict: &str, safety_factor: f64) {
    info!(
        event = "safety.verdict",
        slug = %slug,
        verdict = %verdict,
        safety_factor = safety_factor,
    );
}

/// Artifact persistence failure that did not abort the run (warning level).
pub fn emit_artifact_warning(path: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "artifact.warning", path = %path, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _span = RunSpan::enter("test-run-id", "parachute", 0);
        emit_stage_started("plan");
        emit_stage_completed("plan", 1);
    }
}
