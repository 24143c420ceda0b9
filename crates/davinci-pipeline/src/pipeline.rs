//! Pipeline orchestration and run manifests.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use davinci_core::harness::{run_build, run_evaluate, run_plan, run_simulate};
use davinci_core::obs::{
    emit_artifact_warning, emit_run_finished, emit_run_started, emit_stage_completed,
    emit_stage_failed, emit_stage_skipped, emit_stage_started, emit_verdict, run_span,
};
use davinci_core::registry::{self, Registry};
use davinci_core::{
    CadArtifact, CancelToken, Fidelity, InventionConfig, PlanResult, RegistryError, SafetyVerdict,
    SimContext, SimulationResult, StageError, StageResult, VerdictKind, METRICS,
};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::runner::run_stage;
use crate::spec::RunSpec;
use crate::stage::{PipelineOptions, Stage, StageStatus};

/// Errors that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    NotFound(#[from] RegistryError),

    #[error("cannot derive run identity: {0}")]
    Identity(StageError),

    #[error("run task aborted: {0}")]
    Aborted(String),

    #[error("run {run_id} finished but its manifest was not written: {source}")]
    Manifest { run_id: String, source: StageError },
}

/// One row of the run's stage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,

    /// Wall-clock time; left out of manifests so re-runs are byte-identical.
    #[serde(skip)]
    pub duration_ms: u64,
}

/// The stage that stopped a run and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: StageError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.error)
    }
}

/// Result of a complete pipeline run. Serialized as the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub slug: String,
    pub seed: u64,
    pub fidelity: Fidelity,
    pub config_digest: String,

    /// One record per stage, in execution order.
    pub stages: Vec<StageRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cad: Option<CadArtifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<SafetyVerdict>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl PipelineRunResult {
    fn new(spec: &RunSpec) -> Self {
        Self {
            run_id: spec.run_id.clone(),
            slug: spec.slug.clone(),
            seed: spec.seed,
            fidelity: spec.fidelity,
            config_digest: spec.config_digest.clone(),
            stages: Vec::with_capacity(Stage::ALL.len()),
            plan: None,
            simulation: None,
            cad: None,
            verdict: None,
            failure: None,
        }
    }

    /// Whether no stage failed.
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.status)
    }

    /// Number of stages that completed.
    pub fn completed_count(&self) -> usize {
        self.count(StageStatus::Completed)
    }

    /// Number of stages that were skipped.
    pub fn skipped_count(&self) -> usize {
        self.count(StageStatus::Skipped)
    }

    pub fn verdict_kind(&self) -> Option<VerdictKind> {
        self.verdict.as_ref().map(|v| v.kind())
    }

    /// Total wall-clock time across executed stages.
    pub fn duration_ms(&self) -> u64 {
        self.stages.iter().map(|r| r.duration_ms).sum()
    }

    fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|r| r.status == status).count()
    }

    fn record(&mut self, stage: Stage, status: StageStatus, duration_ms: u64) {
        self.stages.push(StageRecord {
            stage,
            status,
            duration_ms,
        });
    }

    /// Mark every stage without a record as skipped.
    fn skip_remaining(&mut self) {
        for stage in Stage::ALL {
            if self.status(stage).is_none() {
                emit_stage_skipped(stage.name());
                self.record(stage, StageStatus::Skipped, 0);
            }
        }
    }
}

/// Pipeline orchestrator bound to a registry and a set of options.
#[derive(Clone)]
pub struct PipelineRunner {
    registry: Arc<Registry>,
    options: PipelineOptions,
}

impl PipelineRunner {
    /// Runner over the process-wide registry.
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_registry(registry::global(), options)
    }

    pub fn with_registry(registry: Arc<Registry>, options: PipelineOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Execute PLAN -> SIMULATE -> BUILD -> EVALUATE for one invention.
    ///
    /// Unknown slugs fail immediately with `NotFound`. A stage failure is not
    /// an `Err`: it is recorded in the returned result, later stages are
    /// marked skipped and the manifest is still written. Failing to write the
    /// manifest is an `Err`.
    pub async fn run(
        &self,
        slug: &str,
        seed: u64,
        config: &InventionConfig,
    ) -> Result<PipelineRunResult, PipelineError> {
        let invention = self.registry.resolve(slug)?;
        let spec = RunSpec::new(slug, seed, config).map_err(PipelineError::Identity)?;
        let span = run_span(&spec.run_id, slug, seed);

        async move {
            METRICS.inc_pipelines_started();
            emit_run_started(&spec.run_id, slug, seed);

            let start = Instant::now();
            let cancel = CancelToken::new();
            let store = self.options.store().cloned();
            let mut run = PipelineRunResult::new(&spec);

            // PLAN
            let plan = {
                let invention = Arc::clone(&invention);
                let config = config.clone();
                self.execute(Stage::Plan, &mut run, &cancel, move || {
                    run_plan(invention.as_ref(), &config)
                })
                .await
            };
            let Some(plan) = plan.map(Arc::new) else {
                return self.finish(run, start);
            };
            run.plan = Some(plan.as_ref().clone());
            if self.options.stops_before(Stage::Simulate) {
                return self.finish(run, start);
            }

            // SIMULATE
            let simulation = {
                let invention = Arc::clone(&invention);
                let plan = Arc::clone(&plan);
                let store = store.clone();
                let mut ctx = SimContext::new(seed, plan.fidelity).with_cancel(cancel.clone());
                self.execute(Stage::Simulate, &mut run, &cancel, move || {
                    run_simulate(invention.as_ref(), &plan, &mut ctx, store.as_ref())
                })
                .await
            };
            let Some(simulation) = simulation.map(Arc::new) else {
                return self.finish(run, start);
            };
            run.simulation = Some(simulation.as_ref().clone());
            if self.options.stops_before(Stage::Build) {
                return self.finish(run, start);
            }

            // BUILD
            if self.options.with_cad {
                let cad = {
                    let invention = Arc::clone(&invention);
                    let plan = Arc::clone(&plan);
                    let simulation = Arc::clone(&simulation);
                    let store = store.clone();
                    let token = cancel.clone();
                    self.execute(Stage::Build, &mut run, &cancel, move || {
                        run_build(invention.as_ref(), &plan, &simulation, &token, store.as_ref())
                    })
                    .await
                };
                let Some(cad) = cad else {
                    return self.finish(run, start);
                };
                run.cad = Some(cad);
            } else {
                emit_stage_skipped(Stage::Build.name());
                run.record(Stage::Build, StageStatus::Skipped, 0);
            }
            if self.options.stops_before(Stage::Evaluate) {
                return self.finish(run, start);
            }

            // EVALUATE
            let verdict = {
                let invention = Arc::clone(&invention);
                let simulation = Arc::clone(&simulation);
                let token = cancel.clone();
                self.execute(Stage::Evaluate, &mut run, &cancel, move || {
                    run_evaluate(invention.as_ref(), &simulation, &token, store.as_ref())
                })
                .await
            };
            if let Some(verdict) = verdict {
                emit_verdict(slug, verdict.kind().name(), verdict.safety_factor());
                run.verdict = Some(verdict);
            }

            self.finish(run, start)
        }
        .instrument(span)
        .await
    }

    /// Run one stage and record its outcome. `None` means the stage failed.
    async fn execute<T, F>(
        &self,
        stage: Stage,
        run: &mut PipelineRunResult,
        cancel: &CancelToken,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> StageResult<T> + Send + 'static,
    {
        emit_stage_started(stage.name());
        let started = Instant::now();
        let outcome = run_stage(stage, self.options.stage_timeout, cancel, work).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                METRICS.inc_stages_completed();
                emit_stage_completed(stage.name(), duration_ms);
                run.record(stage, StageStatus::Completed, duration_ms);
                Some(value)
            }
            Err(error) => {
                METRICS.inc_stages_failed();
                emit_stage_failed(stage.name(), error.kind(), &error);
                run.record(stage, StageStatus::Failed, duration_ms);
                run.failure = Some(StageFailure { stage, error });
                None
            }
        }
    }

    fn finish(
        &self,
        mut run: PipelineRunResult,
        start: Instant,
    ) -> Result<PipelineRunResult, PipelineError> {
        run.skip_remaining();

        if let Some(store) = self.options.store() {
            let path = store.manifest_path(&run.slug, run.seed);
            if let Err(e) = store.write_json(&path, &run) {
                emit_artifact_warning(&path.display().to_string(), &e);
                return Err(PipelineError::Manifest {
                    run_id: run.run_id,
                    source: e,
                });
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        emit_run_finished(&run.run_id, duration_ms, run.completed_count(), run.success());
        if let Some(failure) = &run.failure {
            info!(run_id = %run.run_id, %failure, "pipeline stopped");
        }
        Ok(run)
    }
}

/// `run_pipeline(slug, seed, config)` over the process-wide registry with
/// default options.
pub async fn run_pipeline(
    slug: &str,
    seed: u64,
    config: &InventionConfig,
) -> Result<PipelineRunResult, PipelineError> {
    PipelineRunner::new(PipelineOptions::default())
        .run(slug, seed, config)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RunSpec {
        RunSpec::new("parachute", 0, &InventionConfig::new()).unwrap()
    }

    #[test]
    fn test_skip_remaining_fills_stage_table() {
        let mut run = PipelineRunResult::new(&spec());
        run.record(Stage::Plan, StageStatus::Completed, 3);
        run.record(Stage::Simulate, StageStatus::Failed, 5);
        run.skip_remaining();

        let statuses: Vec<StageStatus> = run.stages.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Completed,
                StageStatus::Failed,
                StageStatus::Skipped,
                StageStatus::Skipped,
            ]
        );
        assert_eq!(run.completed_count(), 1);
        assert_eq!(run.skipped_count(), 2);
        assert_eq!(run.duration_ms(), 8);
    }

    #[test]
    fn test_manifest_omits_durations() {
        let mut run = PipelineRunResult::new(&spec());
        run.record(Stage::Plan, StageStatus::Completed, 1234);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["stages"][0]["stage"], "plan");
        assert!(json["stages"][0].get("duration_ms").is_none());
        assert!(json.get("plan").is_none());
    }

    #[test]
    fn test_failure_display() {
        let failure = StageFailure {
            stage: Stage::Build,
            error: StageError::geometry("helix turns overlap"),
        };
        assert_eq!(
            failure.to_string(),
            "stage build failed: geometry error: helix turns overlap"
        );
    }
}
