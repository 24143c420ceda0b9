//! Pipeline stage definitions and run options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use davinci_core::ArtifactStore;
use serde::{Deserialize, Serialize};

/// Default wall-clock budget for a single stage.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// The four stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Simulate,
    Build,
    Evaluate,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Plan, Stage::Simulate, Stage::Build, Stage::Evaluate];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Simulate => "simulate",
            Stage::Build => "build",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| format!("unknown stage '{s}' (expected plan, simulate, build or evaluate)"))
    }
}

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    Skipped,
}

/// Options controlling a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Wall-clock budget per stage.
    pub stage_timeout: Duration,

    /// Last stage to execute; later stages are skipped.
    pub stop_after: Option<Stage>,

    /// When false BUILD is skipped and the run produces no CAD.
    pub with_cad: bool,

    /// Whether stage artifacts and the run manifest are written.
    pub persist: bool,

    pub artifacts: ArtifactStore,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            stop_after: None,
            with_cad: true,
            persist: true,
            artifacts: ArtifactStore::default(),
        }
    }
}

impl PipelineOptions {
    /// Options that keep everything in memory.
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = artifacts;
        self.persist = true;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_stop_after(mut self, stage: Stage) -> Self {
        self.stop_after = Some(stage);
        self
    }

    pub fn without_cad(mut self) -> Self {
        self.with_cad = false;
        self
    }

    /// Artifact store to write through, if persistence is on.
    pub fn store(&self) -> Option<&ArtifactStore> {
        self.persist.then_some(&self.artifacts)
    }

    /// Whether `stage` is beyond `stop_after`.
    pub fn stops_before(&self, stage: Stage) -> bool {
        self.stop_after.is_some_and(|last| stage > last)
    }
}
