//! The four-stage invention contract.

use crate::domain::config::InventionConfig;
use crate::domain::descriptor::InventionDescriptor;
use crate::domain::error::StageResult;
use crate::domain::plan::PlanResult;
use crate::domain::simulation::SimulationResult;
use crate::geometry::CadModel;
use crate::safety::SafetyVerdict;
use crate::sim::SimContext;

/// Capability set every invention module provides.
///
/// Stages are called in order `plan -> simulate -> build -> evaluate`.
/// `plan`, `build` and `evaluate` are pure. `simulate` is deterministic in
/// `(plan, ctx.seed())`: all randomness comes from `ctx`, and long loops call
/// `ctx.checkpoint()` so a timed-out stage can be stopped.
pub trait Invention: Send + Sync {
    fn descriptor(&self) -> InventionDescriptor;

    /// Resolve the config into SI dimensions, materials and options.
    ///
    /// Out-of-range or unknown parameters fail with `InvalidConfig`.
    fn plan(&self, config: &InventionConfig) -> StageResult<PlanResult>;

    fn simulate(&self, plan: &PlanResult, ctx: &mut SimContext) -> StageResult<SimulationResult>;

    /// Produce geometry. Degenerate geometry fails with `Geometry`.
    fn build(&self, plan: &PlanResult, simulation: &SimulationResult) -> StageResult<CadModel>;

    fn evaluate(&self, simulation: &SimulationResult) -> StageResult<SafetyVerdict>;
}
