//! Stage wrappers around an [`Invention`].
//!
//! Each wrapper calls the module, checks the output belongs to the run and,
//! when an [`ArtifactStore`] is given, persists the stage's artifacts under
//! run-scoped paths. Inventions never write files themselves.
//!
//! The cancel token is checked again before anything is persisted: a stage
//! whose supervisor has already given up on it must not leave files behind.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::artifacts::ArtifactStore;
use crate::domain::cad::CadArtifact;
use crate::domain::config::{Fidelity, InventionConfig};
use crate::domain::error::{StageError, StageResult};
use crate::domain::plan::PlanResult;
use crate::domain::simulation::SimulationResult;
use crate::geometry::stl::to_ascii_stl;
use crate::invention::Invention;
use crate::safety::{render_risk_summary, SafetyVerdict, VerdictKind, MIN_SAFETY_FACTOR};
use crate::sim::{CancelToken, SimContext};

/// Contents of `sim/metrics_seed<seed>.json`.
#[derive(Debug, Serialize)]
struct MetricsDocument<'a> {
    slug: &'a str,
    seed: u64,
    fidelity: Fidelity,
    plan_digest: &'a str,
    payload_digest: &'a str,
    safety_factor: f64,
    metrics: &'a BTreeMap<String, f64>,
    series: Vec<&'a str>,
}

pub fn run_plan(invention: &dyn Invention, config: &InventionConfig) -> StageResult<PlanResult> {
    let plan = invention.plan(config)?;
    let slug = invention.descriptor().slug;
    if plan.slug != slug {
        return Err(StageError::internal(format!(
            "plan for '{slug}' was labelled '{}'",
            plan.slug
        )));
    }
    Ok(plan)
}

/// Simulate and write CSV series plus the metrics document.
pub fn run_simulate(
    invention: &dyn Invention,
    plan: &PlanResult,
    ctx: &mut SimContext,
    store: Option<&ArtifactStore>,
) -> StageResult<SimulationResult> {
    let seed = ctx.seed();
    let result = invention.simulate(plan, ctx)?;
    if result.seed() != seed || result.slug() != plan.slug {
        return Err(StageError::internal(format!(
            "simulation result ({}, seed {}) does not belong to run ({}, seed {seed})",
            result.slug(),
            result.seed(),
            plan.slug
        )));
    }
    if result.plan_digest() != plan.digest()? {
        return Err(StageError::internal(
            "simulation result was built from a different plan".to_string(),
        ));
    }

    if let Some(store) = store {
        for series in result.series() {
            ctx.checkpoint()?;
            let path = store.series_path(result.slug(), &series.name, seed);
            store.write_text(&path, &series.to_csv())?;
        }
        ctx.checkpoint()?;
        let doc = MetricsDocument {
            slug: result.slug(),
            seed,
            fidelity: result.fidelity(),
            plan_digest: result.plan_digest(),
            payload_digest: result.payload_digest(),
            safety_factor: result.safety_factor(),
            metrics: result.metrics(),
            series: result.series().iter().map(|s| s.name.as_str()).collect(),
        };
        store.write_json(&store.metrics_path(result.slug(), seed), &doc)?;
    }
    Ok(result)
}

/// Build geometry and export one STL per part.
pub fn run_build(
    invention: &dyn Invention,
    plan: &PlanResult,
    simulation: &SimulationResult,
    cancel: &CancelToken,
    store: Option<&ArtifactStore>,
) -> StageResult<CadArtifact> {
    let model = invention.build(plan, simulation)?;
    if model.parts.is_empty() {
        return Err(StageError::geometry(format!(
            "{} produced no parts",
            plan.slug
        )));
    }
    let bounding_box = model.bounds();
    if !bounding_box.is_valid() {
        return Err(StageError::geometry("model bounding box is not finite"));
    }

    let seed = simulation.seed();
    let mut exported_files = Vec::new();
    if let Some(store) = store {
        for part in &model.parts {
            cancel.checkpoint()?;
            let path = store.stl_path(&plan.slug, &part.part.name, seed);
            exported_files.push(store.write_text(&path, &to_ascii_stl(&part.mesh))?);
        }
    }

    Ok(CadArtifact {
        slug: plan.slug.clone(),
        seed,
        parts: model.parts.into_iter().map(|p| p.part).collect(),
        bounding_box,
        exported_files,
    })
}

/// Evaluate and write the markdown risk summary.
///
/// The verdict must be computed from the simulation's own safety factor, and
/// nothing below [`MIN_SAFETY_FACTOR`] may rank above
/// `concept_reconstruction`.
pub fn run_evaluate(
    invention: &dyn Invention,
    simulation: &SimulationResult,
    cancel: &CancelToken,
    store: Option<&ArtifactStore>,
) -> StageResult<SafetyVerdict> {
    let verdict = invention.evaluate(simulation)?;
    let safety_factor = simulation.safety_factor();
    if verdict.safety_factor() != safety_factor {
        return Err(StageError::internal(format!(
            "verdict used safety factor {} but the simulation reports {safety_factor}",
            verdict.safety_factor()
        )));
    }
    if safety_factor < MIN_SAFETY_FACTOR && verdict.kind() > VerdictKind::ConceptReconstruction {
        return Err(StageError::internal(format!(
            "verdict {} is not allowed at safety factor {safety_factor:.3}",
            verdict.kind()
        )));
    }

    if let Some(store) = store {
        cancel.checkpoint()?;
        let descriptor = invention.descriptor();
        let path = store.risk_summary_path(&descriptor.slug, simulation.seed());
        store.write_text(
            &path,
            &render_risk_summary(&descriptor, simulation.seed(), &verdict),
        )?;
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_tripped_token_blocks_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let invention = Registry::builtin().resolve("parachute").unwrap();
        let plan = run_plan(invention.as_ref(), &InventionConfig::new()).unwrap();
        let mut ctx = SimContext::new(1, plan.fidelity);
        let simulation = run_simulate(invention.as_ref(), &plan, &mut ctx, None).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_build(invention.as_ref(), &plan, &simulation, &cancel, Some(&store))
            .unwrap_err();
        assert_eq!(err, StageError::Cancelled);
        let err = run_evaluate(invention.as_ref(), &simulation, &cancel, Some(&store)).unwrap_err();
        assert_eq!(err, StageError::Cancelled);

        assert!(!store.stl_path("parachute", "canopy", 1).exists());
        assert!(!store.risk_summary_path("parachute", 1).exists());
    }

    #[test]
    fn test_in_memory_stages_ignore_token() {
        let invention = Registry::builtin().resolve("parachute").unwrap();
        let plan = run_plan(invention.as_ref(), &InventionConfig::new()).unwrap();
        let mut ctx = SimContext::new(1, plan.fidelity);
        let simulation = run_simulate(invention.as_ref(), &plan, &mut ctx, None).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let verdict = run_evaluate(invention.as_ref(), &simulation, &cancel, None).unwrap();
        assert_eq!(verdict.safety_factor(), simulation.safety_factor());
    }
}
