//! Reproducibility checks: the same `(plan, seed)` must give the same payload.

use davinci_core::harness::{run_plan, run_simulate};
use davinci_core::obs::RunSpan;
use davinci_core::{InventionConfig, Registry, SimContext, StageResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::PipelineError;
use crate::spec::RunSpec;

/// Outcome of running PLAN + SIMULATE twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReproducibilityReport {
    pub slug: String,
    pub seed: u64,
    pub plan_digest: String,
    pub first_payload_digest: String,
    pub second_payload_digest: String,
}

impl ReproducibilityReport {
    pub fn reproducible(&self) -> bool {
        self.first_payload_digest == self.second_payload_digest
    }
}

/// Plan and simulate `slug` twice in memory and compare payload digests.
///
/// Stage errors are returned as-is; a divergent plan fails the same way both
/// times, which says nothing about reproducibility.
pub fn verify_reproducible(
    registry: &Registry,
    slug: &str,
    seed: u64,
    config: &InventionConfig,
) -> Result<StageResult<ReproducibilityReport>, PipelineError> {
    let invention = registry.resolve(slug)?;
    let spec = RunSpec::new(slug, seed, config).map_err(PipelineError::Identity)?;
    let _span = RunSpan::enter(&spec.run_id, slug, seed);

    let attempt = || -> StageResult<(String, String)> {
        let plan = run_plan(invention.as_ref(), config)?;
        let mut ctx = SimContext::new(seed, plan.fidelity);
        let simulation = run_simulate(invention.as_ref(), &plan, &mut ctx, None)?;
        Ok((plan.digest()?, simulation.payload_digest().to_string()))
    };

    let report = attempt().and_then(|(plan_digest, first)| {
        let (_, second) = attempt()?;
        Ok(ReproducibilityReport {
            slug: slug.to_string(),
            seed,
            plan_digest,
            first_payload_digest: first,
            second_payload_digest: second,
        })
    });

    match &report {
        Ok(r) if r.reproducible() => info!(
            event = "reproducibility.passed",
            payload_digest = %r.first_payload_digest,
        ),
        Ok(r) => warn!(
            event = "reproducibility.failed",
            first = %r.first_payload_digest,
            second = %r.second_payload_digest,
        ),
        Err(e) => warn!(event = "reproducibility.error", error = %e),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_inventions_are_reproducible() {
        let registry = Registry::builtin();
        for slug in ["aerial_screw", "parachute", "ornithopter"] {
            let report = verify_reproducible(&registry, slug, 42, &InventionConfig::new())
                .unwrap()
                .unwrap();
            assert!(report.reproducible(), "{slug}");
            assert_eq!(report.plan_digest.len(), 64);
        }
    }

    #[test]
    fn test_unknown_slug() {
        let registry = Registry::builtin();
        let err = verify_reproducible(&registry, "nonexistent_slug", 0, &InventionConfig::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_stage_error_is_reported() {
        let registry = Registry::builtin();
        let config = InventionConfig::new().with_param("pitch_deg", 5.0);
        let outcome = verify_reproducible(&registry, "aerial_screw", 0, &config).unwrap();
        assert_eq!(outcome.unwrap_err().kind(), "simulation_divergence");
    }
}
