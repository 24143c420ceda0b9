//! Markdown risk summary.

use crate::domain::descriptor::InventionDescriptor;
use crate::safety::evaluator::SafetyVerdict;

/// Render the risk summary published under `safety/risk_summary_seed<seed>.md`.
pub fn render_risk_summary(
    descriptor: &InventionDescriptor,
    seed: u64,
    verdict: &SafetyVerdict,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Risk Summary: {}\n\n", descriptor.display_name));
    out.push_str(&format!(
        "- slug: `{}`\n- seed: {}\n- provenance: {}\n- verdict: **{}**\n- safety factor: {:.2}\n- max residual RPN: {}\n\n",
        descriptor.slug,
        seed,
        descriptor.provenance,
        verdict.kind(),
        verdict.safety_factor(),
        verdict.max_residual_rpn(),
    ));

    out.push_str("## Rationale\n");
    for line in verdict.rationale() {
        out.push_str(&format!("- {}\n", line));
    }
    out.push('\n');

    if !verdict.acceptance().is_empty() {
        out.push_str("## Acceptance Checks\n");
        out.push_str("| check | result | detail |\n|---|---|---|\n");
        for check in verdict.acceptance() {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                check.name,
                if check.passed { "pass" } else { "FAIL" },
                check.describe()
            ));
        }
        out.push('\n');
    }

    out.push_str("## FMEA\n");
    out.push_str("| id | failure mode | effect | S | L | D | RPN | mitigation | residual RPN |\n");
    out.push_str("|---|---|---|---|---|---|---|---|---|\n");
    for hazard in verdict.hazards() {
        let mitigation = hazard
            .mitigation
            .as_ref()
            .map(|m| m.description.as_str())
            .unwrap_or("none");
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            hazard.id,
            hazard.failure_mode,
            hazard.effect,
            hazard.severity.rank(),
            hazard.likelihood.rank(),
            hazard.detection.rank(),
            hazard.rpn,
            mitigation,
            hazard.residual_rpn
        ));
    }
    out
}
