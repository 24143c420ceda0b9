//! Shared safety evaluator.
//!
//! Turns an FMEA worksheet plus the simulated safety factor into a
//! [`SafetyVerdict`]. The ladder, first match wins:
//!
//! 1. safety factor below `reject_below_safety_factor` -> `rejected`
//! 2. safety factor below `min_safety_factor` -> `concept_reconstruction`
//! 3. any failed acceptance check -> `in_progress`
//! 4. residual RPN above `max_residual_rpn`, or an unmitigated hazard of
//!    critical severity or worse -> `prototype_ready`
//! 5. otherwise -> `validated`
//!
//! `min_safety_factor` is never taken below [`MIN_SAFETY_FACTOR`], whatever
//! criteria the caller passes.
//!
//! A structural-margin hazard derived from the safety factor is always added.
//! Hazards are reported as given and never downgraded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{StageError, StageResult};
use crate::safety::fmea::{Detection, HazardFinding, Likelihood, Severity};

/// Hard floor for any verdict above `concept_reconstruction`.
pub const MIN_SAFETY_FACTOR: f64 = 2.0;

/// Thresholds applied by [`evaluate_safety`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyCriteria {
    pub min_safety_factor: f64,
    pub reject_below_safety_factor: f64,
    pub max_residual_rpn: u32,
}

impl Default for SafetyCriteria {
    fn default() -> Self {
        Self {
            min_safety_factor: MIN_SAFETY_FACTOR,
            reject_below_safety_factor: 1.0,
            max_residual_rpn: 36,
        }
    }
}

/// Verdict classes, ordered from worst to best.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Rejected,
    ConceptReconstruction,
    InProgress,
    PrototypeReady,
    Validated,
}

impl VerdictKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::ConceptReconstruction => "concept_reconstruction",
            Self::InProgress => "in_progress",
            Self::PrototypeReady => "prototype_ready",
            Self::Validated => "validated",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pass/fail performance requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptanceCheck {
    pub name: String,
    pub measured: f64,
    pub limit: f64,
    pub unit: String,
    /// `true` when `measured` must not exceed `limit`.
    pub upper_bound: bool,
    pub passed: bool,
}

impl AcceptanceCheck {
    /// Passes when `measured <= limit`.
    pub fn at_most(name: impl Into<String>, measured: f64, limit: f64, unit: &str) -> Self {
        Self {
            name: name.into(),
            measured,
            limit,
            unit: unit.to_string(),
            upper_bound: true,
            passed: measured <= limit,
        }
    }

    /// Passes when `measured >= limit`.
    pub fn at_least(name: impl Into<String>, measured: f64, limit: f64, unit: &str) -> Self {
        Self {
            name: name.into(),
            measured,
            limit,
            unit: unit.to_string(),
            upper_bound: false,
            passed: measured >= limit,
        }
    }

    pub fn describe(&self) -> String {
        let op = if self.upper_bound { "<=" } else { ">=" };
        format!(
            "{}: {:.3} {} (required {op} {:.3} {})",
            self.name, self.measured, self.unit, self.limit, self.unit
        )
    }
}

/// Hazards and acceptance checks assembled by an invention's `evaluate()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FmeaWorksheet {
    pub hazards: Vec<HazardFinding>,
    pub acceptance: Vec<AcceptanceCheck>,
}

impl FmeaWorksheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hazard(mut self, hazard: HazardFinding) -> Self {
        self.hazards.push(hazard);
        self
    }

    pub fn check(mut self, check: AcceptanceCheck) -> Self {
        self.acceptance.push(check);
        self
    }
}

/// Result of `evaluate()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyVerdict {
    kind: VerdictKind,
    safety_factor: f64,
    hazards: Vec<HazardFinding>,
    acceptance: Vec<AcceptanceCheck>,
    rationale: Vec<String>,
}

impl SafetyVerdict {
    pub fn kind(&self) -> VerdictKind {
        self.kind
    }

    pub fn safety_factor(&self) -> f64 {
        self.safety_factor
    }

    pub fn hazards(&self) -> &[HazardFinding] {
        &self.hazards
    }

    pub fn acceptance(&self) -> &[AcceptanceCheck] {
        &self.acceptance
    }

    pub fn rationale(&self) -> &[String] {
        &self.rationale
    }

    pub fn max_residual_rpn(&self) -> u32 {
        self.hazards.iter().map(|h| h.residual_rpn).max().unwrap_or(0)
    }
}

/// Id of the hazard added for structural margin.
pub const STRUCTURAL_HAZARD_ID: &str = "STRUCT-MARGIN";

fn structural_hazard(safety_factor: f64) -> HazardFinding {
    let likelihood = Likelihood::from_safety_factor(safety_factor);
    let hazard = HazardFinding::new(
        STRUCTURAL_HAZARD_ID,
        "primary member overstressed under service load",
        "structural collapse of the airframe",
        Severity::Critical,
        likelihood,
        Detection::Moderate,
        format!("safety_factor = {safety_factor:.3}"),
    );
    hazard.mitigated(
        "proof-load every primary member before use",
        likelihood.reduced(),
    )
}

/// Apply the verdict ladder.
pub fn evaluate_safety(
    worksheet: FmeaWorksheet,
    safety_factor: f64,
    criteria: &SafetyCriteria,
) -> StageResult<SafetyVerdict> {
    if !safety_factor.is_finite() {
        return Err(StageError::MissingMetric {
            name: "safety_factor".to_string(),
        });
    }

    let FmeaWorksheet {
        mut hazards,
        acceptance,
    } = worksheet;
    hazards.push(structural_hazard(safety_factor));
    let min_safety_factor = criteria.min_safety_factor.max(MIN_SAFETY_FACTOR);

    let mut rationale = Vec::new();
    let failed: Vec<&AcceptanceCheck> = acceptance.iter().filter(|c| !c.passed).collect();
    let over_limit: Vec<&HazardFinding> = hazards
        .iter()
        .filter(|h| h.residual_rpn > criteria.max_residual_rpn)
        .collect();
    let unmitigated_severe: Vec<&HazardFinding> = hazards
        .iter()
        .filter(|h| !h.is_mitigated() && h.severity >= Severity::Critical)
        .collect();

    let kind = if safety_factor < criteria.reject_below_safety_factor {
        rationale.push(format!(
            "safety factor {safety_factor:.2} is below {:.2}: the structure fails under service load",
            criteria.reject_below_safety_factor
        ));
        VerdictKind::Rejected
    } else if safety_factor < min_safety_factor {
        rationale.push(format!(
            "safety factor {safety_factor:.2} is below the required minimum {min_safety_factor:.2}"
        ));
        VerdictKind::ConceptReconstruction
    } else if !failed.is_empty() {
        for check in &failed {
            rationale.push(format!("acceptance check failed: {}", check.describe()));
        }
        VerdictKind::InProgress
    } else if !over_limit.is_empty() || !unmitigated_severe.is_empty() {
        for hazard in &over_limit {
            rationale.push(format!(
                "hazard {} residual RPN {} exceeds {}",
                hazard.id, hazard.residual_rpn, criteria.max_residual_rpn
            ));
        }
        for hazard in &unmitigated_severe {
            rationale.push(format!(
                "hazard {} is {} and has no mitigation",
                hazard.id,
                hazard.severity.name()
            ));
        }
        VerdictKind::PrototypeReady
    } else {
        rationale.push(format!(
            "safety factor {safety_factor:.2} meets the minimum {min_safety_factor:.2}, all {} acceptance checks pass and every residual RPN is at most {}",
            acceptance.len(),
            criteria.max_residual_rpn
        ));
        VerdictKind::Validated
    };

    tracing::debug!(
        verdict = kind.name(),
        safety_factor,
        hazards = hazards.len(),
        "safety verdict"
    );

    Ok(SafetyVerdict {
        kind,
        safety_factor,
        hazards,
        acceptance,
        rationale,
    })
}
