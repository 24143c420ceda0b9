//! Failure-mode analysis and safety verdicts.

pub mod evaluator;
pub mod fmea;
pub mod report;

pub use evaluator::{
    evaluate_safety, AcceptanceCheck, FmeaWorksheet, SafetyCriteria, SafetyVerdict, VerdictKind,
    MIN_SAFETY_FACTOR, STRUCTURAL_HAZARD_ID,
};
pub use fmea::{rpn, Detection, HazardFinding, Likelihood, Mitigation, Severity};
pub use report::render_risk_summary;
