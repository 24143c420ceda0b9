//! Property tests: the verdict ladder is monotone in the safety factor and
//! never passes a structure below the required minimum.

use davinci_core::safety::evaluate_safety;
use davinci_core::safety::fmea::{Detection, Likelihood, Severity};
use davinci_core::{AcceptanceCheck, FmeaWorksheet, HazardFinding, SafetyCriteria, VerdictKind};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Negligible),
        Just(Severity::Marginal),
        Just(Severity::Moderate),
        Just(Severity::Critical),
        Just(Severity::Catastrophic),
    ]
}

fn arb_likelihood() -> impl Strategy<Value = Likelihood> {
    prop_oneof![
        Just(Likelihood::Remote),
        Just(Likelihood::Unlikely),
        Just(Likelihood::Occasional),
        Just(Likelihood::Probable),
        Just(Likelihood::Frequent),
    ]
}

fn arb_detection() -> impl Strategy<Value = Detection> {
    prop_oneof![
        Just(Detection::AlmostCertain),
        Just(Detection::High),
        Just(Detection::Moderate),
        Just(Detection::Low),
        Just(Detection::Undetectable),
    ]
}

/// A hazard with an optional mitigation.
fn arb_hazard() -> impl Strategy<Value = HazardFinding> {
    (
        "[A-Z]{3}-0[1-9]",
        arb_severity(),
        arb_likelihood(),
        arb_detection(),
        prop::option::of(arb_likelihood()),
    )
        .prop_map(|(id, severity, likelihood, detection, residual)| {
            let hazard = HazardFinding::new(
                id,
                "generated failure mode",
                "generated effect",
                severity,
                likelihood,
                detection,
                "proptest",
            );
            match residual {
                Some(residual) => hazard.mitigated("generated mitigation", residual),
                None => hazard,
            }
        })
}

fn arb_check() -> impl Strategy<Value = AcceptanceCheck> {
    (0.0f64..20.0, 0.0f64..20.0, any::<bool>()).prop_map(|(measured, limit, upper)| {
        if upper {
            AcceptanceCheck::at_most("generated_upper", measured, limit, "m/s")
        } else {
            AcceptanceCheck::at_least("generated_lower", measured, limit, "W")
        }
    })
}

fn arb_worksheet() -> impl Strategy<Value = FmeaWorksheet> {
    (
        prop::collection::vec(arb_hazard(), 0..6),
        prop::collection::vec(arb_check(), 0..4),
    )
        .prop_map(|(hazards, checks)| {
            let sheet = hazards.into_iter().fold(FmeaWorksheet::new(), |s, h| s.hazard(h));
            checks.into_iter().fold(sheet, |s, c| s.check(c))
        })
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Raising the safety factor never worsens the verdict for the same worksheet.
    #[test]
    fn verdict_is_monotone_in_safety_factor(
        sheet in arb_worksheet(),
        low in 0.0f64..10.0,
        delta in 0.0f64..10.0,
    ) {
        let criteria = SafetyCriteria::default();
        let worse = evaluate_safety(sheet.clone(), low, &criteria).unwrap();
        let better = evaluate_safety(sheet, low + delta, &criteria).unwrap();
        prop_assert!(better.kind() >= worse.kind());
    }

    /// Below the minimum safety factor the verdict is at best a concept reconstruction.
    #[test]
    fn below_minimum_is_never_in_progress_or_better(
        sheet in arb_worksheet(),
        sf in 0.0f64..2.0,
    ) {
        let verdict = evaluate_safety(sheet, sf, &SafetyCriteria::default()).unwrap();
        prop_assert!(verdict.kind() <= VerdictKind::ConceptReconstruction);
        prop_assert!(!verdict.rationale().is_empty());
    }

    /// A structure that fails under service load is rejected.
    #[test]
    fn below_unity_is_rejected(sheet in arb_worksheet(), sf in 0.0f64..1.0) {
        let verdict = evaluate_safety(sheet, sf, &SafetyCriteria::default()).unwrap();
        prop_assert_eq!(verdict.kind(), VerdictKind::Rejected);
    }

    /// Residual risk never exceeds the unmitigated risk.
    #[test]
    fn mitigation_never_raises_rpn(hazard in arb_hazard()) {
        prop_assert!(hazard.residual_rpn <= hazard.rpn);
        prop_assert!(hazard.residual_likelihood <= hazard.likelihood);
    }
}

// ---- Boundary cases ----

#[test]
fn exactly_at_minimum_passes_the_margin_rung() {
    let verdict = evaluate_safety(FmeaWorksheet::new(), 2.0, &SafetyCriteria::default()).unwrap();
    assert_eq!(verdict.kind(), VerdictKind::Validated);
}

#[test]
fn just_below_minimum_is_concept_reconstruction() {
    let verdict =
        evaluate_safety(FmeaWorksheet::new(), 1.999, &SafetyCriteria::default()).unwrap();
    assert_eq!(verdict.kind(), VerdictKind::ConceptReconstruction);
}

#[test]
fn non_finite_safety_factor_is_an_error() {
    assert!(evaluate_safety(FmeaWorksheet::new(), f64::NAN, &SafetyCriteria::default()).is_err());
}

#[test]
fn failed_acceptance_caps_at_in_progress() {
    let sheet = FmeaWorksheet::new().check(AcceptanceCheck::at_most(
        "terminal_velocity",
        8.7,
        7.0,
        "m/s",
    ));
    let verdict = evaluate_safety(sheet, 6.0, &SafetyCriteria::default()).unwrap();
    assert_eq!(verdict.kind(), VerdictKind::InProgress);
}

#[test]
fn unmitigated_critical_hazard_caps_at_prototype_ready() {
    let sheet = FmeaWorksheet::new().hazard(HazardFinding::new(
        "TST-01",
        "strut buckles",
        "loss of frame",
        Severity::Critical,
        Likelihood::Remote,
        Detection::AlmostCertain,
        "test",
    ));
    let verdict = evaluate_safety(sheet, 5.0, &SafetyCriteria::default()).unwrap();
    assert_eq!(verdict.kind(), VerdictKind::PrototypeReady);
}
