//! Monte-Carlo tolerance study on member strength.
//!
//! Each sample scales every member's strength by `1 + cov * z` with an
//! independent standard normal `z` and records the weakest member's safety
//! factor. The reported factor is a low percentile of that distribution.

use serde::{Deserialize, Serialize};

use crate::domain::error::{StageError, StageResult};
use crate::sim::SimContext;

/// A structural member with a nominal safety factor.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberCheck {
    pub name: String,
    pub nominal_safety_factor: f64,
    /// Strength coefficient of variation of the member's material.
    pub strength_cov: f64,
}

impl MemberCheck {
    pub fn new(name: impl Into<String>, nominal_safety_factor: f64, strength_cov: f64) -> Self {
        Self {
            name: name.into(),
            nominal_safety_factor,
            strength_cov,
        }
    }
}

/// Summary of a tolerance study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToleranceStudy {
    pub samples: usize,
    pub percentile: f64,
    /// Safety factor at `percentile`.
    pub safety_factor: f64,
    pub mean_safety_factor: f64,
    /// Fraction of samples with a safety factor below 1.
    pub failure_fraction: f64,
    /// Member that was weakest most often.
    pub governing_member: String,
}

/// Percentile of `values` (linear interpolation between order statistics).
/// Sorts `values` in place. Returns NaN for an empty slice.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let rank = p.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    values[lo] + (values[hi] - values[lo]) * weight
}

/// Run the study over `members` with `samples` draws from `ctx`.
pub fn strength_study(
    ctx: &mut SimContext,
    members: &[MemberCheck],
    samples: usize,
    p: f64,
) -> StageResult<ToleranceStudy> {
    if members.is_empty() || samples == 0 {
        return Err(StageError::internal(
            "tolerance study needs at least one member and one sample".to_string(),
        ));
    }

    let mut factors = Vec::with_capacity(samples);
    let mut governing = vec![0usize; members.len()];
    for i in 0..samples {
        if i % 256 == 0 {
            ctx.checkpoint()?;
        }
        let mut weakest = f64::INFINITY;
        let mut weakest_idx = 0;
        for (idx, member) in members.iter().enumerate() {
            let strength_factor = (1.0 + member.strength_cov * ctx.standard_normal()).max(0.0);
            let sf = member.nominal_safety_factor * strength_factor;
            if sf < weakest {
                weakest = sf;
                weakest_idx = idx;
            }
        }
        governing[weakest_idx] += 1;
        factors.push(weakest);
    }

    let mean = factors.iter().sum::<f64>() / samples as f64;
    let failures = factors.iter().filter(|sf| **sf < 1.0).count();
    let governing_idx = governing
        .iter()
        .enumerate()
        .max_by_key(|(idx, count)| (**count, std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    Ok(ToleranceStudy {
        samples,
        percentile: p,
        safety_factor: percentile(&mut factors, p),
        mean_safety_factor: mean,
        failure_fraction: failures as f64 / samples as f64,
        governing_member: members[governing_idx].name.clone(),
    })
}
