//! FMEA worksheet types.
//!
//! Severity, likelihood and detection are ranked 1 to 5. The risk priority
//! number is their product, so it ranges from 1 to 125.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

/// Consequence of a failure mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Negligible,
    Marginal,
    Moderate,
    Critical,
    Catastrophic,
}

impl Severity {
    pub fn rank(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Marginal => "marginal",
            Self::Moderate => "moderate",
            Self::Critical => "critical",
            Self::Catastrophic => "catastrophic",
        }
    }
}

/// How often a failure mode is expected to occur.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Remote,
    Unlikely,
    Occasional,
    Probable,
    Frequent,
}

impl Likelihood {
    pub fn rank(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Unlikely => "unlikely",
            Self::Occasional => "occasional",
            Self::Probable => "probable",
            Self::Frequent => "frequent",
        }
    }

    /// Likelihood of structural failure implied by a safety factor.
    pub fn from_safety_factor(safety_factor: f64) -> Self {
        if safety_factor >= 3.0 {
            Self::Remote
        } else if safety_factor >= 2.0 {
            Self::Unlikely
        } else if safety_factor >= 1.5 {
            Self::Occasional
        } else if safety_factor >= 1.0 {
            Self::Probable
        } else {
            Self::Frequent
        }
    }

    /// One step less likely, bottoming out at `Remote`.
    pub fn reduced(self) -> Self {
        match self {
            Self::Remote | Self::Unlikely => Self::Remote,
            Self::Occasional => Self::Unlikely,
            Self::Probable => Self::Occasional,
            Self::Frequent => Self::Probable,
        }
    }
}

/// How likely the failure is to be noticed before it causes harm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    AlmostCertain,
    High,
    Moderate,
    Low,
    Undetectable,
}

impl Detection {
    pub fn rank(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AlmostCertain => "almost_certain",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::Undetectable => "undetectable",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.rank())
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.rank())
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.rank())
    }
}

/// Risk priority number.
pub fn rpn(severity: Severity, likelihood: Likelihood, detection: Detection) -> u32 {
    severity.rank() * likelihood.rank() * detection.rank()
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// A mitigation and the likelihood that remains once it is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mitigation {
    pub description: String,
    pub residual_likelihood: Likelihood,
}

/// One row of the FMEA worksheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HazardFinding {
    pub id: String,
    pub failure_mode: String,
    pub effect: String,
    pub severity: Severity,
    pub likelihood: Likelihood,
    pub detection: Detection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<Mitigation>,
    pub residual_likelihood: Likelihood,
    pub rpn: u32,
    pub residual_rpn: u32,
    /// Metric or model the finding was derived from.
    pub source: String,
}

impl HazardFinding {
    pub fn new(
        id: impl Into<String>,
        failure_mode: impl Into<String>,
        effect: impl Into<String>,
        severity: Severity,
        likelihood: Likelihood,
        detection: Detection,
        source: impl Into<String>,
    ) -> Self {
        let score = rpn(severity, likelihood, detection);
        Self {
            id: id.into(),
            failure_mode: failure_mode.into(),
            effect: effect.into(),
            severity,
            likelihood,
            detection,
            mitigation: None,
            residual_likelihood: likelihood,
            rpn: score,
            residual_rpn: score,
            source: source.into(),
        }
    }

    /// Attach a mitigation. A mitigation never makes a hazard more likely.
    pub fn mitigated(mut self, description: impl Into<String>, residual: Likelihood) -> Self {
        let residual = residual.min(self.likelihood);
        self.mitigation = Some(Mitigation {
            description: description.into(),
            residual_likelihood: residual,
        });
        self.residual_likelihood = residual;
        self.residual_rpn = rpn(self.severity, residual, self.detection);
        self
    }

    pub fn is_mitigated(&self) -> bool {
        self.mitigation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks() {
        assert_eq!(Severity::Negligible.rank(), 1);
        assert_eq!(Severity::Catastrophic.rank(), 5);
        assert_eq!(Likelihood::Frequent.rank(), 5);
        assert_eq!(Detection::Moderate.rank(), 3);
        assert!(Severity::Critical > Severity::Moderate);
    }

    #[test]
    fn test_likelihood_from_safety_factor() {
        assert_eq!(Likelihood::from_safety_factor(4.2), Likelihood::Remote);
        assert_eq!(Likelihood::from_safety_factor(2.0), Likelihood::Unlikely);
        assert_eq!(Likelihood::from_safety_factor(1.8), Likelihood::Occasional);
        assert_eq!(Likelihood::from_safety_factor(1.0), Likelihood::Probable);
        assert_eq!(Likelihood::from_safety_factor(0.4), Likelihood::Frequent);
    }

    #[test]
    fn test_mitigation_reduces_residual_rpn() {
        let hazard = HazardFinding::new(
            "H1",
            "canopy tear",
            "uncontrolled descent",
            Severity::Critical,
            Likelihood::Occasional,
            Detection::Moderate,
            "terminal_velocity",
        );
        assert_eq!(hazard.rpn, 4 * 3 * 3);
        let hazard = hazard.mitigated("double-stitched seams", Likelihood::Remote);
        assert_eq!(hazard.residual_rpn, 4 * 3);
        assert_eq!(hazard.rpn, 36);
    }

    #[test]
    fn test_mitigation_cannot_raise_likelihood() {
        let hazard = HazardFinding::new(
            "H2",
            "x",
            "y",
            Severity::Marginal,
            Likelihood::Unlikely,
            Detection::High,
            "test",
        )
        .mitigated("noop", Likelihood::Frequent);
        assert_eq!(hazard.residual_likelihood, Likelihood::Unlikely);
        assert_eq!(hazard.residual_rpn, hazard.rpn);
    }
}
