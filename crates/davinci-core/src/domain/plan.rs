//! Planning output: historical assumptions resolved into SI parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::config::Fidelity;
use crate::domain::digest::digest_of;
use crate::domain::error::{StageError, StageResult};
use crate::materials::Material;
use crate::units::UnitConversion;

/// Result of `plan()`: SI dimensions, options, materials and design notes.
///
/// Owned by the pipeline run that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanResult {
    pub slug: String,
    pub fidelity: Fidelity,
    /// Named SI quantities (metres, kilograms, radians, rpm, watts...).
    pub dimensions: BTreeMap<String, f64>,
    /// Named discrete choices (e.g. canopy geometry).
    pub options: BTreeMap<String, String>,
    /// Renaissance measures converted during planning.
    pub conversions: Vec<UnitConversion>,
    /// Material role -> material.
    pub materials: BTreeMap<String, Material>,
    /// Design intent notes, in the order they were recorded.
    pub notes: Vec<String>,
}

impl PlanResult {
    pub fn new(slug: impl Into<String>, fidelity: Fidelity) -> Self {
        Self {
            slug: slug.into(),
            fidelity,
            dimensions: BTreeMap::new(),
            options: BTreeMap::new(),
            conversions: Vec::new(),
            materials: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: f64) -> Self {
        self.dimensions.insert(name.into(), value);
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Record a conversion and store its SI value as a dimension.
    pub fn with_conversion(mut self, dimension: impl Into<String>, conversion: UnitConversion) -> Self {
        self.dimensions.insert(dimension.into(), conversion.si_value);
        self.conversions.push(conversion);
        self
    }

    pub fn with_materials(mut self, materials: BTreeMap<String, Material>) -> Self {
        self.materials.extend(materials);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn dimension(&self, name: &str) -> StageResult<f64> {
        self.dimensions.get(name).copied().ok_or_else(|| {
            StageError::internal(format!("plan for {} has no dimension '{name}'", self.slug))
        })
    }

    pub fn option(&self, name: &str) -> StageResult<&str> {
        self.options.get(name).map(String::as_str).ok_or_else(|| {
            StageError::internal(format!("plan for {} has no option '{name}'", self.slug))
        })
    }

    pub fn material(&self, role: &str) -> StageResult<&Material> {
        self.materials.get(role).ok_or_else(|| {
            StageError::internal(format!("plan for {} has no material role '{role}'", self.slug))
        })
    }

    /// Canonical digest of the whole plan.
    pub fn digest(&self) -> StageResult<String> {
        digest_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::RenaissanceUnit;

    #[test]
    fn test_conversion_becomes_dimension() {
        let plan = PlanResult::new("aerial_screw", Fidelity::Educational).with_conversion(
            "diameter_m",
            UnitConversion::new("rotor diameter", 8.0, RenaissanceUnit::Braccio),
        );
        assert!((plan.dimension("diameter_m").unwrap() - 4.6688).abs() < 1e-9);
        assert_eq!(plan.conversions.len(), 1);
    }

    #[test]
    fn test_missing_lookup_is_error() {
        let plan = PlanResult::new("parachute", Fidelity::Educational);
        assert!(plan.dimension("side_m").is_err());
        assert!(plan.option("geometry").is_err());
        assert!(plan.material("frame").is_err());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let make = || {
            PlanResult::new("parachute", Fidelity::Educational)
                .with_dimension("side_m", 7.0032)
                .with_option("geometry", "pyramid")
                .with_note("open-base pyramid")
        };
        assert_eq!(make().digest().unwrap(), make().digest().unwrap());
        assert_ne!(
            make().digest().unwrap(),
            make().with_dimension("side_m", 7.1).digest().unwrap()
        );
    }
}
