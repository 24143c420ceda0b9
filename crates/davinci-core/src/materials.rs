//! Catalog of period-appropriate materials.
//!
//! Strength values are characteristic (mean) values for clear, dry material.
//! `strength_cov` is the coefficient of variation used by the tolerance study.

use serde::{Deserialize, Serialize};

/// Broad material family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Timber,
    Fabric,
    Cordage,
    Metal,
}

/// Mechanical properties of one material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    /// Bulk density (kg/m^3).
    pub density_kg_m3: f64,
    /// Bending / tensile strength (MPa).
    pub strength_mpa: f64,
    /// Shear strength (MPa).
    pub shear_strength_mpa: f64,
    /// Mass per unit area for fabrics (kg/m^2); zero otherwise.
    pub areal_density_kg_m2: f64,
    /// Coefficient of variation of strength.
    pub strength_cov: f64,
}

const CATALOG: &[(&str, MaterialKind, f64, f64, f64, f64, f64)] = &[
    // name, kind, density, strength, shear, areal, cov
    ("oak", MaterialKind::Timber, 700.0, 90.0, 7.0, 0.0, 0.18),
    ("ash", MaterialKind::Timber, 670.0, 100.0, 8.0, 0.0, 0.18),
    ("pine", MaterialKind::Timber, 450.0, 65.0, 6.0, 0.0, 0.20),
    ("bamboo", MaterialKind::Timber, 600.0, 120.0, 10.0, 0.0, 0.22),
    ("linen", MaterialKind::Fabric, 1500.0, 40.0, 0.0, 0.25, 0.15),
    ("silk", MaterialKind::Fabric, 1300.0, 50.0, 0.0, 0.12, 0.12),
    ("hemp_cord", MaterialKind::Cordage, 1480.0, 60.0, 0.0, 0.0, 0.15),
    ("wrought_iron", MaterialKind::Metal, 7700.0, 200.0, 150.0, 0.0, 0.08),
    ("bronze", MaterialKind::Metal, 8800.0, 150.0, 110.0, 0.0, 0.08),
];

impl Material {
    /// Look up a catalog material by name.
    pub fn lookup(name: &str) -> Option<Material> {
        CATALOG
            .iter()
            .find(|entry| entry.0 == name)
            .map(|&(name, kind, density, strength, shear, areal, cov)| Material {
                name: name.to_string(),
                kind,
                density_kg_m3: density,
                strength_mpa: strength,
                shear_strength_mpa: shear,
                areal_density_kg_m2: areal,
                strength_cov: cov,
            })
    }

    /// Names of every catalog material, in catalog order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        CATALOG.iter().map(|entry| entry.0)
    }

    /// Mass of a straight square-section member.
    pub fn member_mass(&self, length_m: f64, side_m: f64) -> f64 {
        length_m * side_m * side_m * self.density_kg_m3
    }

    /// Mass of a fabric panel.
    pub fn panel_mass(&self, area_m2: f64) -> f64 {
        area_m2 * self.areal_density_kg_m2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_material() {
        let oak = Material::lookup("oak").unwrap();
        assert_eq!(oak.kind, MaterialKind::Timber);
        assert_eq!(oak.density_kg_m3, 700.0);
    }

    #[test]
    fn test_lookup_unknown_material() {
        assert!(Material::lookup("carbon_fibre").is_none());
    }

    #[test]
    fn test_every_name_resolves() {
        for name in Material::names() {
            assert!(Material::lookup(name).is_some(), "{name} should resolve");
        }
    }

    #[test]
    fn test_panel_mass_uses_areal_density() {
        let linen = Material::lookup("linen").unwrap();
        assert!((linen.panel_mass(4.0) - 1.0).abs() < 1e-12);
    }
}
