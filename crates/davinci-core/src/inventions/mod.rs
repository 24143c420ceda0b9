//! Reference invention modules and the builtin registration table.

pub mod aerial_screw;
pub mod ornithopter;
pub mod parachute;

use crate::domain::descriptor::InventionDescriptor;
use crate::registry::InventionFactory;

/// Builtin `(descriptor, factory)` pairs in canonical listing order.
pub fn builtin_table() -> Vec<(InventionDescriptor, InventionFactory)> {
    vec![
        (
            aerial_screw::descriptor(),
            aerial_screw::factory as InventionFactory,
        ),
        (parachute::descriptor(), parachute::factory as InventionFactory),
        (
            ornithopter::descriptor(),
            ornithopter::factory as InventionFactory,
        ),
    ]
}

/// Safety factors are capped here so unloaded members stay finite.
pub(crate) const MAX_SAFETY_FACTOR: f64 = 1000.0;

/// Bending safety factor of a square section of side `side_m` under `moment_nm`.
pub(crate) fn bending_safety_factor(moment_nm: f64, side_m: f64, strength_mpa: f64) -> f64 {
    let section_modulus = side_m.powi(3) / 6.0;
    let stress_pa = moment_nm.abs() / section_modulus;
    if stress_pa == 0.0 {
        MAX_SAFETY_FACTOR
    } else {
        (strength_mpa * 1e6 / stress_pa).min(MAX_SAFETY_FACTOR)
    }
}

/// Torsional safety factor of a solid round shaft.
pub(crate) fn torsion_safety_factor(torque_nm: f64, diameter_m: f64, shear_mpa: f64) -> f64 {
    let stress_pa = 16.0 * torque_nm.abs() / (std::f64::consts::PI * diameter_m.powi(3));
    if stress_pa == 0.0 {
        MAX_SAFETY_FACTOR
    } else {
        (shear_mpa * 1e6 / stress_pa).min(MAX_SAFETY_FACTOR)
    }
}

/// Inclusive arithmetic range, robust to floating-point accumulation.
pub(crate) fn sweep(start: f64, end: f64, step: f64) -> Vec<f64> {
    let count = ((end - start) / step).round() as usize;
    (0..=count).map(|i| start + step * i as f64).collect()
}
