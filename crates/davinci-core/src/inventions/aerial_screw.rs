//! Aerial screw (Manuscript B, f. 83v).
//!
//! A helical linen sail on an ash frame, turned about an oak mast by a crew
//! walking a capstan. The model:
//!
//! - Blade element at 70% radius with `CL = 1.2 sin(2a)`, where the angle of
//!   attack is the pitch less the inflow angle `atan(vi / u)`.
//! - Momentum theory for the induced velocity `vi = sqrt(T / (2 rho A_disk))`.
//! - The two are coupled, so thrust is found by damped fixed-point iteration.
//! - Power is induced power (with a 1.15 loss factor) plus profile power.
//! - Spokes carry the thrust in bending; the mast carries the drive torque.

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use crate::domain::config::{InventionConfig, ParamReader};
use crate::domain::descriptor::InventionDescriptor;
use crate::domain::error::StageResult;
use crate::domain::plan::PlanResult;
use crate::domain::simulation::{DataSeries, SimulationResult};
use crate::geometry::{beam, helicoid, CadModel, Mesh};
use crate::invention::Invention;
use crate::inventions::{bending_safety_factor, sweep, torsion_safety_factor};
use crate::safety::{
    evaluate_safety, AcceptanceCheck, Detection, FmeaWorksheet, HazardFinding, Likelihood,
    SafetyCriteria, SafetyVerdict, Severity,
};
use crate::sim::solver::{solve_fixed_point, FixedPointSettings};
use crate::sim::tolerance::{strength_study, MemberCheck};
use crate::sim::SimContext;
use crate::units::{RenaissanceUnit, UnitConversion, AIR_DENSITY, GRAVITY};

pub const SLUG: &str = "aerial_screw";

const EFFECTIVE_RADIUS_FRACTION: f64 = 0.7;
const SAIL_AREA_FRACTION: f64 = 0.7;
const LIFT_COEFFICIENT_PEAK: f64 = 1.2;
const INDUCED_POWER_FACTOR: f64 = 1.15;
const PROFILE_DRAG_COEFFICIENT: f64 = 0.012;
const SPOKE_COUNT: usize = 4;
const FRAME_SECTION_M: f64 = 0.03;
const MAST_DIAMETER_M: f64 = 0.1;
/// Vertical room needed between successive sail turns for rim and lacing.
const TURN_CLEARANCE_M: f64 = 0.25;
const MAST_FOOT_M: f64 = 1.0;

pub fn descriptor() -> InventionDescriptor {
    InventionDescriptor::new(
        SLUG,
        "Aerial Screw",
        "Manuscript B, f. 83v",
        "c. 1489",
        "Helical linen rotor driven by a capstan crew, an early study of rotary-wing lift.",
    )
}

pub fn factory() -> Arc<dyn Invention> {
    Arc::new(AerialScrew)
}

pub struct AerialScrew;

/// Rotor operating point.
#[derive(Debug, Clone, Copy)]
struct Rotor {
    radius: f64,
    pitch_rad: f64,
    omega: f64,
}

/// Converged aerodynamic state.
#[derive(Debug, Clone, Copy)]
struct OperatingPoint {
    thrust: f64,
    induced_velocity: f64,
    power: f64,
    iterations: u64,
}

impl Rotor {
    fn sail_area(&self) -> f64 {
        SAIL_AREA_FRACTION * PI * self.radius * self.radius
    }

    fn disk_area(&self) -> f64 {
        PI * self.radius * self.radius
    }

    fn blade_speed(&self) -> f64 {
        self.omega * EFFECTIVE_RADIUS_FRACTION * self.radius
    }

    fn dynamic_pressure(&self) -> f64 {
        let u = self.blade_speed();
        0.5 * AIR_DENSITY * u * u
    }

    fn lift_coefficient(alpha: f64) -> f64 {
        LIFT_COEFFICIENT_PEAK * (2.0 * alpha).sin()
    }

    fn induced_velocity(&self, thrust: f64) -> f64 {
        (thrust.max(0.0) / (2.0 * AIR_DENSITY * self.disk_area())).sqrt()
    }

    fn thrust_at(&self, induced_velocity: f64) -> f64 {
        let inflow = induced_velocity.atan2(self.blade_speed());
        self.dynamic_pressure() * self.sail_area() * Self::lift_coefficient(self.pitch_rad - inflow)
    }

    fn solve(&self, ctx: &SimContext) -> StageResult<OperatingPoint> {
        let initial = self.dynamic_pressure() * self.sail_area() * Self::lift_coefficient(self.pitch_rad);
        let solution = solve_fixed_point(
            "aerial_screw.momentum",
            initial,
            FixedPointSettings::default(),
            ctx,
            |thrust| self.thrust_at(self.induced_velocity(thrust)),
        )?;
        let thrust = solution.value;
        let induced_velocity = self.induced_velocity(thrust);
        let u = self.blade_speed();
        let power = INDUCED_POWER_FACTOR * thrust * induced_velocity
            + 0.5 * AIR_DENSITY * u.powi(3) * self.sail_area() * PROFILE_DRAG_COEFFICIENT;
        Ok(OperatingPoint {
            thrust,
            induced_velocity,
            power,
            iterations: solution.iterations,
        })
    }
}

fn rpm_to_omega(rpm: f64) -> f64 {
    rpm * TAU / 60.0
}

fn rotor_from_plan(plan: &PlanResult) -> StageResult<Rotor> {
    Ok(Rotor {
        radius: plan.dimension("diameter_m")? / 2.0,
        pitch_rad: plan.dimension("pitch_rad")?,
        omega: rpm_to_omega(plan.dimension("rpm")?),
    })
}

/// Masses of sail, rim and spokes (kg).
fn rotor_masses(plan: &PlanResult, radius: f64) -> StageResult<(f64, f64, f64)> {
    let sail = plan
        .material("sail")?
        .panel_mass(SAIL_AREA_FRACTION * PI * radius * radius);
    let rim = plan
        .material("rim")?
        .member_mass(TAU * radius, FRAME_SECTION_M);
    let spokes = SPOKE_COUNT as f64 * plan.material("spokes")?.member_mass(radius, FRAME_SECTION_M);
    Ok((sail, rim, spokes))
}

impl Invention for AerialScrew {
    fn descriptor(&self) -> InventionDescriptor {
        descriptor()
    }

    fn plan(&self, config: &InventionConfig) -> StageResult<PlanResult> {
        let mut params = ParamReader::new(config);
        let diameter = params.number("diameter_braccia", 8.0, 2.0, 20.0)?;
        let pitch_deg = params.number("pitch_deg", 30.0, 5.0, 60.0)?;
        let rpm = params.number("rpm", 40.0, 5.0, 120.0)?;
        let crew = params.count("crew", 4, 1, 8)?;
        let crew_power = params.number("crew_power_w", 120.0, 50.0, 300.0)?;
        let turns = params.number("turns", 1.0, 0.5, 3.0)?;
        let materials = params.materials(&[
            ("sail", "linen"),
            ("rim", "ash"),
            ("spokes", "ash"),
            ("mast", "oak"),
        ])?;
        params.finish()?;

        let conversion =
            UnitConversion::new("rotor diameter", diameter, RenaissanceUnit::Braccio);
        let radius = conversion.si_value / 2.0;
        let pitch_rad = pitch_deg.to_radians();

        Ok(PlanResult::new(SLUG, config.fidelity)
            .with_conversion("diameter_m", conversion)
            .with_dimension("pitch_rad", pitch_rad)
            .with_dimension("rpm", rpm)
            .with_dimension("crew", crew as f64)
            .with_dimension("crew_power_w", crew_power)
            .with_dimension("turns", turns)
            .with_dimension("rise_per_turn_m", TAU * radius * pitch_rad.tan())
            .with_materials(materials)
            .with_note("blade element at 70% radius coupled to momentum theory")
            .with_note("sail modelled as 70% of the swept disk"))
    }

    fn simulate(&self, plan: &PlanResult, ctx: &mut SimContext) -> StageResult<SimulationResult> {
        let rotor = rotor_from_plan(plan)?;
        let point = rotor.solve(ctx)?;
        tracing::debug!(
            thrust = point.thrust,
            iterations = point.iterations,
            "aerial screw operating point"
        );

        let crew_power = plan.dimension("crew")? * plan.dimension("crew_power_w")?;
        let (sail_mass, rim_mass, spoke_mass) = rotor_masses(plan, rotor.radius)?;
        let rotor_mass = sail_mass + rim_mass + spoke_mass;
        let lift_to_weight = point.thrust / (rotor_mass * GRAVITY);

        // Each spoke carries its share of thrust at the effective radius.
        let spoke_moment =
            point.thrust / SPOKE_COUNT as f64 * EFFECTIVE_RADIUS_FRACTION * rotor.radius;
        let spokes = plan.material("spokes")?;
        let spoke_sf = bending_safety_factor(spoke_moment, FRAME_SECTION_M, spokes.strength_mpa);
        let mast = plan.material("mast")?;
        let torque = point.power / rotor.omega;
        let mast_sf = torsion_safety_factor(torque, MAST_DIAMETER_M, mast.shear_strength_mpa);

        let members = [
            MemberCheck::new("spokes", spoke_sf, spokes.strength_cov),
            MemberCheck::new("mast", mast_sf, mast.strength_cov),
        ];
        let samples = plan.fidelity.pick(500, 5000);
        let study = strength_study(ctx, &members, samples, 0.05)?;

        let fidelity = plan.fidelity;
        let mut lift_vs_rpm = DataSeries::new("lift_vs_rpm", &["rpm", "lift_n", "power_w"]);
        for rpm in sweep(10.0, 80.0, fidelity.pick(10.0, 2.0)) {
            let p = Rotor {
                omega: rpm_to_omega(rpm),
                ..rotor
            }
            .solve(ctx)?;
            lift_vs_rpm.push_row(vec![rpm, p.thrust, p.power])?;
        }
        let mut lift_vs_pitch =
            DataSeries::new("lift_vs_pitch", &["pitch_deg", "lift_n", "power_w"]);
        for pitch_deg in sweep(10.0, 60.0, fidelity.pick(5.0, 1.0)) {
            let p = Rotor {
                pitch_rad: pitch_deg.to_radians(),
                ..rotor
            }
            .solve(ctx)?;
            lift_vs_pitch.push_row(vec![pitch_deg, p.thrust, p.power])?;
        }

        SimulationResult::builder(plan, ctx.seed())?
            .metric("lift_newtons", point.thrust)
            .metric("induced_velocity_m_s", point.induced_velocity)
            .metric("blade_speed_m_s", rotor.blade_speed())
            .metric("power_required_w", point.power)
            .metric("crew_power_w", crew_power)
            .metric("rotor_mass_kg", rotor_mass)
            .metric("lift_to_weight", lift_to_weight)
            .metric("spoke_safety_factor", spoke_sf)
            .metric("mast_safety_factor", mast_sf)
            .metric("mc_mean_safety_factor", study.mean_safety_factor)
            .metric("mc_failure_fraction", study.failure_fraction)
            .metric("solver_iterations", point.iterations as f64)
            .series(lift_vs_rpm)
            .series(lift_vs_pitch)
            .safety_factor(study.safety_factor)
            .finish()
    }

    fn build(&self, plan: &PlanResult, _simulation: &SimulationResult) -> StageResult<CadModel> {
        let radius = plan.dimension("diameter_m")? / 2.0;
        let turns = plan.dimension("turns")?;
        let rise = plan.dimension("rise_per_turn_m")?;
        let height = rise * turns;
        let segments = plan.fidelity.pick(36, 144);
        let (sail_mass, rim_mass, spoke_mass) = rotor_masses(plan, radius)?;

        let mut model = CadModel::new();

        let sail = helicoid(
            "sail",
            MAST_DIAMETER_M / 2.0,
            radius,
            rise,
            turns,
            TURN_CLEARANCE_M,
            segments,
        )?;
        model.add_part(
            sail,
            &plan.material("sail")?.name,
            BTreeMap::from([
                ("radius_m".to_string(), radius),
                ("rise_per_turn_m".to_string(), rise),
                ("turns".to_string(), turns),
            ]),
            sail_mass,
        )?;

        // Rim follows the outer edge of the sail.
        let steps = ((turns * segments as f64).ceil() as usize).max(1);
        let rim_point = |step: usize| {
            let fraction = turns * step as f64 / steps as f64;
            let theta = TAU * fraction;
            [radius * theta.cos(), radius * theta.sin(), rise * fraction]
        };
        let mut rim = Mesh::new("rim");
        for step in 0..steps {
            rim.extend(beam("rim", rim_point(step), rim_point(step + 1), FRAME_SECTION_M)?);
        }
        model.add_part(
            rim,
            &plan.material("rim")?.name,
            BTreeMap::from([("section_m".to_string(), FRAME_SECTION_M)]),
            rim_mass,
        )?;

        let mut spokes = Mesh::new("spokes");
        for k in 0..SPOKE_COUNT {
            let fraction = turns * k as f64 / SPOKE_COUNT as f64;
            let theta = TAU * fraction;
            let z = rise * fraction;
            spokes.extend(beam(
                "spokes",
                [0.0, 0.0, z],
                [radius * theta.cos(), radius * theta.sin(), z],
                FRAME_SECTION_M,
            )?);
        }
        model.add_part(
            spokes,
            &plan.material("spokes")?.name,
            BTreeMap::from([
                ("length_m".to_string(), radius),
                ("section_m".to_string(), FRAME_SECTION_M),
            ]),
            spoke_mass,
        )?;

        let mast_length = height + MAST_FOOT_M + 0.5;
        let mast_material = plan.material("mast")?;
        let mast = beam(
            "mast",
            [0.0, 0.0, -MAST_FOOT_M],
            [0.0, 0.0, height + 0.5],
            MAST_DIAMETER_M,
        )?;
        model.add_part(
            mast,
            &mast_material.name,
            BTreeMap::from([
                ("length_m".to_string(), mast_length),
                ("diameter_m".to_string(), MAST_DIAMETER_M),
            ]),
            PI * (MAST_DIAMETER_M / 2.0).powi(2) * mast_length * mast_material.density_kg_m3,
        )?;

        Ok(model)
    }

    fn evaluate(&self, simulation: &SimulationResult) -> StageResult<SafetyVerdict> {
        let power = simulation.require_metric("power_required_w")?;
        let crew_power = simulation.require_metric("crew_power_w")?;
        let lift_to_weight = simulation.require_metric("lift_to_weight")?;

        let power_ratio = power / crew_power;
        let exhaustion_likelihood = if power_ratio > 1.0 {
            Likelihood::Frequent
        } else if power_ratio > 0.9 {
            Likelihood::Probable
        } else {
            Likelihood::Occasional
        };

        let worksheet = FmeaWorksheet::new()
            .hazard(
                HazardFinding::new(
                    "ASC-01",
                    "sail tears away from the rim lacing",
                    "sudden loss of lift and hard landing",
                    Severity::Critical,
                    Likelihood::Occasional,
                    Detection::Moderate,
                    "lift_newtons",
                )
                .mitigated(
                    "double-stitched linen laced with hemp, inspected before each ascent",
                    Likelihood::Unlikely,
                ),
            )
            .hazard(
                HazardFinding::new(
                    "ASC-02",
                    "crew cannot sustain the required power",
                    "rotor slows and the machine settles",
                    Severity::Moderate,
                    exhaustion_likelihood,
                    Detection::High,
                    "power_required_w",
                )
                .mitigated("relay crews on the capstan", exhaustion_likelihood.reduced()),
            )
            .hazard(HazardFinding::new(
                "ASC-03",
                "reaction torque turns the platform",
                "platform spins against the rotor",
                Severity::Moderate,
                Likelihood::Frequent,
                Detection::AlmostCertain,
                "power_required_w",
            ))
            .check(AcceptanceCheck::at_least(
                "lift_to_weight",
                lift_to_weight,
                1.0,
                "ratio",
            ))
            .check(AcceptanceCheck::at_most(
                "power_required",
                power,
                crew_power,
                "W",
            ));

        evaluate_safety(
            worksheet,
            simulation.safety_factor(),
            &SafetyCriteria::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Fidelity;
    use crate::domain::error::StageError;
    use crate::safety::VerdictKind;

    fn run(config: &InventionConfig, seed: u64) -> (PlanResult, SimulationResult) {
        let plan = AerialScrew.plan(config).unwrap();
        let mut ctx = SimContext::new(seed, plan.fidelity);
        let sim = AerialScrew.simulate(&plan, &mut ctx).unwrap();
        (plan, sim)
    }

    #[test]
    fn test_baseline_lift() {
        let (_, sim) = run(&InventionConfig::new(), 42);
        let lift = sim.metric("lift_newtons").unwrap();
        assert!((lift - 181.909).abs() < 1.0, "lift {lift}");
        let power = sim.metric("power_required_w").unwrap();
        assert!((power - 463.9).abs() < 1.0, "power {power}");
        assert!(sim.metric("lift_to_weight").unwrap() > 1.0);
    }

    #[test]
    fn test_lift_grows_with_rpm() {
        let (_, sim) = run(&InventionConfig::new(), 0);
        let lift = sim.series_named("lift_vs_rpm").unwrap().column("lift_n").unwrap();
        assert_eq!(lift.len(), 8);
        assert!(lift.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_research_fidelity_refines_sweeps() {
        let config = InventionConfig::new().with_fidelity(Fidelity::Research);
        let (_, sim) = run(&config, 0);
        assert_eq!(sim.series_named("lift_vs_pitch").unwrap().rows().len(), 51);
    }

    #[test]
    fn test_shallow_pitch_diverges() {
        let config = InventionConfig::new().with_param("pitch_deg", 5.0);
        let plan = AerialScrew.plan(&config).unwrap();
        let mut ctx = SimContext::new(42, plan.fidelity);
        let err = AerialScrew.simulate(&plan, &mut ctx).unwrap_err();
        match err {
            StageError::SimulationDivergence {
                solver, iterations, ..
            } => {
                assert_eq!(solver, "aerial_screw.momentum");
                assert_eq!(iterations, 200);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_pitch() {
        let config = InventionConfig::new().with_param("pitch_deg", 80.0);
        assert!(matches!(
            AerialScrew.plan(&config),
            Err(StageError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_default_verdict_validated() {
        let (_, sim) = run(&InventionConfig::new(), 42);
        let verdict = AerialScrew.evaluate(&sim).unwrap();
        assert_eq!(verdict.kind(), VerdictKind::Validated, "{:?}", verdict.rationale());
        assert!(verdict.safety_factor() > 3.0 && verdict.safety_factor() < 5.5);
    }

    #[test]
    fn test_build_parts() {
        let (plan, sim) = run(&InventionConfig::new(), 42);
        let model = AerialScrew.build(&plan, &sim).unwrap();
        let names: Vec<&str> = model.parts.iter().map(|p| p.part.name.as_str()).collect();
        assert_eq!(names, vec!["sail", "rim", "spokes", "mast"]);
        let mass: f64 = model.parts[..3].iter().map(|p| p.part.mass_kg).sum();
        assert!((mass - sim.metric("rotor_mass_kg").unwrap()).abs() < 1e-9);
    }
}
