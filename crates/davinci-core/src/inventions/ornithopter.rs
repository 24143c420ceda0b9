//! Ornithopter (Codex on the Flight of Birds, Paris Manuscript B).
//!
//! A prone pilot drives two linen-covered wings through a crank and pulleys.
//! The flapping cycle is modelled quasi-steadily: each spanwise strip sees the
//! forward airspeed plus its own plunge velocity, with a linear lift curve
//! clipped at stall. Mean lift is compared with the all-up weight, mean
//! aerodynamic power with what a pilot can sustain, and the spar roots are
//! checked in bending at the peak of the stroke.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use crate::domain::config::{InventionConfig, ParamReader};
use crate::domain::descriptor::InventionDescriptor;
use crate::domain::error::StageResult;
use crate::domain::plan::PlanResult;
use crate::domain::simulation::{DataSeries, SimulationResult};
use crate::geometry::{beam, CadModel, Mesh};
use crate::invention::Invention;
use crate::inventions::bending_safety_factor;
use crate::safety::{
    evaluate_safety, AcceptanceCheck, Detection, FmeaWorksheet, HazardFinding, Likelihood,
    SafetyCriteria, SafetyVerdict, Severity,
};
use crate::sim::tolerance::{strength_study, MemberCheck};
use crate::sim::SimContext;
use crate::units::{RenaissanceUnit, UnitConversion, AIR_DENSITY, GRAVITY};

pub const SLUG: &str = "ornithopter";

const BASE_INCIDENCE_DEG: f64 = 6.0;
const LIFT_CURVE_SLOPE: f64 = TAU;
const STALL_LIFT_COEFFICIENT: f64 = 1.2;
const PROFILE_DRAG_COEFFICIENT: f64 = 0.03;
const SPARS_PER_WING: usize = 2;
const GUST_LOAD_FACTOR: f64 = 1.25;
/// Half-width of the pilot cradle; wings hinge here.
const CRADLE_HALF_WIDTH_M: f64 = 0.5;
const CRADLE_LENGTH_M: f64 = 3.0;
const CRADLE_SECTION_M: f64 = 0.08;

pub fn descriptor() -> InventionDescriptor {
    InventionDescriptor::new(
        SLUG,
        "Ornithopter",
        "Manuscript B, f. 74r",
        "c. 1488",
        "Human-powered flapping-wing machine flown prone, wings driven by arms and legs.",
    )
}

pub fn factory() -> Arc<dyn Invention> {
    Arc::new(Ornithopter)
}

pub struct Ornithopter;

#[derive(Debug, Clone, Copy)]
struct Wing {
    half_span: f64,
    chord: f64,
    frequency_hz: f64,
    amplitude_rad: f64,
    airspeed: f64,
}

/// Forces on both wings at one instant of the stroke.
#[derive(Debug, Clone, Copy)]
struct Instant {
    flap_angle: f64,
    lift: f64,
    power: f64,
    /// Root bending moment of one wing.
    root_moment: f64,
}

impl Wing {
    fn from_plan(plan: &PlanResult) -> StageResult<Self> {
        Ok(Self {
            half_span: plan.dimension("wingspan_m")? / 2.0,
            chord: plan.dimension("chord_m")?,
            frequency_hz: plan.dimension("flap_hz")?,
            amplitude_rad: plan.dimension("amplitude_rad")?,
            airspeed: plan.dimension("airspeed_m_s")?,
        })
    }

    fn area(&self) -> f64 {
        2.0 * self.half_span * self.chord
    }

    fn at_phase(&self, phase: f64, strips: usize) -> Instant {
        let omega = TAU * self.frequency_hz;
        let flap_angle = self.amplitude_rad * phase.sin();
        let flap_rate = self.amplitude_rad * omega * phase.cos();
        let dr = self.half_span / strips as f64;
        let incidence = BASE_INCIDENCE_DEG.to_radians();

        let (mut lift, mut power, mut moment) = (0.0, 0.0, 0.0);
        for j in 0..strips {
            let r = (j as f64 + 0.5) * dr;
            let plunge = r * flap_rate;
            let alpha = incidence + plunge.atan2(self.airspeed);
            let cl = (LIFT_CURVE_SLOPE * alpha).clamp(-STALL_LIFT_COEFFICIENT, STALL_LIFT_COEFFICIENT);
            let q = 0.5 * AIR_DENSITY * (self.airspeed * self.airspeed + plunge * plunge);
            let force = q * self.chord * dr * cl;
            lift += force * flap_angle.cos();
            power += force * plunge;
            moment += force * r;
        }
        Instant {
            flap_angle,
            lift: 2.0 * lift,
            power: 2.0 * power.abs(),
            root_moment: moment.abs(),
        }
    }
}

fn structure_masses(plan: &PlanResult) -> StageResult<(f64, f64)> {
    let half_span = plan.dimension("wingspan_m")? / 2.0;
    let spars = 2.0
        * SPARS_PER_WING as f64
        * plan
            .material("spars")?
            .member_mass(half_span, plan.dimension("spar_side_m")?);
    let membrane = plan
        .material("membrane")?
        .panel_mass(2.0 * half_span * plan.dimension("chord_m")?);
    Ok((spars, membrane))
}

impl Invention for Ornithopter {
    fn descriptor(&self) -> InventionDescriptor {
        descriptor()
    }

    fn plan(&self, config: &InventionConfig) -> StageResult<PlanResult> {
        let mut params = ParamReader::new(config);
        let wingspan = params.number("wingspan_braccia", 20.0, 8.0, 40.0)?;
        let chord = params.number("chord_braccia", 3.0, 1.0, 6.0)?;
        let flap_hz = params.number("flap_hz", 0.5, 0.1, 2.0)?;
        let amplitude_deg = params.number("amplitude_deg", 40.0, 5.0, 60.0)?;
        let airspeed = params.number("airspeed_m_s", 8.0, 2.0, 20.0)?;
        let pilot_kg = params.number("pilot_kg", 70.0, 40.0, 120.0)?;
        let pilot_power = params.number("pilot_power_w", 250.0, 50.0, 1000.0)?;
        let mechanism_kg = params.number("mechanism_kg", 25.0, 0.0, 100.0)?;
        let spar_cm = params.number("spar_cm", 6.0, 2.0, 15.0)?;
        let materials = params.materials(&[("spars", "ash"), ("membrane", "linen")])?;
        params.finish()?;

        Ok(PlanResult::new(SLUG, config.fidelity)
            .with_conversion(
                "wingspan_m",
                UnitConversion::new("wingspan", wingspan, RenaissanceUnit::Braccio),
            )
            .with_conversion(
                "chord_m",
                UnitConversion::new("wing chord", chord, RenaissanceUnit::Braccio),
            )
            .with_dimension("flap_hz", flap_hz)
            .with_dimension("amplitude_rad", amplitude_deg.to_radians())
            .with_dimension("airspeed_m_s", airspeed)
            .with_dimension("pilot_kg", pilot_kg)
            .with_dimension("pilot_power_w", pilot_power)
            .with_dimension("mechanism_kg", mechanism_kg)
            .with_dimension("spar_side_m", spar_cm / 100.0)
            .with_materials(materials)
            .with_note("quasi-steady strip theory over one flapping cycle")
            .with_note("rigid wings, no twist or feathering"))
    }

    fn simulate(&self, plan: &PlanResult, ctx: &mut SimContext) -> StageResult<SimulationResult> {
        let wing = Wing::from_plan(plan)?;
        let steps = plan.fidelity.pick(48, 360);
        let strips = plan.fidelity.pick(10, 40);

        let mut cycle = DataSeries::new(
            "flap_cycle",
            &["phase_deg", "flap_angle_deg", "lift_n", "power_w"],
        );
        let (mut lift_sum, mut power_sum, mut peak_moment) = (0.0, 0.0, 0.0_f64);
        for k in 0..steps {
            ctx.checkpoint()?;
            let phase = TAU * k as f64 / steps as f64;
            let instant = wing.at_phase(phase, strips);
            lift_sum += instant.lift;
            power_sum += instant.power;
            peak_moment = peak_moment.max(instant.root_moment);
            cycle.push_row(vec![
                phase.to_degrees(),
                instant.flap_angle.to_degrees(),
                instant.lift,
                instant.power,
            ])?;
        }
        let mean_lift = lift_sum / steps as f64;
        let profile_power =
            0.5 * AIR_DENSITY * wing.airspeed.powi(3) * wing.area() * PROFILE_DRAG_COEFFICIENT;
        let power_required = power_sum / steps as f64 + profile_power;

        let (spar_mass, membrane_mass) = structure_masses(plan)?;
        let total_mass = plan.dimension("pilot_kg")?
            + plan.dimension("mechanism_kg")?
            + spar_mass
            + membrane_mass;
        let lift_ratio = mean_lift / (total_mass * GRAVITY);

        let spars = plan.material("spars")?;
        let spar_moment = peak_moment / SPARS_PER_WING as f64 * GUST_LOAD_FACTOR;
        let spar_sf =
            bending_safety_factor(spar_moment, plan.dimension("spar_side_m")?, spars.strength_mpa);
        let members = [MemberCheck::new("spars", spar_sf, spars.strength_cov)];
        let study = strength_study(ctx, &members, plan.fidelity.pick(500, 5000), 0.05)?;

        SimulationResult::builder(plan, ctx.seed())?
            .metric("mean_lift_n", mean_lift)
            .metric("total_mass_kg", total_mass)
            .metric("lift_ratio", lift_ratio)
            .metric("power_required_w", power_required)
            .metric("pilot_power_w", plan.dimension("pilot_power_w")?)
            .metric("peak_root_moment_nm", peak_moment)
            .metric("spar_safety_factor", spar_sf)
            .metric("mc_mean_safety_factor", study.mean_safety_factor)
            .metric("mc_failure_fraction", study.failure_fraction)
            .series(cycle)
            .safety_factor(study.safety_factor)
            .finish()
    }

    fn build(&self, plan: &PlanResult, _simulation: &SimulationResult) -> StageResult<CadModel> {
        let half_span = plan.dimension("wingspan_m")? / 2.0;
        let chord = plan.dimension("chord_m")?;
        let spar_side = plan.dimension("spar_side_m")?;
        let strips = plan.fidelity.pick(10, 40);
        let (spar_mass, membrane_mass) = structure_masses(plan)?;
        let membrane = &plan.material("membrane")?.name;

        let mut model = CadModel::new();
        for (name, side) in [("wing_left", -1.0), ("wing_right", 1.0)] {
            let mut mesh = Mesh::new(name);
            let dy = half_span / strips as f64;
            for j in 0..strips {
                let y0 = side * (CRADLE_HALF_WIDTH_M + j as f64 * dy);
                let y1 = side * (CRADLE_HALF_WIDTH_M + (j + 1) as f64 * dy);
                mesh.push_quad([0.0, y0, 0.0], [chord, y0, 0.0], [chord, y1, 0.0], [0.0, y1, 0.0]);
            }
            model.add_part(
                mesh,
                membrane,
                BTreeMap::from([
                    ("half_span_m".to_string(), half_span),
                    ("chord_m".to_string(), chord),
                ]),
                membrane_mass / 2.0,
            )?;
        }

        let mut spars = Mesh::new("spars");
        for side in [-1.0, 1.0] {
            for x in [0.25 * chord, 0.6 * chord] {
                spars.extend(beam(
                    "spars",
                    [x, side * CRADLE_HALF_WIDTH_M, 0.0],
                    [x, side * (CRADLE_HALF_WIDTH_M + half_span), 0.0],
                    spar_side,
                )?);
            }
        }
        model.add_part(
            spars,
            &plan.material("spars")?.name,
            BTreeMap::from([
                ("length_m".to_string(), half_span),
                ("section_m".to_string(), spar_side),
            ]),
            spar_mass,
        )?;

        let mut cradle = Mesh::new("cradle");
        let keel_start = [0.5 * chord - CRADLE_LENGTH_M / 2.0, 0.0, -0.3];
        let keel_end = [0.5 * chord + CRADLE_LENGTH_M / 2.0, 0.0, -0.3];
        cradle.extend(beam("cradle", keel_start, keel_end, CRADLE_SECTION_M)?);
        cradle.extend(beam(
            "cradle",
            [0.5 * chord, -CRADLE_HALF_WIDTH_M, 0.0],
            [0.5 * chord, CRADLE_HALF_WIDTH_M, 0.0],
            CRADLE_SECTION_M,
        )?);
        model.add_part(
            cradle,
            &plan.material("spars")?.name,
            BTreeMap::from([("length_m".to_string(), CRADLE_LENGTH_M)]),
            plan.dimension("mechanism_kg")?,
        )?;

        Ok(model)
    }

    fn evaluate(&self, simulation: &SimulationResult) -> StageResult<SafetyVerdict> {
        let lift_ratio = simulation.require_metric("lift_ratio")?;
        let power = simulation.require_metric("power_required_w")?;
        let pilot_power = simulation.require_metric("pilot_power_w")?;
        let spar_sf = simulation.require_metric("spar_safety_factor")?;

        let exhaustion = if power > pilot_power {
            Likelihood::Frequent
        } else {
            Likelihood::Occasional
        };
        let spar_likelihood = Likelihood::from_safety_factor(spar_sf);

        let worksheet = FmeaWorksheet::new()
            .hazard(HazardFinding::new(
                "ORN-01",
                "pilot cannot sustain the flapping power",
                "stall and uncontrolled descent",
                Severity::Critical,
                exhaustion,
                Detection::High,
                "power_required_w",
            ))
            .hazard(
                HazardFinding::new(
                    "ORN-02",
                    "wing spar fractures at the root",
                    "wing folds in flight",
                    Severity::Catastrophic,
                    spar_likelihood,
                    Detection::Low,
                    "spar_safety_factor",
                )
                .mitigated("proof-load spars before flight", spar_likelihood.reduced()),
            )
            .hazard(HazardFinding::new(
                "ORN-03",
                "loss of lateral control at low speed",
                "wing drop and spin",
                Severity::Critical,
                Likelihood::Probable,
                Detection::Moderate,
                "lift_ratio",
            ))
            .check(AcceptanceCheck::at_least("lift_ratio", lift_ratio, 1.0, "ratio"))
            .check(AcceptanceCheck::at_most(
                "power_required",
                power,
                pilot_power,
                "W",
            ));

        evaluate_safety(
            worksheet,
            simulation.safety_factor(),
            &SafetyCriteria::default(),
        )
    }
}
