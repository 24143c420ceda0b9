//! Parachute (Codex Atlanticus, f. 381v).
//!
//! "If a man have a tent made of linen of which the apertures have all been
//! stopped up, and it be twelve braccia across and twelve in depth, he will be
//! able to throw himself down from any great height without suffering any
//! injury."
//!
//! Pyramid, flat and conical canopies are supported. The simulation computes
//! the sea-level terminal velocity analytically, then integrates a descent
//! through an exponential atmosphere with seeded Ornstein-Uhlenbeck vertical
//! gusts. The frame is checked in bending under the opening load.

use std::collections::BTreeMap;
use std::f64::consts::{PI, SQRT_2};
use std::sync::Arc;

use crate::domain::config::{InventionConfig, ParamReader};
use crate::domain::descriptor::InventionDescriptor;
use crate::domain::error::{StageError, StageResult};
use crate::domain::plan::PlanResult;
use crate::domain::simulation::{DataSeries, SimulationResult};
use crate::geometry::{beam, fan, ring, CadModel, Mesh, Vec3};
use crate::invention::Invention;
use crate::inventions::bending_safety_factor;
use crate::safety::{
    evaluate_safety, AcceptanceCheck, Detection, FmeaWorksheet, HazardFinding, Likelihood,
    SafetyCriteria, SafetyVerdict, Severity,
};
use crate::sim::solver::{integrate, StepControl};
use crate::sim::tolerance::{strength_study, MemberCheck};
use crate::sim::SimContext;
use crate::units::{air_density_at, RenaissanceUnit, UnitConversion, AIR_DENSITY, GRAVITY};

pub const SLUG: &str = "parachute";

pub const GEOMETRIES: &[&str] = &["pyramid", "flat", "conical"];

/// Highest sea-level terminal velocity accepted for an unhurt landing.
pub const MAX_SAFE_DESCENT_M_S: f64 = 7.0;

/// Peak load on opening, as a multiple of the suspended weight.
const OPENING_LOAD_FACTOR: f64 = 1.3;
const RIGGING_KG_PER_M: f64 = 0.08;
const RIGGING_LINES: usize = 4;
const CORD_DIAMETER_M: f64 = 0.01;
/// Distance from canopy base down to the harness.
const HARNESS_DROP_M: f64 = 2.0;
/// Gust correlation time (s).
const GUST_TAU_S: f64 = 2.0;
/// Frames lower than this are flat, and a pyramid or cone cannot be flat.
const MIN_FRAME_HEIGHT_M: f64 = 0.1;
/// Descent samples written per simulated second.
const DESCENT_SAMPLE_INTERVAL_S: f64 = 1.0;

pub fn descriptor() -> InventionDescriptor {
    InventionDescriptor::new(
        SLUG,
        "Pyramid Parachute",
        "Codex Atlanticus, f. 381v",
        "c. 1485",
        "Linen canopy stretched over a rigid wooden pyramid frame.",
    )
}

pub fn factory() -> Arc<dyn Invention> {
    Arc::new(Parachute)
}

pub struct Parachute;

/// Shape-dependent aerodynamic and structural quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Canopy {
    drag_coefficient: f64,
    reference_area: f64,
    frame_length: f64,
    canopy_area: f64,
}

impl Canopy {
    fn new(geometry: &str, side: f64, height: f64) -> StageResult<Self> {
        match geometry {
            "pyramid" => Ok(Self {
                drag_coefficient: 1.2,
                reference_area: side * side,
                frame_length: 4.0 * side + 4.0 * (height * height + side * side / 2.0).sqrt(),
                canopy_area: 4.0 * 0.5 * side * (height * height + side * side / 4.0).sqrt(),
            }),
            "flat" => Ok(Self {
                drag_coefficient: 1.3,
                reference_area: side * side,
                frame_length: 4.0 * side + 2.0 * side * SQRT_2,
                canopy_area: side * side,
            }),
            "conical" => {
                let slant = (height * height + side * side / 4.0).sqrt();
                Ok(Self {
                    drag_coefficient: 0.9,
                    reference_area: PI * side * side / 4.0,
                    frame_length: 8.0 * slant + PI * side,
                    canopy_area: PI * (side / 2.0) * slant,
                })
            }
            other => Err(StageError::invalid_config(format!(
                "unknown canopy geometry '{other}'"
            ))),
        }
    }
}

/// Mass breakdown (kg).
#[derive(Debug, Clone, Copy)]
struct Masses {
    frame: f64,
    canopy: f64,
    rigging: f64,
    payload: f64,
}

impl Masses {
    fn total(&self) -> f64 {
        self.frame + self.canopy + self.rigging + self.payload
    }
}

fn masses(plan: &PlanResult, canopy: &Canopy) -> StageResult<Masses> {
    let height = plan.dimension("height_m")?;
    Ok(Masses {
        frame: plan
            .material("frame")?
            .member_mass(canopy.frame_length, plan.dimension("member_side_m")?),
        canopy: plan.material("canopy")?.panel_mass(canopy.canopy_area),
        rigging: RIGGING_KG_PER_M * RIGGING_LINES as f64 * height.max(1.0),
        payload: plan.dimension("payload_kg")?,
    })
}

fn canopy_from_plan(plan: &PlanResult) -> StageResult<Canopy> {
    Canopy::new(
        plan.option("geometry")?,
        plan.dimension("side_m")?,
        plan.dimension("height_m")?,
    )
}

impl Invention for Parachute {
    fn descriptor(&self) -> InventionDescriptor {
        descriptor()
    }

    fn plan(&self, config: &InventionConfig) -> StageResult<PlanResult> {
        let mut params = ParamReader::new(config);
        let geometry = params.choice("geometry", "pyramid", GEOMETRIES)?;
        let side = params.number("side_braccia", 12.0, 4.0, 24.0)?;
        let height = params.number("height_braccia", 12.0, 0.0, 24.0)?;
        let member_cm = params.number("member_cm", 4.0, 2.0, 10.0)?;
        let payload = params.number("payload_kg", 80.0, 40.0, 150.0)?;
        let drop = params.number("drop_height_braccia", 500.0, 50.0, 2000.0)?;
        let gust_sigma = params.number("gust_sigma_m_s", 0.5, 0.0, 3.0)?;
        let materials = params.materials(&[
            ("frame", "pine"),
            ("canopy", "linen"),
            ("rigging", "hemp_cord"),
        ])?;
        params.finish()?;

        let mut plan = PlanResult::new(SLUG, config.fidelity)
            .with_option("geometry", geometry.as_str())
            .with_conversion(
                "side_m",
                UnitConversion::new("canopy side", side, RenaissanceUnit::Braccio),
            )
            .with_conversion(
                "drop_height_m",
                UnitConversion::new("drop height", drop, RenaissanceUnit::Braccio),
            )
            .with_dimension("member_side_m", member_cm / 100.0)
            .with_dimension("payload_kg", payload)
            .with_dimension("gust_sigma_m_s", gust_sigma)
            .with_materials(materials);

        if geometry == "flat" {
            plan = plan
                .with_dimension("height_m", 0.0)
                .with_note("flat canopy: height parameter ignored");
        } else {
            plan = plan.with_conversion(
                "height_m",
                UnitConversion::new("canopy height", height, RenaissanceUnit::Braccio),
            );
        }

        Ok(plan.with_note("open-base canopy, apertures stopped up"))
    }

    fn simulate(&self, plan: &PlanResult, ctx: &mut SimContext) -> StageResult<SimulationResult> {
        let canopy = canopy_from_plan(plan)?;
        let mass = masses(plan, &canopy)?;
        let total_mass = mass.total();
        let drag_area = canopy.drag_coefficient * canopy.reference_area;
        let terminal_velocity = (2.0 * total_mass * GRAVITY / (AIR_DENSITY * drag_area)).sqrt();

        // Descent: state = [altitude, downward velocity, vertical gust].
        let drop = plan.dimension("drop_height_m")?;
        let gust_sigma = plan.dimension("gust_sigma_m_s")?;
        let dt = plan.fidelity.pick(0.05, 0.02);
        let sample_every = (DESCENT_SAMPLE_INTERVAL_S / dt).round() as u64;
        // Generous budget: a descent slower than 0.5 m/s on average is a failure.
        let max_steps = (drop / 0.5 / dt).ceil() as u64;
        let mut descent = DataSeries::new(
            "descent",
            &["t_s", "altitude_m", "velocity_m_s", "gust_m_s"],
        );
        descent.push_row(vec![0.0, drop, 0.0, 0.0])?;
        let mut max_velocity: f64 = 0.0;
        let mut state = [drop, 0.0, 0.0];
        let mut step_index: u64 = 0;
        let mut samples: Vec<Vec<f64>> = Vec::new();

        let steps = integrate(
            "parachute.descent",
            &mut state,
            dt,
            max_steps,
            ctx,
            |ctx, t, s| {
                let z = ctx.standard_normal();
                s[2] += -s[2] / GUST_TAU_S * dt + gust_sigma * (2.0 * dt / GUST_TAU_S).sqrt() * z;
                let relative = s[1] - s[2];
                let drag = 0.5 * air_density_at(s[0]) * drag_area * relative * relative.abs();
                s[1] += (GRAVITY - drag / total_mass) * dt;
                s[0] -= s[1] * dt;
                max_velocity = max_velocity.max(s[1]);
                step_index += 1;
                let landed = s[0] <= 0.0;
                if landed || step_index % sample_every == 0 {
                    samples.push(vec![t + dt, s[0].max(0.0), s[1], s[2]]);
                }
                if landed {
                    StepControl::Stop
                } else {
                    StepControl::Continue
                }
            },
        )?;
        for row in samples {
            descent.push_row(row)?;
        }
        let descent_time = steps as f64 * dt;
        let landing_velocity = state[1];

        let frame = plan.material("frame")?;
        let side = plan.dimension("side_m")?;
        let opening_load = total_mass * GRAVITY * OPENING_LOAD_FACTOR;
        let frame_moment = 0.25 * opening_load * side / 32.0;
        let frame_sf =
            bending_safety_factor(frame_moment, plan.dimension("member_side_m")?, frame.strength_mpa);

        let rigging = plan.material("rigging")?;
        let cord_area = PI * (CORD_DIAMETER_M / 2.0).powi(2);
        let line_tension = mass.payload * GRAVITY * OPENING_LOAD_FACTOR / RIGGING_LINES as f64;
        let rigging_sf = rigging.strength_mpa * 1e6 * cord_area / line_tension;

        let members = [
            MemberCheck::new("frame", frame_sf, frame.strength_cov),
            MemberCheck::new("rigging", rigging_sf, rigging.strength_cov),
        ];
        let study = strength_study(ctx, &members, plan.fidelity.pick(500, 5000), 0.05)?;

        SimulationResult::builder(plan, ctx.seed())?
            .metric("terminal_velocity_m_s", terminal_velocity)
            .metric("drag_coefficient", canopy.drag_coefficient)
            .metric("reference_area_m2", canopy.reference_area)
            .metric("total_mass_kg", total_mass)
            .metric("frame_mass_kg", mass.frame)
            .metric("canopy_mass_kg", mass.canopy)
            .metric("rigging_mass_kg", mass.rigging)
            .metric("descent_time_s", descent_time)
            .metric("landing_velocity_m_s", landing_velocity)
            .metric("max_descent_velocity_m_s", max_velocity)
            .metric("frame_safety_factor", frame_sf)
            .metric("rigging_safety_factor", rigging_sf)
            .metric("mc_mean_safety_factor", study.mean_safety_factor)
            .metric("mc_failure_fraction", study.failure_fraction)
            .metric("integration_steps", steps as f64)
            .series(descent)
            .safety_factor(study.safety_factor)
            .finish()
    }

    fn build(&self, plan: &PlanResult, _simulation: &SimulationResult) -> StageResult<CadModel> {
        let geometry = plan.option("geometry")?;
        let side = plan.dimension("side_m")?;
        let height = plan.dimension("height_m")?;
        let member = plan.dimension("member_side_m")?;
        let canopy = canopy_from_plan(plan)?;
        let mass = masses(plan, &canopy)?;

        if geometry != "flat" && height < MIN_FRAME_HEIGHT_M {
            return Err(StageError::geometry(format!(
                "collapsed {geometry} frame: height {height:.3} m is below {MIN_FRAME_HEIGHT_M} m"
            )));
        }

        let half = side / 2.0;
        let apex: Vec3 = [0.0, 0.0, height];
        let base: Vec<Vec3> = match geometry {
            "conical" => ring(half, 0.0, plan.fidelity.pick(24, 96)),
            _ => vec![
                [half, half, 0.0],
                [-half, half, 0.0],
                [-half, -half, 0.0],
                [half, -half, 0.0],
            ],
        };

        let mut model = CadModel::new();
        let canopy_mesh = if geometry == "flat" {
            fan("canopy", [0.0, 0.0, 0.0], &base)?
        } else {
            fan("canopy", apex, &base)?
        };
        model.add_part(
            canopy_mesh,
            &plan.material("canopy")?.name,
            BTreeMap::from([
                ("side_m".to_string(), side),
                ("height_m".to_string(), height),
                ("area_m2".to_string(), canopy.canopy_area),
            ]),
            mass.canopy,
        )?;

        let mut frame = Mesh::new("frame");
        for i in 0..base.len() {
            let j = (i + 1) % base.len();
            frame.extend(beam("frame", base[i], base[j], member)?);
        }
        match geometry {
            "flat" => {
                frame.extend(beam("frame", base[0], base[2], member)?);
                frame.extend(beam("frame", base[1], base[3], member)?);
            }
            "conical" => {
                for rib in ring(half, 0.0, 8) {
                    frame.extend(beam("frame", apex, rib, member)?);
                }
            }
            _ => {
                for corner in &base {
                    frame.extend(beam("frame", apex, *corner, member)?);
                }
            }
        }
        model.add_part(
            frame,
            &plan.material("frame")?.name,
            BTreeMap::from([
                ("member_side_m".to_string(), member),
                ("total_length_m".to_string(), canopy.frame_length),
            ]),
            mass.frame,
        )?;

        let harness: Vec3 = [0.0, 0.0, -HARNESS_DROP_M];
        let mut rigging = Mesh::new("rigging");
        for k in 0..RIGGING_LINES {
            let anchor = base[k * base.len() / RIGGING_LINES];
            rigging.extend(beam("rigging", anchor, harness, CORD_DIAMETER_M)?);
        }
        model.add_part(
            rigging,
            &plan.material("rigging")?.name,
            BTreeMap::from([("lines".to_string(), RIGGING_LINES as f64)]),
            mass.rigging,
        )?;

        Ok(model)
    }

    fn evaluate(&self, simulation: &SimulationResult) -> StageResult<SafetyVerdict> {
        let terminal_velocity = simulation.require_metric("terminal_velocity_m_s")?;
        let landing_velocity = simulation.require_metric("landing_velocity_m_s")?;
        let max_velocity = simulation.require_metric("max_descent_velocity_m_s")?;

        let landing_severity = if landing_velocity <= MAX_SAFE_DESCENT_M_S {
            Severity::Moderate
        } else {
            Severity::Critical
        };
        let oscillation_likelihood = if max_velocity > 1.2 * terminal_velocity {
            Likelihood::Occasional
        } else {
            Likelihood::Unlikely
        };

        let worksheet = FmeaWorksheet::new()
            .hazard(
                HazardFinding::new(
                    "PAR-01",
                    "canopy fails to hold its shape at release",
                    "free fall",
                    Severity::Catastrophic,
                    Likelihood::Unlikely,
                    Detection::Low,
                    "drag_coefficient",
                )
                .mitigated(
                    "rigid frame holds the canopy open from the moment of release",
                    Likelihood::Remote,
                ),
            )
            .hazard(
                HazardFinding::new(
                    "PAR-02",
                    "hard landing",
                    "leg injury at touchdown",
                    landing_severity,
                    Likelihood::Occasional,
                    Detection::AlmostCertain,
                    "landing_velocity_m_s",
                )
                .mitigated("flexed-knee landing onto soft ground", Likelihood::Unlikely),
            )
            .hazard(HazardFinding::new(
                "PAR-03",
                "gust-induced oscillation",
                "swinging descent and uneven landing",
                Severity::Marginal,
                oscillation_likelihood,
                Detection::Moderate,
                "max_descent_velocity_m_s",
            ))
            .hazard(
                HazardFinding::new(
                    "PAR-04",
                    "frame lashing slips at a corner",
                    "canopy distorts and drag drops",
                    Severity::Critical,
                    Likelihood::Unlikely,
                    Detection::Moderate,
                    "frame_safety_factor",
                )
                .mitigated("wrought-iron corner brackets", Likelihood::Remote),
            )
            .check(AcceptanceCheck::at_most(
                "terminal_velocity",
                terminal_velocity,
                MAX_SAFE_DESCENT_M_S,
                "m/s",
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
    use crate::safety::VerdictKind;

    fn simulate(config: &InventionConfig, seed: u64) -> (PlanResult, SimulationResult) {
        let plan = Parachute.plan(config).unwrap();
        let mut ctx = SimContext::new(seed, plan.fidelity);
        let sim = Parachute.simulate(&plan, &mut ctx).unwrap();
        (plan, sim)
    }

    #[test]
    fn test_pyramid_terminal_velocity() {
        let (_, sim) = simulate(&InventionConfig::new(), 0);
        let vt = sim.metric("terminal_velocity_m_s").unwrap();
        assert!((vt - 6.485).abs() < 0.01, "vt {vt}");
        assert!((sim.metric("total_mass_kg").unwrap() - 154.53).abs() < 0.05);
    }

    #[test]
    fn test_geometry_ordering() {
        let vt = |geometry: &str| {
            let config = InventionConfig::new().with_text("geometry", geometry);
            simulate(&config, 0).1.metric("terminal_velocity_m_s").unwrap()
        };
        let flat = vt("flat");
        let pyramid = vt("pyramid");
        let conical = vt("conical");
        assert!(flat < pyramid && pyramid < conical);
        assert!((conical - 8.72).abs() < 0.05);
    }

    #[test]
    fn test_descent_lands_near_terminal_velocity() {
        let (_, sim) = simulate(&InventionConfig::new(), 3);
        let landing = sim.metric("landing_velocity_m_s").unwrap();
        assert!(landing > 4.0 && landing < 9.0, "landing {landing}");
        let series = sim.series_named("descent").unwrap();
        let altitude = series.column("altitude_m").unwrap();
        assert_eq!(altitude.last().copied(), Some(0.0));
    }

    #[test]
    fn test_gusts_depend_on_seed() {
        let (_, a) = simulate(&InventionConfig::new(), 1);
        let (_, b) = simulate(&InventionConfig::new(), 2);
        assert_ne!(a.payload_digest(), b.payload_digest());
        assert_eq!(
            a.metric("terminal_velocity_m_s"),
            b.metric("terminal_velocity_m_s")
        );
    }

    #[test]
    fn test_pyramid_verdict() {
        let (_, sim) = simulate(&InventionConfig::new(), 0);
        let verdict = Parachute.evaluate(&sim).unwrap();
        assert!(verdict.kind() >= VerdictKind::PrototypeReady, "{:?}", verdict.rationale());
    }

    #[test]
    fn test_conical_fails_acceptance() {
        let config = InventionConfig::new().with_text("geometry", "conical");
        let (_, sim) = simulate(&config, 0);
        let verdict = Parachute.evaluate(&sim).unwrap();
        assert_eq!(verdict.kind(), VerdictKind::InProgress);
    }

    #[test]
    fn test_unknown_geometry_rejected() {
        let config = InventionConfig::new().with_text("geometry", "hexagonal");
        assert!(matches!(
            Parachute.plan(&config),
            Err(StageError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_collapsed_pyramid_is_geometry_error() {
        let config = InventionConfig::new().with_param("height_braccia", 0.0);
        let (plan, sim) = simulate(&config, 0);
        let err = Parachute.build(&plan, &sim).unwrap_err();
        assert!(matches!(err, StageError::Geometry { .. }));
    }

    #[test]
    fn test_build_each_geometry() {
        for geometry in GEOMETRIES {
            let config = InventionConfig::new()
                .with_text("geometry", *geometry)
                .with_fidelity(Fidelity::Educational);
            let (plan, sim) = simulate(&config, 0);
            let model = Parachute.build(&plan, &sim).unwrap();
            assert_eq!(model.parts.len(), 3, "{geometry}");
        }
    }
}
