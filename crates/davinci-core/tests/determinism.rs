use davinci_core::harness::{run_build, run_evaluate, run_plan, run_simulate};
use davinci_core::{
    ArtifactStore, CancelToken, Fidelity, InventionConfig, Registry, SimContext, SimulationResult,
};

fn simulate(slug: &str, config: &InventionConfig, seed: u64) -> SimulationResult {
    let invention = Registry::builtin().resolve(slug).unwrap();
    let plan = run_plan(invention.as_ref(), config).unwrap();
    let mut ctx = SimContext::new(seed, config.fidelity);
    run_simulate(invention.as_ref(), &plan, &mut ctx, None).unwrap()
}

#[test]
fn same_plan_and_seed_give_identical_results() {
    let config = InventionConfig::new();
    for slug in ["aerial_screw", "parachute", "ornithopter"] {
        let a = simulate(slug, &config, 42);
        let b = simulate(slug, &config, 42);
        assert_eq!(a.payload_digest(), b.payload_digest(), "{slug}");
        assert_eq!(a, b, "{slug}");
    }
}

#[test]
fn seed_changes_the_stochastic_payload() {
    let config = InventionConfig::new();
    let a = simulate("parachute", &config, 0);
    let b = simulate("parachute", &config, 1);
    assert_ne!(a.payload_digest(), b.payload_digest());
    // The deterministic part of the model does not move with the seed.
    assert_eq!(
        a.metric("terminal_velocity_m_s"),
        b.metric("terminal_velocity_m_s")
    );
}

#[test]
fn fidelity_is_part_of_the_result() {
    let educational = simulate("aerial_screw", &InventionConfig::new(), 7);
    let research = simulate(
        "aerial_screw",
        &InventionConfig::new().with_fidelity(Fidelity::Research),
        7,
    );
    assert_eq!(research.fidelity(), Fidelity::Research);
    assert_ne!(educational.plan_digest(), research.plan_digest());
    assert_ne!(educational.payload_digest(), research.payload_digest());
}

#[test]
fn repeated_runs_write_identical_artifacts() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let registry = Registry::builtin();
    let invention = registry.resolve("parachute").unwrap();
    let config = InventionConfig::new();

    for dir in [&dir_a, &dir_b] {
        let store = ArtifactStore::new(dir.path());
        let plan = run_plan(invention.as_ref(), &config).unwrap();
        let mut ctx = SimContext::new(3, config.fidelity);
        let sim = run_simulate(invention.as_ref(), &plan, &mut ctx, Some(&store)).unwrap();
        run_build(invention.as_ref(), &plan, &sim, &CancelToken::new(), Some(&store)).unwrap();
        run_evaluate(invention.as_ref(), &sim, &CancelToken::new(), Some(&store)).unwrap();
    }

    let store_a = ArtifactStore::new(dir_a.path());
    let store_b = ArtifactStore::new(dir_b.path());
    let pairs = [
        (
            store_a.series_path("parachute", "descent", 3),
            store_b.series_path("parachute", "descent", 3),
        ),
        (
            store_a.metrics_path("parachute", 3),
            store_b.metrics_path("parachute", 3),
        ),
        (
            store_a.stl_path("parachute", "canopy", 3),
            store_b.stl_path("parachute", "canopy", 3),
        ),
        (
            store_a.risk_summary_path("parachute", 3),
            store_b.risk_summary_path("parachute", 3),
        ),
    ];
    for (a, b) in pairs {
        let bytes_a = std::fs::read(&a).unwrap();
        let bytes_b = std::fs::read(&b).unwrap();
        assert!(!bytes_a.is_empty(), "{}", a.display());
        assert_eq!(bytes_a, bytes_b, "{}", a.display());
    }
}

#[test]
fn random_stream_depends_only_on_seed() {
    let mut a = SimContext::new(99, Fidelity::Educational);
    let mut b = SimContext::new(99, Fidelity::Research);
    let draws_a: Vec<f64> = (0..16).map(|_| a.standard_normal()).collect();
    let draws_b: Vec<f64> = (0..16).map(|_| b.standard_normal()).collect();
    assert_eq!(draws_a, draws_b);
}
