//! Da Vinci Codex - invention simulation pipeline CLI
//!
//! The `davinci` command drives Leonardo's inventions through
//! PLAN -> SIMULATE -> BUILD -> EVALUATE and writes run-scoped artifacts.
//!
//! ## Commands
//!
//! - `list`: Registered inventions in canonical order
//! - `show`: Descriptor and default plan of one invention
//! - `simulate` / `build` / `evaluate`: Partial pipelines
//! - `pipeline`: Full run with safety verdict
//! - `batch`: Many `(slug, seed)` runs in parallel
//! - `reproduce`: Check that a run is bit-for-bit reproducible

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use davinci_core::harness::run_plan;
use davinci_core::registry;
use davinci_core::telemetry::{init_tracing, LogOptions};
use davinci_core::{
    get_invention, list_inventions, ArtifactStore, CodexError, Fidelity, InventionConfig,
    RegistryError, StageError, VerdictKind, DEFAULT_ARTIFACT_ROOT, METRICS,
};
use davinci_pipeline::{
    run_batch, verify_reproducible, BatchJob, PipelineError, PipelineOptions, PipelineRunResult,
    PipelineRunner, Stage, StageFailure,
};
use serde::Serialize;
use tracing::{info, Level};

/// Seed used when neither the command line nor the config names one.
const DEFAULT_SEED: u64 = 42;

#[derive(Parser, Debug)]
#[command(name = "davinci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic simulation pipeline for Leonardo da Vinci's inventions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and JSON listings)
    #[arg(long, global = true)]
    json: bool,

    /// Mirror log lines to stderr
    #[arg(long, global = true)]
    log_stderr: bool,

    /// Artifact root directory
    #[arg(long, global = true, env = "DAVINCI_ARTIFACTS", default_value = DEFAULT_ARTIFACT_ROOT)]
    artifacts: PathBuf,

    /// Wall-clock budget per stage, in seconds
    #[arg(long, global = true, default_value_t = 300)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that runs an invention.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Invention slug (see `davinci list`)
    #[arg(long)]
    slug: String,

    /// Run seed (default: config seed, then 42)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation fidelity: educational or research
    #[arg(long)]
    fidelity: Option<Fidelity>,

    /// Config file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter override, repeatable (e.g. --set pitch_deg=25)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered inventions
    List,

    /// Show an invention's descriptor and default plan
    Show {
        #[arg(long)]
        slug: String,
    },

    /// Plan and simulate
    Simulate(RunArgs),

    /// Plan, simulate and build CAD
    Build(RunArgs),

    /// Plan, simulate and evaluate safety (no CAD)
    Evaluate(RunArgs),

    /// Run the full pipeline
    Pipeline {
        #[command(flatten)]
        run: RunArgs,

        /// Skip the BUILD stage
        #[arg(long)]
        no_cad: bool,

        /// Fail unless the verdict is at least prototype_ready
        #[arg(long)]
        strict: bool,
    },

    /// Run many (slug, seed) pipelines concurrently
    Batch {
        /// Slugs to run (default: all registered)
        #[arg(long, value_delimiter = ',')]
        slugs: Vec<String>,

        /// Seeds to run for every slug
        #[arg(long, value_delimiter = ',', default_value = "42")]
        seeds: Vec<u64>,

        /// Maximum concurrent runs
        #[arg(long, default_value_t = 4)]
        jobs: usize,

        #[arg(long)]
        fidelity: Option<Fidelity>,

        /// Skip the BUILD stage
        #[arg(long)]
        no_cad: bool,
    },

    /// Verify that PLAN + SIMULATE is reproducible for a seed
    Reproduce(RunArgs),
}

/// How a command ended, mapped to the process exit code.
#[derive(Debug)]
enum Outcome {
    Success,
    StageFailed(StageFailure),
    BelowStrict(VerdictKind),
    NotReproducible,
}

impl Outcome {
    fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::StageFailed(failure) => stage_exit_code(&failure.error),
            Outcome::BelowStrict(_) => 6,
            Outcome::NotReproducible => 1,
        }
    }
}

fn stage_exit_code(error: &StageError) -> u8 {
    match error {
        StageError::InvalidConfig { .. } => 2,
        StageError::SimulationDivergence { .. } => 3,
        StageError::Geometry { .. } => 4,
        StageError::Timeout { .. } => 5,
        _ => 1,
    }
}

/// Exit code for an error that stopped a command before or outside a stage.
fn error_exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<RegistryError>().is_some() {
        return 2;
    }
    if let Some(PipelineError::NotFound(_)) = err.downcast_ref::<PipelineError>() {
        return 2;
    }
    if let Some(CodexError::ConfigParse { .. }) = err.downcast_ref::<CodexError>() {
        return 2;
    }
    if let Some(stage_error) = err.downcast_ref::<StageError>() {
        return stage_exit_code(stage_error);
    }
    1
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let store = ArtifactStore::new(&cli.artifacts);
    let log_path = store.log_path();
    let log_options = LogOptions {
        json: cli.json,
        level,
        stderr: cli.log_stderr,
        file: Some(&log_path),
    };
    if let Err(e) = init_tracing(log_options) {
        eprintln!("warning: cannot open log file {}: {e}", log_path.display());
        init_tracing(LogOptions {
            file: None,
            stderr: true,
            ..log_options
        })
        .ok();
    }

    let outcome = run(cli, store).await;
    METRICS.flush();

    match outcome {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(error_exit_code(&e))
        }
    }
}

async fn run(cli: Cli, store: ArtifactStore) -> Result<Outcome> {
    let options = PipelineOptions::default()
        .with_artifacts(store)
        .with_stage_timeout(Duration::from_secs(cli.timeout_secs));

    match cli.command {
        Commands::List => cmd_list(cli.json),
        Commands::Show { slug } => cmd_show(&slug),
        Commands::Simulate(args) => {
            cmd_run(&args, options.with_stop_after(Stage::Simulate), false).await
        }
        Commands::Build(args) => cmd_run(&args, options.with_stop_after(Stage::Build), false).await,
        Commands::Evaluate(args) => cmd_run(&args, options.without_cad(), false).await,
        Commands::Pipeline {
            run,
            no_cad,
            strict,
        } => {
            let options = if no_cad { options.without_cad() } else { options };
            cmd_run(&run, options, strict).await
        }
        Commands::Batch {
            slugs,
            seeds,
            jobs,
            fidelity,
            no_cad,
        } => {
            let options = if no_cad { options.without_cad() } else { options };
            cmd_batch(slugs, &seeds, jobs, fidelity, options).await
        }
        Commands::Reproduce(args) => cmd_reproduce(&args),
    }
}

/// Resolve the config and seed for a run. Seed precedence: flag, config, default.
fn load_config(args: &RunArgs) -> Result<(InventionConfig, u64)> {
    let mut config = match &args.config {
        Some(path) => InventionConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => InventionConfig::new(),
    };
    for assignment in &args.overrides {
        config.apply_override(assignment)?;
    }
    if let Some(fidelity) = args.fidelity {
        config.fidelity = fidelity;
    }
    let seed = args.seed.or(config.seed).unwrap_or(DEFAULT_SEED);
    Ok((config, seed))
}

/// List registered inventions
fn cmd_list(json: bool) -> Result<Outcome> {
    let inventions = list_inventions();
    if json {
        println!("{}", serde_json::to_string_pretty(&inventions)?);
        return Ok(Outcome::Success);
    }
    for descriptor in inventions {
        println!(
            "{:<14} {} ({}, {})",
            descriptor.slug, descriptor.display_name, descriptor.provenance, descriptor.era
        );
    }
    Ok(Outcome::Success)
}

/// Show a descriptor and the plan resolved from an empty config
fn cmd_show(slug: &str) -> Result<Outcome> {
    let descriptor = get_invention(slug)?;
    let invention = registry::global().resolve(slug)?;
    let plan = run_plan(invention.as_ref(), &InventionConfig::new())?;

    #[derive(Serialize)]
    struct Shown<'a> {
        descriptor: &'a davinci_core::InventionDescriptor,
        default_plan: &'a davinci_core::PlanResult,
    }
    let shown = Shown {
        descriptor: &descriptor,
        default_plan: &plan,
    };
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(Outcome::Success)
}

/// Run one invention through the stages allowed by `options`
async fn cmd_run(args: &RunArgs, options: PipelineOptions, strict: bool) -> Result<Outcome> {
    let (config, seed) = load_config(args)?;
    let runner = PipelineRunner::new(options);
    let result = runner.run(&args.slug, seed, &config).await?;

    print_run(&result);
    if let Some(store) = runner.options().store() {
        println!(
            "Manifest: {}",
            store.manifest_path(&result.slug, result.seed).display()
        );
    }

    if let Some(failure) = result.failure {
        eprintln!("{failure}");
        return Ok(Outcome::StageFailed(failure));
    }
    match result.verdict_kind() {
        Some(kind) if strict && kind < VerdictKind::PrototypeReady => {
            eprintln!("verdict {kind} is below prototype_ready");
            Ok(Outcome::BelowStrict(kind))
        }
        _ => Ok(Outcome::Success),
    }
}

/// Run every (slug, seed) combination with bounded parallelism
async fn cmd_batch(
    slugs: Vec<String>,
    seeds: &[u64],
    jobs: usize,
    fidelity: Option<Fidelity>,
    options: PipelineOptions,
) -> Result<Outcome> {
    let slugs = if slugs.is_empty() {
        list_inventions().into_iter().map(|d| d.slug).collect()
    } else {
        slugs
    };
    let config = InventionConfig::new().with_fidelity(fidelity.unwrap_or_default());
    let batch: Vec<BatchJob> = slugs
        .iter()
        .flat_map(|slug| {
            seeds
                .iter()
                .map(|&seed| BatchJob::new(slug.clone(), seed).with_config(config.clone()))
        })
        .collect();

    info!(jobs = batch.len(), max_concurrent = jobs, "starting batch");
    let runner = PipelineRunner::new(options);
    let results = run_batch(&runner, batch.clone(), jobs).await;

    let mut outcome = Outcome::Success;
    let mut first_error = None;
    for (job, result) in batch.iter().zip(results) {
        match result {
            Ok(run) => {
                let verdict = run
                    .verdict_kind()
                    .map(|k| k.name())
                    .unwrap_or("-");
                match &run.failure {
                    Some(failure) => {
                        println!("{:<14} seed {:<6} FAILED  {failure}", run.slug, run.seed);
                        if matches!(outcome, Outcome::Success) {
                            outcome = Outcome::StageFailed(failure.clone());
                        }
                    }
                    None => println!("{:<14} seed {:<6} ok      {verdict}", run.slug, run.seed),
                }
            }
            Err(e) => {
                println!("{:<14} seed {:<6} ERROR   {e}", job.slug, job.seed);
                if first_error.is_none() {
                    first_error = Some(
                        anyhow::Error::from(e)
                            .context(format!("batch job {} seed {}", job.slug, job.seed)),
                    );
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(outcome),
    }
}

/// Run PLAN + SIMULATE twice and compare payload digests
fn cmd_reproduce(args: &RunArgs) -> Result<Outcome> {
    let (config, seed) = load_config(args)?;
    let report = match verify_reproducible(&registry::global(), &args.slug, seed, &config)? {
        Ok(report) => report,
        Err(error) => {
            let failure = StageFailure {
                stage: Stage::Simulate,
                error,
            };
            eprintln!("{failure}");
            return Ok(Outcome::StageFailed(failure));
        }
    };

    println!("Plan digest:    {}", report.plan_digest);
    println!("First payload:  {}", report.first_payload_digest);
    println!("Second payload: {}", report.second_payload_digest);
    if report.reproducible() {
        println!("Reproducible: {} seed {}", report.slug, report.seed);
        Ok(Outcome::Success)
    } else {
        eprintln!("NOT reproducible: {} seed {}", report.slug, report.seed);
        Ok(Outcome::NotReproducible)
    }
}

/// First 12 hex digits of a run id, or the whole id when it is shorter.
fn short_run_id(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}

fn print_run(result: &PipelineRunResult) {
    println!(
        "Run {} ({} seed {}, {})",
        short_run_id(&result.run_id),
        result.slug,
        result.seed,
        result.fidelity
    );
    for record in &result.stages {
        println!(
            "  {:<9} {:?} ({}ms)",
            record.stage.name(),
            record.status,
            record.duration_ms
        );
    }
    if let Some(simulation) = &result.simulation {
        println!("Metrics:");
        for (name, value) in simulation.metrics() {
            println!("  {name:<24} {value:.4}");
        }
        println!("  {:<24} {:.4}", "safety_factor", simulation.safety_factor());
    }
    if let Some(cad) = &result.cad {
        println!(
            "CAD: {} parts, {} triangles, {:.2} kg",
            cad.parts.len(),
            cad.triangle_count(),
            cad.total_mass_kg()
        );
    }
    if let Some(verdict) = &result.verdict {
        println!("Verdict: {}", verdict.kind());
        for line in verdict.rationale() {
            println!("  - {line}");
        }
    }
}
