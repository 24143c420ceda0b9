//! Da Vinci Codex pipeline orchestration.
//!
//! Drives an invention through PLAN -> SIMULATE -> BUILD -> EVALUATE:
//! - Each stage runs on the blocking pool under a wall-clock timeout
//! - The first failing stage short-circuits the run; later stages are skipped
//! - Runs are persisted as manifests keyed by slug and seed
//! - Batches of runs execute concurrently with bounded parallelism

pub mod batch;
pub mod pipeline;
pub mod reproducibility;
pub mod runner;
pub mod spec;
pub mod stage;

// Re-export key types
pub use batch::{run_batch, BatchJob};
pub use pipeline::{
    run_pipeline, PipelineError, PipelineRunResult, PipelineRunner, StageFailure, StageRecord,
};
pub use reproducibility::{verify_reproducible, ReproducibilityReport};
pub use runner::run_stage;
pub use spec::RunSpec;
pub use stage::{PipelineOptions, Stage, StageStatus, DEFAULT_STAGE_TIMEOUT};
