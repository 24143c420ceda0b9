//! Concurrent batch execution of independent pipeline runs.

use std::sync::Arc;

use davinci_core::InventionConfig;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::pipeline::{PipelineError, PipelineRunResult, PipelineRunner};

/// One `(slug, seed, config)` run in a batch.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub slug: String,
    pub seed: u64,
    pub config: InventionConfig,
}

impl BatchJob {
    pub fn new(slug: impl Into<String>, seed: u64) -> Self {
        Self {
            slug: slug.into(),
            seed,
            config: InventionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InventionConfig) -> Self {
        self.config = config;
        self
    }
}

/// Run every job, at most `max_concurrent` at a time.
///
/// Each run gets its own task and owns its data. Results come back in job
/// order regardless of completion order. A failing run does not stop its
/// siblings.
pub async fn run_batch(
    runner: &PipelineRunner,
    jobs: Vec<BatchJob>,
    max_concurrent: usize,
) -> Vec<Result<PipelineRunResult, PipelineError>> {
    // Semaphore enforces max_concurrent
    let sem = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let tasks = jobs.into_iter().map(|job| {
        let runner = runner.clone();
        let sem = Arc::clone(&sem);
        tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            debug!(slug = %job.slug, seed = job.seed, "batch job started");
            runner.run(&job.slug, job.seed, &job.config).await
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "batch task aborted");
                Err(PipelineError::Aborted(e.to_string()))
            }
        })
        .collect()
}
