//! Stage execution under a wall-clock timeout.

use std::time::{Duration, Instant};

use davinci_core::{CancelToken, StageError, StageResult};

use crate::stage::Stage;

/// Run one stage on the blocking pool.
///
/// When `timeout` elapses first the stage's cancel token is tripped and
/// `StageError::Timeout` is returned. The worker thread stops at its next
/// checkpoint and the harness persists nothing once the token is tripped;
/// its late result is discarded.
pub async fn run_stage<T, F>(
    stage: Stage,
    timeout: Duration,
    cancel: &CancelToken,
    work: F,
) -> StageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StageResult<T> + Send + 'static,
{
    let start = Instant::now();
    let handle = tokio::task::spawn_blocking(work);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(StageError::internal(format!(
            "stage {stage} aborted: {join_error}"
        ))),
        Err(_) => {
            cancel.cancel();
            Err(StageError::Timeout {
                stage: stage.name().to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}
