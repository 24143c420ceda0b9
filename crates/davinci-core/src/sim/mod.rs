//! Simulation harness primitives: seeded randomness and cooperative cancellation.
//!
//! Every random draw an invention makes goes through [`SimContext`], whose
//! RNG is seeded from the run seed only. Nothing here reads the clock.

pub mod solver;
pub mod tolerance;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::config::Fidelity;
use crate::domain::error::{StageError, StageResult};

/// Shared flag a supervisor trips to stop a running stage.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Cancelled` once tripped.
    pub fn checkpoint(&self) -> StageResult<()> {
        if self.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Per-run simulation context.
pub struct SimContext {
    seed: u64,
    fidelity: Fidelity,
    rng: StdRng,
    cancel: CancelToken,
}

impl SimContext {
    pub fn new(seed: u64, fidelity: Fidelity) -> Self {
        Self {
            seed,
            fidelity,
            rng: StdRng::seed_from_u64(seed),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Return `Cancelled` once the token has been tripped. Call between iterations.
    pub fn checkpoint(&self) -> StageResult<()> {
        self.cancel.checkpoint()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform sample in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Standard normal sample (Box-Muller, cosine branch only).
    pub fn standard_normal(&mut self) -> f64 {
        // 1 - U keeps u1 in (0, 1] so the log is finite.
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimContext::new(42, Fidelity::Educational);
        let mut b = SimContext::new(42, Fidelity::Educational);
        for _ in 0..16 {
            assert_eq!(a.standard_normal().to_bits(), b.standard_normal().to_bits());
        }
    }

    #[test]
    fn test_different_seed_different_stream() {
        let mut a = SimContext::new(1, Fidelity::Educational);
        let mut b = SimContext::new(2, Fidelity::Educational);
        assert_ne!(a.uniform(), b.uniform());
    }

    #[test]
    fn test_normal_moments() {
        let mut ctx = SimContext::new(7, Fidelity::Research);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| ctx.standard_normal()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn test_checkpoint_observes_cancel() {
        let token = CancelToken::new();
        let ctx = SimContext::new(0, Fidelity::Educational).with_cancel(token.clone());
        assert!(ctx.checkpoint().is_ok());
        token.cancel();
        assert_eq!(ctx.checkpoint(), Err(StageError::Cancelled));
    }
}
