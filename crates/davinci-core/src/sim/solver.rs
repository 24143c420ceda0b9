//! Numeric solvers with convergence and finiteness checks.

use crate::domain::error::{StageError, StageResult};
use crate::sim::SimContext;

/// Settings for [`solve_fixed_point`].
#[derive(Debug, Clone, Copy)]
pub struct FixedPointSettings {
    pub tolerance: f64,
    pub max_iterations: u64,
    /// Under-relaxation factor in `(0, 1]`.
    pub relaxation: f64,
}

impl Default for FixedPointSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 200,
            relaxation: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPointSolution {
    pub value: f64,
    pub iterations: u64,
    pub residual: f64,
}

/// Damped fixed-point iteration `x <- x + relaxation * (f(x) - x)`.
///
/// Stops when the step is below `tolerance`. Exhausting the iteration budget
/// or producing a non-finite iterate is a divergence.
pub fn solve_fixed_point<F>(
    solver: &str,
    initial: f64,
    settings: FixedPointSettings,
    ctx: &SimContext,
    mut f: F,
) -> StageResult<FixedPointSolution>
where
    F: FnMut(f64) -> f64,
{
    let diverged = |iterations: u64, residual: f64| StageError::SimulationDivergence {
        solver: solver.to_string(),
        iterations,
        residual,
    };

    if !initial.is_finite() {
        return Err(diverged(0, f64::INFINITY));
    }

    let mut x = initial;
    let mut residual = f64::INFINITY;
    for iteration in 1..=settings.max_iterations {
        ctx.checkpoint()?;
        let next = x + settings.relaxation * (f(x) - x);
        residual = (next - x).abs();
        if !next.is_finite() || !residual.is_finite() {
            return Err(diverged(iteration, f64::INFINITY));
        }
        x = next;
        if residual < settings.tolerance {
            return Ok(FixedPointSolution {
                value: x,
                iterations: iteration,
                residual,
            });
        }
    }

    tracing::debug!(solver, residual, "fixed-point iteration budget exhausted");
    Err(diverged(settings.max_iterations, residual))
}

/// Whether a time integration should keep stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Stop,
}

/// Explicit fixed-step integration over a flat state vector.
///
/// `step(ctx, t, state)` advances `state` by one step of `dt` in place and
/// says whether to continue. Returns the number of steps taken. Running out
/// of steps before `step` returns [`StepControl::Stop`], or a non-finite
/// state, is a divergence.
pub fn integrate<F>(
    solver: &str,
    state: &mut [f64],
    dt: f64,
    max_steps: u64,
    ctx: &mut SimContext,
    mut step: F,
) -> StageResult<u64>
where
    F: FnMut(&mut SimContext, f64, &mut [f64]) -> StepControl,
{
    if !dt.is_finite() || dt <= 0.0 {
        return Err(StageError::invalid_config(format!(
            "{solver}: time step must be positive, got {dt}"
        )));
    }

    for n in 0..max_steps {
        ctx.checkpoint()?;
        let t = n as f64 * dt;
        let control = step(ctx, t, state);
        if state.iter().any(|v| !v.is_finite()) {
            return Err(StageError::SimulationDivergence {
                solver: solver.to_string(),
                iterations: n + 1,
                residual: f64::INFINITY,
            });
        }
        if control == StepControl::Stop {
            return Ok(n + 1);
        }
    }

    Err(StageError::SimulationDivergence {
        solver: solver.to_string(),
        iterations: max_steps,
        residual: state.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Fidelity;
    use crate::sim::CancelToken;

    #[test]
    fn test_fixed_point_converges() {
        let ctx = SimContext::new(0, Fidelity::Educational);
        // x = cos(x) has a fixed point near 0.739085.
        let solution =
            solve_fixed_point("cosine", 1.0, FixedPointSettings::default(), &ctx, f64::cos)
                .unwrap();
        assert!((solution.value - 0.739_085_133).abs() < 1e-5);
        assert!(solution.residual < 1e-6);
    }

    #[test]
    fn test_fixed_point_divergence_reports_budget() {
        let ctx = SimContext::new(0, Fidelity::Educational);
        let settings = FixedPointSettings {
            max_iterations: 20,
            ..FixedPointSettings::default()
        };
        let err = solve_fixed_point("runaway", 1.0, settings, &ctx, |x| 3.0 * x).unwrap_err();
        match err {
            StageError::SimulationDivergence {
                solver, iterations, ..
            } => {
                assert_eq!(solver, "runaway");
                assert_eq!(iterations, 20);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_point_non_finite_is_divergence() {
        let ctx = SimContext::new(0, Fidelity::Educational);
        let err = solve_fixed_point("nan", 1.0, FixedPointSettings::default(), &ctx, |_| f64::NAN)
            .unwrap_err();
        assert!(matches!(err, StageError::SimulationDivergence { iterations: 1, .. }));
    }

    #[test]
    fn test_fixed_point_honours_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = SimContext::new(0, Fidelity::Educational).with_cancel(token);
        let err = solve_fixed_point("cosine", 1.0, FixedPointSettings::default(), &ctx, f64::cos)
            .unwrap_err();
        assert_eq!(err, StageError::Cancelled);
    }

    #[test]
    fn test_integrate_free_fall() {
        let mut ctx = SimContext::new(0, Fidelity::Educational);
        // state = [height, velocity]
        let mut state = [10.0, 0.0];
        let steps = integrate("fall", &mut state, 0.01, 10_000, &mut ctx, |_, _, s| {
            s[1] -= 9.81 * 0.01;
            s[0] += s[1] * 0.01;
            if s[0] <= 0.0 {
                StepControl::Stop
            } else {
                StepControl::Continue
            }
        })
        .unwrap();
        // Analytic time to fall 10 m is ~1.43 s.
        assert!((140..=145).contains(&steps), "steps {steps}");
    }

    #[test]
    fn test_integrate_budget_exhausted() {
        let mut ctx = SimContext::new(0, Fidelity::Educational);
        let mut state = [0.0];
        let err = integrate("endless", &mut state, 0.1, 5, &mut ctx, |_, _, _| {
            StepControl::Continue
        })
        .unwrap_err();
        assert!(matches!(err, StageError::SimulationDivergence { iterations: 5, .. }));
    }
}
