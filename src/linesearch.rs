//! Line searches along a direction projected onto the domain.
//!
//! Both phases of a bound-constrained Newton iteration move the point through
//! a line search: the gradient projection phase along the steepest descent
//! and the Newton phase along the computed correction. The trial points are
//! always projected onto the domain, so the searched path is piecewise linear
//! whenever it hits a bound.

use std::fmt;

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, DimName, Dyn, OVector, U1};

use crate::core::{Domain, Function, RealField};

/// Reason why a line search terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchReason {
    /// Sufficient decrease was achieved.
    Success,
    /// The direction is not a descent direction.
    FunctionIncrease,
    /// The step became too small or the projected point did not move.
    StepTooSmall,
    /// Maximum number of function evaluations was reached.
    MaxEvaluations,
}

impl LineSearchReason {
    /// Determines whether the line search found an acceptable point.
    pub fn is_success(&self) -> bool {
        matches!(self, LineSearchReason::Success)
    }
}

impl fmt::Display for LineSearchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            LineSearchReason::Success => "success",
            LineSearchReason::FunctionIncrease => "function increase",
            LineSearchReason::StepTooSmall => "step too small",
            LineSearchReason::MaxEvaluations => "max evaluations",
        };
        f.write_str(reason)
    }
}

/// Result of a line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome<T> {
    /// Accepted step length, zero on failure.
    pub step: T,
    /// Termination reason.
    pub reason: LineSearchReason,
    /// Number of function evaluations.
    pub evals: usize,
}

/// Interface of a line search.
pub trait LineSearch<T: RealField> {
    /// Searches along `dir` from point `x` with function value `fx` and
    /// gradient `grad`.
    ///
    /// On success, `x`, `fx` and `grad` are replaced by the accepted point,
    /// its function value and its gradient. On failure, they are left
    /// untouched.
    fn search<F>(
        &mut self,
        f: &F,
        dom: &Domain<T>,
        x: &mut OVector<T, Dyn>,
        fx: &mut T,
        grad: &mut OVector<T, Dyn>,
        dir: &OVector<T, Dyn>,
    ) -> LineSearchOutcome<T>
    where
        F: Function<Field = T>;
}

/// Options for [`ProjectedArmijo`] line search.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ProjectedArmijoOptions<T: RealField> {
    /// Sufficient decrease parameter. Default: `1e-4`.
    ftol: T,
    /// Maximum number of function evaluations. Default: `30`.
    max_evals: usize,
    /// Initial step length. Default: `1`.
    step_init: T,
    /// Minimum step length. Default: `1e-20`.
    step_min: T,
    /// Lower safeguard of the interpolated step relative to the previous one.
    /// Default: `0.1`.
    shrink_min: T,
    /// Upper safeguard of the interpolated step relative to the previous one.
    /// Default: `0.5`.
    shrink_max: T,
}

impl<T: RealField> Default for ProjectedArmijoOptions<T> {
    fn default() -> Self {
        Self {
            ftol: convert(1e-4),
            max_evals: 30,
            step_init: convert(1.0),
            step_min: convert(1e-20),
            shrink_min: convert(0.1),
            shrink_max: convert(0.5),
        }
    }
}

/// Backtracking line search with the Armijo condition evaluated along the
/// projected path.
///
/// A trial point `P(x + a d)` is accepted when
///
/// ```text
/// f(P(x + a d)) <= f(x) + ftol * grad^T (P(x + a d) - x)
/// ```
///
/// Otherwise the step is reduced using a quadratic interpolation safeguarded
/// to `[shrink_min * a, shrink_max * a]`.
#[derive(Debug, Clone)]
pub struct ProjectedArmijo<T: RealField> {
    options: ProjectedArmijoOptions<T>,
    trial: OVector<T, Dyn>,
}

impl<T: RealField> ProjectedArmijo<T> {
    /// Initializes the line search with default options.
    pub fn new() -> Self {
        Self::with_options(ProjectedArmijoOptions::default())
    }

    /// Initializes the line search with given options.
    pub fn with_options(options: ProjectedArmijoOptions<T>) -> Self {
        Self {
            options,
            trial: OVector::zeros_generic(Dyn(0), U1::name()),
        }
    }

    /// Gets the options.
    pub fn options(&self) -> &ProjectedArmijoOptions<T> {
        &self.options
    }
}

impl<T: RealField> Default for ProjectedArmijo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField> LineSearch<T> for ProjectedArmijo<T> {
    fn search<F>(
        &mut self,
        f: &F,
        dom: &Domain<T>,
        x: &mut OVector<T, Dyn>,
        fx: &mut T,
        grad: &mut OVector<T, Dyn>,
        dir: &OVector<T, Dyn>,
    ) -> LineSearchOutcome<T>
    where
        F: Function<Field = T>,
    {
        let ProjectedArmijoOptions {
            ftol,
            max_evals,
            step_init,
            step_min,
            shrink_min,
            shrink_max,
        } = self.options;

        let zero = T::zero();
        let two: T = convert(2.0);

        let failure = |reason, evals| LineSearchOutcome {
            step: zero,
            reason,
            evals,
        };

        let slope = grad.dot(dir);
        if slope >= zero || !slope.is_finite() {
            debug!("not a descent direction (g^T d = {})", slope);
            return failure(LineSearchReason::FunctionIncrease, 0);
        }

        if self.trial.nrows() != x.nrows() {
            self.trial = x.clone_owned();
        }
        let trial = &mut self.trial;

        let mut step = step_init;
        let mut evals = 0;

        loop {
            if step < step_min {
                debug!("line search step {} below minimum {}", step, step_min);
                return failure(LineSearchReason::StepTooSmall, evals);
            }

            if evals == max_evals {
                debug!("line search reached {} evaluations", max_evals);
                return failure(LineSearchReason::MaxEvaluations, evals);
            }

            // Get the trial point P(x + step * d).
            trial.copy_from(x);
            trial.axpy(step, dir, T::one());
            dom.project(trial);

            // Compute grad^T (P(x + step * d) - x), the decrease predicted by
            // the linear model along the projected path.
            let mut moved = false;
            let mut decrease = zero;
            for ((ti, xi), gi) in trial.iter().zip(x.iter()).zip(grad.iter()) {
                moved |= ti != xi;
                decrease += *gi * (*ti - *xi);
            }

            if !moved {
                debug!("projected trial point does not move (step = {})", step);
                return failure(LineSearchReason::StepTooSmall, evals);
            }

            if decrease >= zero {
                // The projection bent the path so that it is not a descent
                // anymore. Shorter steps are closer to the original direction.
                step *= shrink_max;
                continue;
            }

            let f_trial = f.apply(&*trial);
            evals += 1;

            if f_trial.is_finite() && f_trial <= *fx + ftol * decrease {
                x.copy_from(trial);
                *fx = f_trial;
                f.gradient(x, f_trial, grad);

                return LineSearchOutcome {
                    step,
                    reason: LineSearchReason::Success,
                    evals,
                };
            }

            let step_next = if f_trial.is_finite() {
                // Minimizer of the quadratic interpolating f(x), the slope
                // along the path and f(P(x + step * d)).
                let path_slope = decrease / step;
                let denom = two * (f_trial - *fx - decrease);

                if denom > zero {
                    -path_slope * step * step / denom
                } else {
                    step * shrink_max
                }
            } else {
                step * shrink_min
            };

            step = step_next.max(step * shrink_min).min(step * shrink_max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Problem;
    use crate::testing::{Boxed, Linear, Sphere};

    use nalgebra::dvector;

    #[test]
    fn interpolated_backtracking() {
        let f = Sphere::new(1);
        let dom = f.domain();

        let mut x = dvector![1.0];
        let mut fx = 1.0;
        let mut grad = dvector![2.0];
        let dir = dvector![-2.0];

        let mut ls = ProjectedArmijo::new();
        let outcome = ls.search(&f, &dom, &mut x, &mut fx, &mut grad, &dir);

        // The full step overshoots to x = -1 with the same function value.
        // The interpolation hits the minimum exactly.
        assert_eq!(outcome.reason, LineSearchReason::Success);
        assert_eq!(outcome.step, 0.5);
        assert_eq!(outcome.evals, 2);
        assert_eq!(x, dvector![0.0]);
        assert_eq!(fx, 0.0);
        assert_eq!(grad, dvector![0.0]);
    }

    #[test]
    fn ascent_direction_is_rejected() {
        let f = Sphere::new(1);
        let dom = f.domain();

        let mut x = dvector![1.0];
        let mut fx = 1.0;
        let mut grad = dvector![2.0];

        let mut ls = ProjectedArmijo::new();
        let outcome = ls.search(&f, &dom, &mut x, &mut fx, &mut grad, &dvector![1.0]);

        assert_eq!(outcome.reason, LineSearchReason::FunctionIncrease);
        assert_eq!(outcome.evals, 0);
        assert_eq!(x, dvector![1.0]);
        assert_eq!(fx, 1.0);
    }

    #[test]
    fn projection_onto_bound() {
        let f = Boxed::new(Linear::new(vec![1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let dom = f.domain();

        let mut x = dvector![0.5];
        let mut fx = 0.5;
        let mut grad = dvector![1.0];

        let mut ls = ProjectedArmijo::new();
        let outcome = ls.search(&f, &dom, &mut x, &mut fx, &mut grad, &dvector![-1.0]);

        assert_eq!(outcome.reason, LineSearchReason::Success);
        assert_eq!(outcome.step, 1.0);
        assert_eq!(x, dvector![0.0]);
        assert_eq!(fx, 0.0);
    }

    #[test]
    fn blocked_by_bound() {
        let f = Boxed::new(Linear::new(vec![1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let dom = f.domain();

        let mut x = dvector![0.0];
        let mut fx = 0.0;
        let mut grad = dvector![1.0];

        let mut ls = ProjectedArmijo::new();
        let outcome = ls.search(&f, &dom, &mut x, &mut fx, &mut grad, &dvector![-1.0]);

        assert_eq!(outcome.reason, LineSearchReason::StepTooSmall);
        assert_eq!(outcome.evals, 0);
        assert_eq!(x, dvector![0.0]);
    }

    #[test]
    fn max_evaluations() {
        let f = Linear::new(vec![1.0]);
        let dom = f.domain();

        let mut x = dvector![0.0];
        let mut fx = 0.0;
        // Wrong gradient, the function increases along the direction.
        let mut grad = dvector![-1.0];

        let mut options = ProjectedArmijoOptions::default();
        options.set_max_evals(5);

        let mut ls = ProjectedArmijo::with_options(options);
        let outcome = ls.search(&f, &dom, &mut x, &mut fx, &mut grad, &dvector![1.0]);

        assert_eq!(outcome.reason, LineSearchReason::MaxEvaluations);
        assert_eq!(outcome.evals, 5);
        assert_eq!(x, dvector![0.0]);
        assert_eq!(grad, dvector![-1.0]);
    }
}
