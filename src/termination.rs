//! Termination of the iterative process.
//!
//! After setup and after every iteration, the [driver](crate::driver) asks a
//! [`Termination`] predicate whether to continue. Any closure taking
//! [`OptimizerIterState`] and returning [`Status`] is a predicate, and
//! [`Tolerances`] implements the usual combination of gradient, function
//! value, trust region and iteration budget tests.

use std::fmt;

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::convert;

use crate::{
    core::{RealField, StepOutcome},
    driver::OptimizerIterState,
    linesearch::LineSearchReason,
};

/// Reason of successful termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergedReason {
    /// Projected gradient norm is below the absolute tolerance.
    GradientAbs,
    /// Projected gradient norm relative to the function value is below the
    /// tolerance.
    GradientRel,
    /// Projected gradient norm relative to the initial one is below the
    /// tolerance.
    GradientTrend,
    /// Function value is below the given minimum.
    MinF,
    /// Change of the function value is below the absolute tolerance.
    FunctionAbs,
    /// Change of the function value is below the relative tolerance.
    FunctionRel,
    /// Trust region radius is below the tolerance.
    TrustRegion,
    /// All variables are at their bounds.
    BoundExhausted,
}

/// Reason of unsuccessful termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergedReason {
    /// Function value or gradient norm is not finite.
    Nan,
    /// Iteration budget was exhausted.
    MaxIterations,
    /// Trust region collapsed without accepting a step.
    TrustRegionCollapse,
    /// Trust region collapsed after the line search failed.
    LineSearch(LineSearchReason),
}

/// Decision of a termination predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The process should go on.
    Continue,
    /// The process converged.
    Converged(ConvergedReason),
    /// The process failed.
    Diverged(DivergedReason),
}

impl Status {
    /// Determines whether the process should stop.
    pub fn is_done(&self) -> bool {
        !matches!(self, Status::Continue)
    }

    /// Determines whether the process converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Status::Converged(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Continue => f.write_str("continue"),
            Status::Converged(reason) => write!(f, "converged ({:?})", reason),
            Status::Diverged(DivergedReason::LineSearch(reason)) => {
                write!(f, "diverged (line search: {})", reason)
            }
            Status::Diverged(reason) => write!(f, "diverged ({:?})", reason),
        }
    }
}

/// Interface of a termination predicate.
pub trait Termination<T: RealField> {
    /// Decides whether the process should continue given the current state.
    fn check(&mut self, state: &OptimizerIterState<'_, T>) -> Status;
}

impl<T, C> Termination<T> for C
where
    T: RealField,
    C: FnMut(&OptimizerIterState<'_, T>) -> Status,
{
    fn check(&mut self, state: &OptimizerIterState<'_, T>) -> Status {
        self(state)
    }
}

/// Standard termination tests.
///
/// The tests are evaluated in this order:
///
/// 1. non-finite function value or gradient norm (diverged),
/// 2. all variables at bounds (converged),
/// 3. `gnorm <= gatol`,
/// 4. `gnorm <= grtol * |f|`,
/// 5. `gnorm <= gttol * gnorm0`,
/// 6. `f <= fmin`,
/// 7. collapse of the trust region (diverged),
/// 8. `|f - f_prev| <= fatol` or `|f - f_prev| <= frtol * |f|` after an
///    accepted step,
/// 9. `delta <= trtol`,
/// 10. iteration budget (diverged).
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Tolerances<T: RealField> {
    /// Maximum number of iterations. Default: `50`.
    max_iters: usize,
    /// Absolute tolerance on the projected gradient norm. Default: `1e-8`.
    gatol: T,
    /// Tolerance on the projected gradient norm relative to the function
    /// value. Default: `1e-8`.
    grtol: T,
    /// Tolerance on the projected gradient norm relative to the initial one.
    /// Default: `0`.
    gttol: T,
    /// Absolute tolerance on the function value change. Default: `1e-10`.
    fatol: T,
    /// Relative tolerance on the function value change. Default: `1e-10`.
    frtol: T,
    /// Tolerance on the trust region radius. Default: `1e-12`.
    trtol: T,
    /// Function value considered low enough. Default: `-inf`.
    fmin: T,
    #[getset(skip)]
    gnorm0: T,
    #[getset(skip)]
    f_prev: Option<T>,
}

impl<T: RealField> Default for Tolerances<T> {
    fn default() -> Self {
        Self {
            max_iters: 50,
            gatol: convert(1e-8),
            grtol: convert(1e-8),
            gttol: convert(0.0),
            fatol: convert(1e-10),
            frtol: convert(1e-10),
            trtol: convert(1e-12),
            fmin: convert(f64::NEG_INFINITY),
            gnorm0: convert(0.0),
            f_prev: None,
        }
    }
}

impl<T: RealField> Tolerances<T> {
    /// Creates the tolerances with default values.
    pub fn new() -> Self {
        Self::default()
    }

    fn decide(&mut self, state: &OptimizerIterState<'_, T>) -> Status {
        let Self {
            max_iters,
            gatol,
            grtol,
            gttol,
            fatol,
            frtol,
            trtol,
            fmin,
            ..
        } = *self;

        let fx = state.fx();
        let gnorm = state.gnorm();
        let outcome = state.outcome();

        if state.iter() == 0 {
            self.gnorm0 = gnorm;
            self.f_prev = None;
        }

        if !fx.is_finite() || !gnorm.is_finite() {
            return Status::Diverged(DivergedReason::Nan);
        }

        if outcome == StepOutcome::BoundExhausted {
            return Status::Converged(ConvergedReason::BoundExhausted);
        }

        if gnorm <= gatol {
            return Status::Converged(ConvergedReason::GradientAbs);
        }

        if gnorm <= grtol * fx.abs() {
            return Status::Converged(ConvergedReason::GradientRel);
        }

        if gnorm <= gttol * self.gnorm0 {
            return Status::Converged(ConvergedReason::GradientTrend);
        }

        if fx <= fmin {
            return Status::Converged(ConvergedReason::MinF);
        }

        if outcome == StepOutcome::Collapsed {
            return match state.line_search() {
                Some(reason) if !reason.is_success() => {
                    Status::Diverged(DivergedReason::LineSearch(reason))
                }
                _ => Status::Diverged(DivergedReason::TrustRegionCollapse),
            };
        }

        if let (true, Some(f_prev)) = (outcome.is_accepted(), self.f_prev) {
            let change = (fx - f_prev).abs();

            if change <= fatol {
                return Status::Converged(ConvergedReason::FunctionAbs);
            }

            if change <= frtol * fx.abs() {
                return Status::Converged(ConvergedReason::FunctionRel);
            }
        }

        if state.delta() <= trtol {
            return Status::Converged(ConvergedReason::TrustRegion);
        }

        if state.iter() >= max_iters {
            return Status::Diverged(DivergedReason::MaxIterations);
        }

        Status::Continue
    }
}

impl<T: RealField> Termination<T> for Tolerances<T> {
    fn check(&mut self, state: &OptimizerIterState<'_, T>) -> Status {
        let status = self.decide(state);
        self.f_prev = Some(state.fx());

        if status.is_done() {
            debug!(
                "iteration {}: {} (f = {}, || pg || = {})",
                state.iter(),
                status,
                state.fx(),
                state.gnorm()
            );
        }

        status
    }
}
