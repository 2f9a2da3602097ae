use nalgebra::{convert, DimName, Dyn, OVector, U1};

use super::{base::RealField, domain::Domain, function::Function};
use crate::linesearch::LineSearchReason;

/// The state of the optimization owned by the caller and exchanged with the
/// optimizer: the current point, the function value and the gradient in that
/// point.
#[derive(Debug, Clone)]
pub struct Iterate<T: RealField> {
    /// Current point.
    pub x: OVector<T, Dyn>,
    /// Function value in the current point.
    pub fx: T,
    /// Gradient in the current point.
    pub grad: OVector<T, Dyn>,
}

impl<T: RealField> Iterate<T> {
    /// Creates the iterate for given initial point. The function value and
    /// the gradient are computed by [`Optimizer::setup`].
    pub fn new(x: OVector<T, Dyn>) -> Self {
        let dim = Dyn(x.nrows());

        Self {
            x,
            fx: convert(f64::INFINITY),
            grad: OVector::zeros_generic(dim, U1::name()),
        }
    }
}

/// What happened in a single iteration of an optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome<T> {
    /// The optimizer was just set up, no step was taken.
    Initial,
    /// A step was accepted with given ratio of actual and predicted reduction.
    Accepted {
        /// The quality ratio.
        rho: T,
    },
    /// No step was accepted before the trust region collapsed.
    Collapsed,
    /// All variables are at their bounds, no Newton step is possible.
    BoundExhausted,
}

impl<T> StepOutcome<T> {
    /// Determines whether the point moved by an accepted Newton step.
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted { .. })
    }
}

/// Summary of an optimizer iteration handed to the termination predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report<T> {
    /// Function value in the current point.
    pub fx: T,
    /// Norm of the projected gradient in the current point.
    pub gnorm: T,
    /// Length of the step taken by the iteration, or zero.
    pub step: T,
    /// Current trust region radius.
    pub delta: T,
    /// Number of free variables in the current point.
    pub n_free: usize,
    /// Outcome of the iteration.
    pub outcome: StepOutcome<T>,
    /// Reason of the last line search, if any was run.
    pub line_search: Option<LineSearchReason>,
}

/// Estimates of the multipliers of the lower and upper bound constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Dual<T: RealField> {
    /// Lower bound multipliers.
    pub lower: OVector<T, Dyn>,
    /// Upper bound multipliers.
    pub upper: OVector<T, Dyn>,
}

/// Interface of an optimizer.
///
/// An optimizer is an iterative algorithm which takes the current
/// [`Iterate`] and computes the next one. Repeated calls to
/// [`opt_next`](Optimizer::opt_next) should eventually converge into a
/// (local) minimum in the domain.
///
/// The caller owns the iterate and passes it explicitly to every call. The
/// optimizer owns all the remaining state (trust region radius, reduced
/// systems, counters).
pub trait Optimizer<F: Function> {
    /// Name of the optimizer.
    const NAME: &'static str;

    /// Error while setting up or computing the next step.
    type Error;

    /// Prepares the optimizer for the iterative process.
    ///
    /// The implementations must make the point feasible and compute the
    /// function value and the gradient of the iterate.
    fn setup(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        it: &mut Iterate<F::Field>,
    ) -> Result<Report<F::Field>, Self::Error>;

    /// Computes the next step in the optimization process.
    ///
    /// After the method returns, the iterate holds the point, the function
    /// value and the gradient after the performed step. The implementations
    /// can assume that subsequent calls pass the iterate as was left by the
    /// previous call.
    fn opt_next(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        it: &mut Iterate<F::Field>,
    ) -> Result<Report<F::Field>, Self::Error>;

    /// Resets the internal state so that the optimizer can be set up again.
    fn reset(&mut self);

    /// Computes the bound multiplier estimates in the current iterate.
    ///
    /// Available only after at least one completed iteration.
    fn compute_dual(
        &self,
        dom: &Domain<F::Field>,
        it: &Iterate<F::Field>,
    ) -> Result<Dual<F::Field>, Self::Error>;
}
