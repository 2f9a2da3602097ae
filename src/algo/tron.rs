//! Trust region Newton method for bound-constrained optimization.
//!
//! TRON alternates two phases in every iteration. First, a few projected
//! steepest descent steps identify the set of variables that are strictly
//! inside their bounds (the free set). Then a Newton correction restricted to
//! the free variables is computed approximately by truncated conjugate
//! gradients, constrained to a trust region, and tried by a projected line
//! search. The quality of the step, measured by the ratio of actual and
//! predicted reduction, drives the acceptance and the radius of the trust
//! region.
//!
//! # References
//!
//! \[1\] [Newton's Method for Large Bound-Constrained Optimization
//! Problems](https://epubs.siam.org/doi/10.1137/S1052623498345075)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use std::fmt;

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField as _, U1};
use thiserror::Error;

use crate::{
    core::{
        Domain, DomainError, Dual, Function, Iterate, Optimizer, Problem, Report, StepOutcome,
    },
    krylov::{RadiusSolver, SteihaugCg},
    linesearch::{LineSearch, ProjectedArmijo},
    subset::{FreeSet, ReducedSystem, SubsetType},
};

/// Specification for initial value of trust region size.
#[derive(Debug, Clone, Copy)]
pub enum DeltaInit<S> {
    /// Fixed value.
    Fixed(S),
    /// Norm of the projected gradient in the initial point, or one if it is
    /// zero.
    Estimated,
}

/// Options for [`Tron`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct TronOptions<P: Problem> {
    /// Maximum number of gradient projection steps per iteration. Default:
    /// `3`.
    max_gp_iters: usize,
    /// The gradient projection phase stops when the decrease of the last step
    /// is at most `pg_ftol` times the largest decrease so far. Default:
    /// `0.001`.
    pg_ftol: P::Field,
    /// Threshold for gain ratio that needs to be exceeded to accept the step.
    /// Default: `1e-4`.
    eta1: P::Field,
    /// Threshold for gain ratio to shrink trust region size if lower.
    /// Default: `0.25`.
    eta2: P::Field,
    /// Threshold for gain ratio to expand trust region size by `sigma2` if
    /// higher. Default: `0.5`.
    eta3: P::Field,
    /// Threshold for gain ratio to expand trust region size by `sigma3` if
    /// higher. Default: `0.9`.
    eta4: P::Field,
    /// Shrinking factor of trust region size. Default: `0.5`.
    sigma1: P::Field,
    /// Moderate expanding factor of trust region size. Default: `2`.
    sigma2: P::Field,
    /// Large expanding factor of trust region size. Default: `4`.
    sigma3: P::Field,
    /// Initial trust region size. Default: estimated (see [`DeltaInit`]).
    delta_init: DeltaInit<P::Field>,
    /// Trust region size below which the iteration gives up on finding an
    /// acceptable step. Default: `1e-30`.
    delta_collapse: P::Field,
    /// Strategy for restricting the Newton system to free variables.
    /// Default: [`SubsetType::Submatrix`].
    subset_type: SubsetType,
}

impl<P: Problem> Default for TronOptions<P> {
    fn default() -> Self {
        Self {
            max_gp_iters: 3,
            pg_ftol: convert(0.001),
            eta1: convert(1e-4),
            eta2: convert(0.25),
            eta3: convert(0.5),
            eta4: convert(0.9),
            sigma1: convert(0.5),
            sigma2: convert(2.0),
            sigma3: convert(4.0),
            delta_init: DeltaInit::Estimated,
            delta_collapse: convert(1e-30),
            subset_type: SubsetType::default(),
        }
    }
}

impl<P: Problem> TronOptions<P> {
    fn validate(&self) -> Result<(), TronError> {
        let zero: P::Field = convert(0.0);
        let one: P::Field = convert(1.0);

        let Self {
            pg_ftol,
            eta1,
            eta2,
            eta3,
            eta4,
            sigma1,
            sigma2,
            sigma3,
            delta_init,
            delta_collapse,
            ..
        } = *self;

        if !(zero < eta1 && eta1 < eta2 && eta2 <= eta3 && eta3 < eta4) {
            return Err(TronError::InvalidOptions(
                "gain ratio thresholds must satisfy 0 < eta1 < eta2 <= eta3 < eta4",
            ));
        }

        if !(zero < sigma1 && sigma1 < one && one < sigma2 && sigma2 <= sigma3) {
            return Err(TronError::InvalidOptions(
                "trust region factors must satisfy 0 < sigma1 < 1 < sigma2 <= sigma3",
            ));
        }

        if !(pg_ftol >= zero) {
            return Err(TronError::InvalidOptions(
                "gradient projection tolerance must be nonnegative",
            ));
        }

        if let DeltaInit::Fixed(delta) = delta_init {
            if !(delta > zero) {
                return Err(TronError::InvalidOptions(
                    "initial trust region size must be positive",
                ));
            }
        }

        if !(delta_collapse > zero) {
            return Err(TronError::InvalidOptions(
                "trust region collapse threshold must be positive",
            ));
        }

        Ok(())
    }
}

/// Error returned from [`Tron`] optimizer.
#[derive(Debug, Error)]
pub enum TronError {
    /// The domain is invalid.
    #[error("{0}")]
    Domain(#[from] DomainError),
    /// Function value or gradient is infinite or NaN.
    #[error("function value or gradient is not finite")]
    Numerical,
    /// The optimizer was used before being set up.
    #[error("optimizer is not set up")]
    Order,
    /// The options are inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
}

/// TRON optimizer.
///
/// The line search used in both phases and the solver of the reduced Newton
/// system are pluggable, see [`Tron::with_parts`]. See [module](self)
/// documentation for more details.
pub struct Tron<
    P: Problem,
    L = ProjectedArmijo<<P as Problem>::Field>,
    S = SteihaugCg<<P as Problem>::Field>,
> {
    options: TronOptions<P>,
    line_search: L,
    cg: S,
    system: ReducedSystem<P::Field>,
    hes: OMatrix<P::Field, Dyn, Dyn>,
    hes_pre: OMatrix<P::Field, Dyn, Dyn>,
    step: OVector<P::Field, Dyn>,
    dir: OVector<P::Field, Dyn>,
    work: OVector<P::Field, Dyn>,
    x_new: OVector<P::Field, Dyn>,
    g_new: OVector<P::Field, Dyn>,
    pg: OVector<P::Field, Dyn>,
    free: FreeSet,
    delta: P::Field,
    gnorm: P::Field,
    iter: usize,
    gp_iters: usize,
    total_gp_iters: usize,
    total_cg_iters: usize,
    rebuilds: usize,
    ready: bool,
}

impl<P: Problem> Tron<P> {
    /// Initializes TRON optimizer with default options.
    pub fn new(p: &P, dom: &Domain<P::Field>) -> Self {
        Self::with_options(p, dom, TronOptions::default())
    }

    /// Initializes TRON optimizer with given options.
    pub fn with_options(p: &P, dom: &Domain<P::Field>, options: TronOptions<P>) -> Self {
        Self::with_parts(p, dom, options, ProjectedArmijo::new(), SteihaugCg::new())
    }
}

impl<P: Problem, L, S> Tron<P, L, S> {
    /// Initializes TRON optimizer with given options, line search and solver
    /// of the reduced Newton system.
    pub fn with_parts(
        _p: &P,
        dom: &Domain<P::Field>,
        options: TronOptions<P>,
        line_search: L,
        cg: S,
    ) -> Self {
        let empty = Dyn(0);
        let subset_type = options.subset_type;

        let mut tron = Self {
            options,
            line_search,
            cg,
            system: ReducedSystem::new(subset_type),
            hes: OMatrix::zeros_generic(empty, empty),
            hes_pre: OMatrix::zeros_generic(empty, empty),
            step: OVector::zeros_generic(empty, U1::name()),
            dir: OVector::zeros_generic(empty, U1::name()),
            work: OVector::zeros_generic(empty, U1::name()),
            x_new: OVector::zeros_generic(empty, U1::name()),
            g_new: OVector::zeros_generic(empty, U1::name()),
            pg: OVector::zeros_generic(empty, U1::name()),
            free: FreeSet::default(),
            delta: convert(0.0),
            gnorm: convert(0.0),
            iter: 0,
            gp_iters: 0,
            total_gp_iters: 0,
            total_cg_iters: 0,
            rebuilds: 0,
            ready: false,
        };

        tron.allocate(dom.dim());
        tron
    }

    /// Gets the options.
    pub fn options(&self) -> &TronOptions<P> {
        &self.options
    }

    /// Gets the line search.
    pub fn line_search(&self) -> &L {
        &self.line_search
    }

    /// Number of gradient projection steps in the last iteration.
    pub fn gp_iters(&self) -> usize {
        self.gp_iters
    }

    /// Total number of gradient projection steps.
    pub fn total_gp_iters(&self) -> usize {
        self.total_gp_iters
    }

    /// Total number of iterations of the reduced system solver.
    pub fn total_cg_iters(&self) -> usize {
        self.total_cg_iters
    }

    /// Number of times the reduced system solver was (re)created because the
    /// number of free variables changed.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Number of performed iterations.
    pub fn iters(&self) -> usize {
        self.iter
    }

    /// Current trust region size.
    pub fn delta(&self) -> P::Field {
        self.delta
    }

    /// Free variables in the current point.
    pub fn free_set(&self) -> &FreeSet {
        &self.free
    }

    fn allocate(&mut self, dim: usize) {
        if self.pg.nrows() == dim {
            return;
        }

        let dim = Dyn(dim);

        self.hes = OMatrix::zeros_generic(dim, dim);
        self.hes_pre = OMatrix::zeros_generic(dim, dim);
        self.step = OVector::zeros_generic(dim, U1::name());
        self.dir = OVector::zeros_generic(dim, U1::name());
        self.work = OVector::zeros_generic(dim, U1::name());
        self.x_new = OVector::zeros_generic(dim, U1::name());
        self.g_new = OVector::zeros_generic(dim, U1::name());
        self.pg = OVector::zeros_generic(dim, U1::name());
        self.system.invalidate();
    }
}

impl<P: Problem, L, S> fmt::Display for Tron<P, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total PG its: {}, PG tolerance: {:.3}",
            self.total_gp_iters, self.options.pg_ftol
        )
    }
}

impl<F, L, S> Optimizer<F> for Tron<F, L, S>
where
    F: Function,
    L: LineSearch<F::Field>,
    S: RadiusSolver<F::Field>,
{
    const NAME: &'static str = "TRON";

    type Error = TronError;

    fn setup(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        it: &mut Iterate<F::Field>,
    ) -> Result<Report<F::Field>, Self::Error> {
        self.options.validate()?;
        dom.check()?;

        assert!(
            it.x.nrows() == dom.dim() && it.grad.nrows() == dom.dim(),
            "iterate dimension does not match the domain"
        );

        self.allocate(dom.dim());

        let Iterate { x, fx, grad } = it;

        // Make the point feasible.
        dom.project(x);

        *fx = f.apply(x);
        f.gradient(x, *fx, grad);

        self.free = dom.free_set(x)?;
        dom.bound_gradient_projection(x, grad, &mut self.pg);
        self.gnorm = self.pg.norm();

        if !fx.is_finite() || !self.gnorm.is_finite() {
            debug!(
                "non-finite value in the initial point (f = {}, || pg || = {})",
                fx, self.gnorm
            );
            return Err(TronError::Numerical);
        }

        self.delta = match self.options.delta_init {
            DeltaInit::Fixed(fixed) => fixed,
            DeltaInit::Estimated if self.gnorm == convert(0.0) => convert(1.0),
            DeltaInit::Estimated => self.gnorm,
        };

        self.system = ReducedSystem::new(self.options.subset_type);
        self.iter = 0;
        self.gp_iters = 0;
        self.total_gp_iters = 0;
        self.total_cg_iters = 0;
        self.rebuilds = 0;
        self.ready = true;

        debug!(
            "initial point: f = {}, || pg || = {}, delta = {}, {} free variables",
            fx,
            self.gnorm,
            self.delta,
            self.free.len()
        );

        Ok(Report {
            fx: *fx,
            gnorm: self.gnorm,
            step: convert(0.0),
            delta: self.delta,
            n_free: self.free.len(),
            outcome: StepOutcome::Initial,
            line_search: None,
        })
    }

    fn opt_next(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        it: &mut Iterate<F::Field>,
    ) -> Result<Report<F::Field>, Self::Error> {
        if !self.ready {
            return Err(TronError::Order);
        }

        let TronOptions {
            max_gp_iters,
            pg_ftol,
            eta1,
            eta2,
            eta3,
            eta4,
            sigma1,
            sigma2,
            sigma3,
            delta_collapse,
            ..
        } = self.options;

        let Self {
            line_search,
            cg,
            system,
            hes,
            hes_pre,
            step,
            dir,
            work,
            x_new,
            g_new,
            pg,
            free,
            delta,
            gnorm,
            iter,
            gp_iters,
            total_gp_iters,
            total_cg_iters,
            rebuilds,
            ..
        } = self;

        let Iterate { x, fx, grad } = it;

        let zero: F::Field = convert(0.0);
        let one: F::Field = convert(1.0);
        let half: F::Field = convert(0.5);
        let quarter: F::Field = convert(0.25);

        let mut last_search = None;

        // Gradient projection phase. The decrease is initialized so that the
        // first step is always attempted.
        let mut actred = -one;
        let mut actred_max = zero;

        *gp_iters = 0;
        *free = dom.free_set(x)?;

        for _ in 0..max_gp_iters {
            if -actred <= pg_ftol * actred_max {
                break;
            }

            *gp_iters += 1;

            dir.copy_from(grad);
            dir.neg_mut();

            let f_prev = *fx;
            let search = line_search.search(f, dom, x, fx, grad, dir);
            last_search = Some(search.reason);

            actred = *fx - f_prev;
            actred_max = actred_max.max(-actred);

            *free = dom.free_set(x)?;

            debug!(
                "gradient projection step {}: f = {}, actred = {}, line search {} (step = {}), {} free variables",
                gp_iters,
                fx,
                actred,
                search.reason,
                search.step,
                free.len()
            );
        }

        *total_gp_iters += *gp_iters;

        dom.bound_gradient_projection(x, grad, pg);
        *gnorm = pg.norm();

        if !fx.is_finite() || !gnorm.is_finite() {
            return Err(TronError::Numerical);
        }

        if free.is_empty() {
            debug!("all variables are at their bounds, no Newton step is possible");
            *iter += 1;

            return Ok(Report {
                fx: *fx,
                gnorm: *gnorm,
                step: zero,
                delta: *delta,
                n_free: 0,
                outcome: StepOutcome::BoundExhausted,
                line_search: last_search,
            });
        }

        // Newton phase on the free variables.
        f.hessian(x, *fx, hes);
        let has_pre = f.hessian_pre(x, hes_pre);

        let pre = if has_pre { Some(&*hes_pre) } else { None };
        if system.assemble(free, hes, pre, grad) {
            cg.setup(system.dim());
            *rebuilds += 1;
            debug!(
                "reduced system solver set up for {} free variables (dimension {})",
                free.len(),
                system.dim()
            );
        }

        let f_cur = *fx;
        let mut outcome = StepOutcome::Collapsed;
        let mut step_norm = zero;

        loop {
            let (hes_red, pre_red, rhs, sol) = system.parts_mut();
            let solved = cg.solve(hes_red, pre_red, rhs, *delta, sol);
            *total_cg_iters += solved.iterations;

            system.expand(free, step);

            let gdx = grad.dot(step);
            debug!(
                "reduced system: {:?} after {} iterations (|| dx || = {}), expected decrease g^T dx = {}",
                solved.reason, solved.iterations, solved.norm, gdx
            );

            x_new.copy_from(x);
            g_new.copy_from(grad);
            let mut f_new = f_cur;

            let search = line_search.search(f, dom, x_new, &mut f_new, g_new, step);
            last_search = Some(search.reason);

            // Predicted reduction of the quadratic model: dx^T (1/2 H dx + g).
            hes.mul_to(step, work);
            work.axpy(one, grad, half);
            let prered = step.dot(work);
            let actred = f_new - f_cur;

            let rho = if actred < zero {
                (-actred / prered).abs()
            } else {
                zero
            };

            if rho > eta1 {
                // dx = x_new - x
                step.copy_from(x_new);
                step.axpy(-one, x, one);
                step_norm = step.norm();

                let xdiff = step_norm * search.step;
                let delta_prev = *delta;

                if rho < eta2 {
                    *delta = xdiff.min(*delta) * sigma1;
                } else if rho > eta4 {
                    *delta = xdiff.min(*delta) * sigma3;
                } else if rho > eta3 {
                    *delta = xdiff.min(*delta) * sigma2;
                }

                debug!(
                    "step accepted (actred = {}, prered = {}, rho = {}), delta {} -> {}",
                    actred, prered, rho, delta_prev, delta
                );

                x.copy_from(x_new);
                grad.copy_from(g_new);
                *fx = f_new;

                *free = dom.free_set(x)?;
                dom.bound_gradient_projection(x, grad, pg);
                *gnorm = pg.norm();

                outcome = StepOutcome::Accepted { rho };
                break;
            } else if *delta <= delta_collapse {
                debug!(
                    "trust region collapsed (delta = {}), no step accepted",
                    delta
                );
                break;
            } else {
                debug!(
                    "step rejected (actred = {}, prered = {}, rho = {}, line search {}), shrinking delta {}",
                    actred, prered, rho, search.reason, delta
                );
                *delta *= quarter;
            }
        }

        if !fx.is_finite() || !gnorm.is_finite() {
            return Err(TronError::Numerical);
        }

        *iter += 1;

        Ok(Report {
            fx: *fx,
            gnorm: *gnorm,
            step: step_norm,
            delta: *delta,
            n_free: free.len(),
            outcome,
            line_search: last_search,
        })
    }

    fn reset(&mut self) {
        self.system.invalidate();
        self.delta = convert(0.0);
        self.gnorm = convert(0.0);
        self.iter = 0;
        self.gp_iters = 0;
        self.total_gp_iters = 0;
        self.total_cg_iters = 0;
        self.rebuilds = 0;
        self.ready = false;
    }

    fn compute_dual(
        &self,
        dom: &Domain<F::Field>,
        it: &Iterate<F::Field>,
    ) -> Result<Dual<F::Field>, Self::Error> {
        if !self.ready || self.iter == 0 {
            return Err(TronError::Order);
        }

        let zero: F::Field = convert(0.0);

        let mut pg = it.grad.clone_owned();
        dom.bound_gradient_projection(&it.x, &it.grad, &mut pg);

        let lower = (&pg - &it.grad).map(|d| d.max(zero));
        let upper = (&it.grad - &pg).map(|d| d.min(zero));

        Ok(Dual { lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        linesearch::LineSearchReason,
        testing::{Boxed, ExtendedRosenbrock, Linear, Quadratic, Sphere},
    };

    use approx::assert_abs_diff_eq;
    use nalgebra::{
        dmatrix, dvector,
        storage::{Storage, StorageMut},
        DVector, IsContiguous, Vector,
    };

    fn run<F: Function<Field = f64>>(
        f: &F,
        optimizer: &mut Tron<F>,
        x0: DVector<f64>,
        max_iters: usize,
        gtol: f64,
    ) -> (Iterate<f64>, Vec<Report<f64>>) {
        let dom = f.domain();
        let mut it = Iterate::new(x0);
        let mut reports = vec![optimizer.setup(f, &dom, &mut it).unwrap()];

        for _ in 0..max_iters {
            let report = optimizer.opt_next(f, &dom, &mut it).unwrap();
            assert!(report.delta > 0.0, "trust region size must stay positive");
            reports.push(report);

            if report.gnorm <= gtol || report.outcome == StepOutcome::BoundExhausted {
                break;
            }
        }

        (it, reports)
    }

    // f(x) = sum x_i with a gradient pointing the other way.
    struct Misleading;

    impl Problem for Misleading {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::unconstrained(1)
        }
    }

    impl Function for Misleading {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            x.sum()
        }

        fn gradient<Sx, Sg>(
            &self,
            _x: &Vector<Self::Field, Dyn, Sx>,
            _fx: Self::Field,
            grad: &mut Vector<Self::Field, Dyn, Sg>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
            Sg: StorageMut<Self::Field, Dyn>,
        {
            grad.fill(-1.0);
        }

        fn hessian<Sx>(
            &self,
            _x: &Vector<Self::Field, Dyn, Sx>,
            _fx: Self::Field,
            hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            hes.fill(0.0);
        }
    }

    struct NotANumber;

    impl Problem for NotANumber {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::unconstrained(2)
        }
    }

    impl Function for NotANumber {
        fn apply<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            f64::NAN
        }
    }

    // Only function values are provided, derivatives use finite differences.
    struct Paraboloid;

    impl Problem for Paraboloid {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::rect(vec![0.0, 0.0], vec![2.0, 2.0])
        }
    }

    impl Function for Paraboloid {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2)
        }
    }

    #[test]
    fn interior_minimum() {
        let f = Boxed::new(Sphere::new(1), Domain::rect(vec![-1.0], vec![1.0]));
        let mut optimizer = Tron::new(&f, &f.domain());

        let (it, reports) = run(&f, &mut optimizer, dvector![0.5], 10, 1e-10);

        assert_abs_diff_eq!(it.x[0], 0.0, epsilon = 1e-10);
        assert!(reports.iter().all(|report| report.n_free == 1));
        assert_eq!(optimizer.free_set().indices(), &[0]);
    }

    #[test]
    fn linear_to_lower_bound() {
        let f = Boxed::new(Linear::new(vec![1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);

        let (it, reports) = run(&f, &mut optimizer, dvector![0.5], 10, 0.0);
        let last = reports.last().unwrap();

        assert_eq!(it.x, dvector![0.0]);
        assert_eq!(last.outcome, StepOutcome::BoundExhausted);
        assert_eq!(last.n_free, 0);
        assert_eq!(last.gnorm, 0.0);
        assert!(optimizer.free_set().is_empty());

        let dual = optimizer.compute_dual(&dom, &it).unwrap();
        assert_eq!(dual.lower, dvector![0.0]);
        assert_eq!(dual.upper, dvector![0.0]);
    }

    #[test]
    fn linear_to_upper_bound() {
        let f = Boxed::new(Linear::new(vec![-1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);

        let (it, reports) = run(&f, &mut optimizer, dvector![0.5], 10, 0.0);
        let last = reports.last().unwrap();

        assert_eq!(it.x, dvector![1.0]);
        assert_eq!(last.outcome, StepOutcome::BoundExhausted);
        assert_eq!(last.gnorm, 0.0);

        let dual = optimizer.compute_dual(&dom, &it).unwrap();
        assert_eq!(dual.lower, dvector![1.0]);
        assert_eq!(dual.upper, dvector![-1.0]);
    }

    #[test]
    fn quadratic_exact_model() {
        let f = Quadratic::new(dmatrix![4.0, 1.0; 1.0, 3.0], dvector![1.0, 2.0]);
        let mut optimizer = Tron::new(&f, &f.domain());

        let (it, reports) = run(&f, &mut optimizer, dvector![0.0, 0.0], 3, 1e-9);

        assert!(reports.len() <= 4);
        assert_abs_diff_eq!(it.x, dvector![1.0 / 11.0, 7.0 / 11.0], epsilon = 1e-8);

        for report in &reports[1..] {
            match report.outcome {
                StepOutcome::Accepted { rho } => assert_abs_diff_eq!(rho, 1.0, epsilon = 1e-6),
                outcome => panic!("unexpected outcome {:?}", outcome),
            }
        }

        assert_eq!(optimizer.rebuilds(), 1);
        assert!(optimizer.total_cg_iters() >= 1);
    }

    #[test]
    fn collapse_without_progress() {
        let f = Misleading;
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);

        let mut it = Iterate::new(dvector![0.0]);
        optimizer.setup(&f, &dom, &mut it).unwrap();
        let report = optimizer.opt_next(&f, &dom, &mut it).unwrap();

        assert_eq!(report.outcome, StepOutcome::Collapsed);
        assert!(report.delta <= 1e-30);
        assert!(matches!(report.line_search, Some(reason) if !reason.is_success()));
        assert_eq!(it.x, dvector![0.0]);
        assert_eq!(optimizer.iters(), 1);
    }

    #[test]
    fn first_gradient_projection_always_runs() {
        let f = Boxed::new(Sphere::new(1), Domain::rect(vec![-1.0], vec![1.0]));
        let dom = f.domain();

        let mut options = TronOptions::default();
        options.set_pg_ftol(1e10);
        let mut optimizer = Tron::with_options(&f, &dom, options);

        let mut it = Iterate::new(dvector![0.5]);
        optimizer.setup(&f, &dom, &mut it).unwrap();
        optimizer.opt_next(&f, &dom, &mut it).unwrap();

        assert_eq!(optimizer.gp_iters(), 1);
        assert_eq!(optimizer.total_gp_iters(), 1);
    }

    #[test]
    fn no_gradient_projection() {
        let f = Quadratic::new(dmatrix![4.0, 1.0; 1.0, 3.0], dvector![1.0, 2.0]);
        let dom = f.domain();

        let mut options = TronOptions::default();
        options.set_max_gp_iters(0);
        let mut optimizer = Tron::with_options(&f, &dom, options);

        let (it, _) = run(&f, &mut optimizer, dvector![0.0, 0.0], 3, 1e-9);

        assert_eq!(optimizer.total_gp_iters(), 0);
        assert_abs_diff_eq!(it.x, dvector![1.0 / 11.0, 7.0 / 11.0], epsilon = 1e-8);
    }

    #[test]
    fn not_set_up() {
        let f = Sphere::new(2);
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);
        let mut it = Iterate::new(dvector![1.0, 1.0]);

        assert!(matches!(
            optimizer.opt_next(&f, &dom, &mut it),
            Err(TronError::Order)
        ));
        assert!(matches!(
            optimizer.compute_dual(&dom, &it),
            Err(TronError::Order)
        ));

        optimizer.setup(&f, &dom, &mut it).unwrap();
        assert!(matches!(
            optimizer.compute_dual(&dom, &it),
            Err(TronError::Order)
        ));

        optimizer.opt_next(&f, &dom, &mut it).unwrap();
        assert!(optimizer.compute_dual(&dom, &it).is_ok());
        optimizer.reset();

        assert_eq!(optimizer.iters(), 0);
        assert!(matches!(
            optimizer.opt_next(&f, &dom, &mut it),
            Err(TronError::Order)
        ));
        assert!(matches!(
            optimizer.compute_dual(&dom, &it),
            Err(TronError::Order)
        ));
    }

    #[test]
    fn inverted_bounds() {
        let f = Boxed::new(
            Sphere::new(2),
            Domain::rect(vec![0.0, 1.0], vec![1.0, 0.0]),
        );
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);
        let mut it = Iterate::new(dvector![0.5, 0.5]);

        assert!(matches!(
            optimizer.setup(&f, &dom, &mut it),
            Err(TronError::Domain(DomainError::InvertedBounds { index: 1 }))
        ));
    }

    #[test]
    fn non_finite_function() {
        let f = NotANumber;
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);
        let mut it = Iterate::new(dvector![0.5, 0.5]);

        assert!(matches!(
            optimizer.setup(&f, &dom, &mut it),
            Err(TronError::Numerical)
        ));
    }

    #[test]
    fn invalid_options() {
        let f = Sphere::new(2);
        let dom = f.domain();
        let mut it = Iterate::new(dvector![0.5, 0.5]);

        let mut options = TronOptions::default();
        options.set_eta1(0.5);
        let mut optimizer = Tron::with_options(&f, &dom, options);
        assert!(matches!(
            optimizer.setup(&f, &dom, &mut it),
            Err(TronError::InvalidOptions(_))
        ));

        let mut options = TronOptions::default();
        options.set_sigma1(1.5);
        let mut optimizer = Tron::with_options(&f, &dom, options);
        assert!(matches!(
            optimizer.setup(&f, &dom, &mut it),
            Err(TronError::InvalidOptions(_))
        ));

        let mut options = TronOptions::default();
        options.set_delta_init(DeltaInit::Fixed(0.0));
        let mut optimizer = Tron::with_options(&f, &dom, options);
        assert!(matches!(
            optimizer.setup(&f, &dom, &mut it),
            Err(TronError::InvalidOptions(_))
        ));
    }

    #[test]
    fn fixed_initial_delta() {
        let f = Sphere::new(2);
        let dom = f.domain();

        let mut options = TronOptions::default();
        options.set_delta_init(DeltaInit::Fixed(0.125));
        let mut optimizer = Tron::with_options(&f, &dom, options);

        let mut it = Iterate::new(dvector![3.0, -4.0]);
        let report = optimizer.setup(&f, &dom, &mut it).unwrap();

        assert_eq!(report.delta, 0.125);
        assert_eq!(report.gnorm, 10.0);
        assert_eq!(report.fx, 25.0);
        assert_eq!(report.outcome, StepOutcome::Initial);
    }

    #[test]
    fn mask_matches_submatrix() {
        let f = Boxed::new(
            Quadratic::new(dmatrix![4.0, 1.0; 1.0, 3.0], dvector![1.0, 2.0]),
            Domain::rect(vec![0.2, -1.0], vec![1.0, 1.0]),
        );
        let dom = f.domain();

        for subset_type in [SubsetType::Submatrix, SubsetType::Mask] {
            let mut options = TronOptions::default();
            options.set_subset_type(subset_type);
            let mut optimizer = Tron::with_options(&f, &dom, options);

            let (it, _) = run(&f, &mut optimizer, dvector![0.9, -0.9], 20, 1e-9);

            assert_abs_diff_eq!(it.x, dvector![0.2, 0.6], epsilon = 1e-8);
            assert!(optimizer.rebuilds() >= 1);
        }
    }

    #[test]
    fn bounded_rosenbrock() {
        let f = Boxed::new(
            ExtendedRosenbrock::new(2),
            Domain::rect(vec![-2.0, -2.0], vec![0.5, 2.0]),
        );
        let mut optimizer = Tron::new(&f, &f.domain());

        let (it, reports) = run(&f, &mut optimizer, dvector![-1.2, 1.0], 200, 1e-9);

        assert_abs_diff_eq!(it.x, dvector![0.5, 0.25], epsilon = 1e-6);
        assert_eq!(reports.last().unwrap().n_free, 1);
    }

    #[test]
    fn finite_difference_derivatives() {
        let f = Paraboloid;
        let mut optimizer = Tron::new(&f, &f.domain());

        let (it, _) = run(&f, &mut optimizer, dvector![2.0, 2.0], 50, 1e-6);

        assert_abs_diff_eq!(it.x, dvector![1.0, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn failed_line_search_is_reported() {
        let f = Boxed::new(Linear::new(vec![1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let dom = f.domain();
        let mut optimizer = Tron::new(&f, &dom);

        let mut it = Iterate::new(dvector![0.0]);
        optimizer.setup(&f, &dom, &mut it).unwrap();
        let report = optimizer.opt_next(&f, &dom, &mut it).unwrap();

        assert_eq!(report.outcome, StepOutcome::BoundExhausted);
        assert_eq!(report.line_search, Some(LineSearchReason::StepTooSmall));
    }

    #[test]
    fn view() {
        let f = Sphere::new(2);
        let optimizer = Tron::new(&f, &f.domain());

        assert_eq!(
            optimizer.to_string(),
            "Total PG its: 0, PG tolerance: 0.001"
        );
    }
}
