//! High-level API for optimization.
//!
//! This module contains the "driver" that encapsulates all internal state and
//! provides a simple API to run the iterative process.
//!
//! The simplest way of using the driver is to initialize it with the defaults:
//!
//! ```rust
//! use tron::OptimizerDriver;
//! # use tron::nalgebra as na;
//! # use tron::{Domain, Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0])
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 2.0).powi(2) + (x[1] - 0.5).powi(2)
//! #     }
//! # }
//!
//! let f = MyFunction;
//!
//! let mut optimizer = OptimizerDriver::new(&f);
//! ```
//!
//! If you need to specify additional settings, use the builder:
//!
//! ```rust
//! use tron::algo::{tron::TronOptions, Tron};
//! use tron::OptimizerDriver;
//! # use tron::nalgebra as na;
//! # use tron::{Domain, Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0])
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 2.0).powi(2) + (x[1] - 0.5).powi(2)
//! #     }
//! # }
//!
//! let f = MyFunction;
//!
//! let mut optimizer = OptimizerDriver::builder(&f)
//!     .with_initial(vec![0.5, 0.0])
//!     .with_algo(|f, dom| {
//!         let mut options = TronOptions::default();
//!         options.set_max_gp_iters(5);
//!         Tron::with_options(f, dom, options)
//!     })
//!     .build();
//! ```
//!
//! Once you have the optimizer, you can use it to find the minimum:
//!
//! ```rust
//! # use tron::nalgebra as na;
//! # use tron::{Domain, Function, OptimizerDriver, Problem};
//! # use na::{Dyn, IsContiguous};
//! use tron::termination::Tolerances;
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0])
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 2.0).powi(2) + (x[1] - 0.5).powi(2)
//! #     }
//! # }
//! #
//! # let f = MyFunction;
//! #
//! # let mut optimizer = OptimizerDriver::new(&f);
//! #
//! let (x, fx, status) = optimizer
//!     .find(Tolerances::default())
//!     .expect("optimizer error");
//! ```
//!
//! If you need more control over the iteration process, you can do the
//! iterations manually:
//!
//! ```rust
//! # use tron::nalgebra as na;
//! # use tron::{Domain, Function, OptimizerDriver, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0])
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 2.0).powi(2) + (x[1] - 0.5).powi(2)
//! #     }
//! # }
//! #
//! # let f = MyFunction;
//! #
//! # let mut optimizer = OptimizerDriver::new(&f);
//! #
//! loop {
//!     let report = optimizer.next().expect("no optimizer error");
//!     // ...
//! #   break;
//! }
//! ```

use nalgebra::{convert, DimName, Dyn, OVector, U1};

use crate::{
    algo::Tron,
    core::{Domain, Dual, Function, Iterate, Optimizer, Problem, RealField, Report, StepOutcome},
    linesearch::LineSearchReason,
    termination::{Status, Termination},
};

/// Builder for the [`OptimizerDriver`].
pub struct OptimizerBuilder<'a, F: Problem, A> {
    f: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    x0: OVector<F::Field, Dyn>,
}

impl<'a, F: Problem> OptimizerBuilder<'a, F, Tron<F>> {
    fn new(f: &'a F) -> Self {
        let dom = f.domain();
        let algo = Tron::new(f, &dom);

        let dim = Dyn(dom.dim());
        let x0 = OVector::from_element_generic(dim, U1::name(), convert(0.0));

        Self { f, dom, algo, x0 }
    }
}

impl<'a, F: Problem, A> OptimizerBuilder<'a, F, A> {
    /// Sets the initial point from which the iterative process starts.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        let dim = Dyn(self.dom.dim());
        self.x0 = OVector::from_vec_generic(dim, U1::name(), x0);
        self
    }

    /// Sets specific algorithm to be used.
    ///
    /// This builder method accepts a closure that takes the reference to the
    /// problem and its domain. For many algorithms, you can simply pass the
    /// `new` constructor directly (e.g., `Tron::new`).
    pub fn with_algo<A2, FA>(self, factory: FA) -> OptimizerBuilder<'a, F, A2>
    where
        FA: FnOnce(&F, &Domain<F::Field>) -> A2,
    {
        let algo = factory(self.f, &self.dom);

        OptimizerBuilder {
            f: self.f,
            dom: self.dom,
            algo,
            x0: self.x0,
        }
    }

    /// Builds the [`OptimizerDriver`].
    pub fn build(self) -> OptimizerDriver<'a, F, A> {
        let Self {
            f,
            dom,
            algo,
            mut x0,
        } = self;

        dom.project(&mut x0);

        OptimizerDriver {
            f,
            dom,
            algo,
            it: Iterate::new(x0),
            report: None,
            iter: 0,
        }
    }
}

/// The driver for the process of bound-constrained optimization.
///
/// For default settings, use [`OptimizerDriver::new`]. For more flexibility,
/// use [`OptimizerDriver::builder`]. For the usage of the driver, see
/// [module](self) documentation.
pub struct OptimizerDriver<'a, F: Problem, A> {
    f: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    it: Iterate<F::Field>,
    report: Option<Report<F::Field>>,
    iter: usize,
}

impl<'a, F: Problem> OptimizerDriver<'a, F, Tron<F>> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(f: &'a F) -> OptimizerBuilder<'a, F, Tron<F>> {
        OptimizerBuilder::new(f)
    }

    /// Initializes the driver with the default settings.
    pub fn new(f: &'a F) -> Self {
        OptimizerDriver::builder(f).build()
    }
}

impl<'a, F: Problem, A> OptimizerDriver<'a, F, A> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[F::Field] {
        self.it.x.as_slice()
    }

    /// Returns the current function value.
    ///
    /// Before the first iteration, the value is infinite.
    pub fn fx(&self) -> F::Field {
        self.it.fx
    }

    /// Returns reference to the gradient in the current point.
    pub fn grad(&self) -> &[F::Field] {
        self.it.grad.as_slice()
    }

    /// Returns the report of the last iteration, if any.
    pub fn report(&self) -> Option<&Report<F::Field>> {
        self.report.as_ref()
    }

    /// Returns the number of performed iterations.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Returns reference to the used algorithm.
    pub fn algo(&self) -> &A {
        &self.algo
    }
}

impl<'a, F: Function, A: Optimizer<F>> OptimizerDriver<'a, F, A> {
    fn ensure_setup(&mut self) -> Result<Report<F::Field>, A::Error> {
        match self.report {
            Some(report) => Ok(report),
            None => {
                let report = self.algo.setup(self.f, &self.dom, &mut self.it)?;
                self.report = Some(report);
                self.iter = 0;
                Ok(report)
            }
        }
    }

    /// Does one iteration of the process, returning its report in case of no
    /// error.
    ///
    /// The optimizer is set up before the first iteration.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Report<F::Field>, A::Error> {
        self.ensure_setup()?;

        let report = self.algo.opt_next(self.f, &self.dom, &mut self.it)?;
        self.report = Some(report);
        self.iter += 1;

        Ok(report)
    }

    /// Runs the iterative process until given stopping criterion is
    /// satisfied.
    ///
    /// The criterion is evaluated also for the initial point. Returns the
    /// final point, its function value and the status that stopped the
    /// process.
    pub fn find<C>(&mut self, mut stop: C) -> Result<(&[F::Field], F::Field, Status), A::Error>
    where
        C: Termination<F::Field>,
    {
        let mut report = self.ensure_setup()?;

        loop {
            let status = stop.check(&OptimizerIterState::new(&self.it.x, &report, self.iter));

            if status.is_done() {
                return Ok((self.it.x.as_slice(), self.it.fx, status));
            }

            report = self.next()?;
        }
    }

    /// Returns the estimates of bound multipliers in the current point.
    ///
    /// Fails if no iteration was performed yet.
    pub fn dual(&self) -> Result<Dual<F::Field>, A::Error> {
        self.algo.compute_dual(&self.dom, &self.it)
    }

    /// Resets the algorithm so that the process starts over from the current
    /// point.
    pub fn reset(&mut self) {
        self.algo.reset();
        self.report = None;
        self.iter = 0;
    }

    /// Returns the name of the used optimizer.
    pub fn name(&self) -> &str {
        A::NAME
    }
}

/// State of the current iteration.
pub struct OptimizerIterState<'a, T: RealField> {
    x: &'a OVector<T, Dyn>,
    report: &'a Report<T>,
    iter: usize,
}

impl<'a, T: RealField> OptimizerIterState<'a, T> {
    pub(crate) fn new(x: &'a OVector<T, Dyn>, report: &'a Report<T>, iter: usize) -> Self {
        Self { x, report, iter }
    }

    /// Returns reference to the current point.
    pub fn x(&self) -> &[T] {
        self.x.as_slice()
    }

    /// Returns the current function value.
    pub fn fx(&self) -> T {
        self.report.fx
    }

    /// Returns the norm of the projected gradient.
    pub fn gnorm(&self) -> T {
        self.report.gnorm
    }

    /// Returns the length of the last step, or zero.
    pub fn step(&self) -> T {
        self.report.step
    }

    /// Returns the trust region size.
    pub fn delta(&self) -> T {
        self.report.delta
    }

    /// Returns the number of free variables.
    pub fn n_free(&self) -> usize {
        self.report.n_free
    }

    /// Returns the outcome of the last iteration.
    pub fn outcome(&self) -> StepOutcome<T> {
        self.report.outcome
    }

    /// Returns the reason of the last line search, if any.
    pub fn line_search(&self) -> Option<LineSearchReason> {
        self.report.line_search
    }

    /// Returns the current iteration number.
    pub fn iter(&self) -> usize {
        self.iter
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        algo::tron::TronOptions,
        termination::{ConvergedReason, DivergedReason, Tolerances},
        testing::{Boxed, ExtendedRosenbrock, Linear, Sphere},
    };

    use super::*;

    use nalgebra::{
        storage::{Storage, StorageMut},
        IsContiguous, OMatrix, Vector,
    };

    struct WithDomain(pub Domain<f64>);

    impl Problem for WithDomain {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            self.0.clone()
        }
    }

    #[test]
    fn optimizer_basic_use_case() {
        let f = Sphere::new(4);
        let mut optimizer = OptimizerDriver::builder(&f)
            // Zeros are the minimum for sphere, there would be no point is
            // such test.
            .with_initial(vec![10.0; 4])
            .build();

        let (_, value, status) = optimizer.find(Tolerances::default()).unwrap();

        assert!(status.is_converged());
        assert!(value <= 1e-12);
    }

    #[test]
    fn optimizer_custom() {
        let f = ExtendedRosenbrock::new(2);
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_algo(|f, dom| {
                let mut options = TronOptions::default();
                options.set_max_gp_iters(1);
                Tron::with_options(f, dom, options)
            })
            .with_initial(vec![-1.2, 1.0])
            .build();

        let tolerance = 1e-8;
        let (x, _, status) = optimizer
            .find(|state: &OptimizerIterState<'_, f64>| {
                if state.gnorm() <= tolerance {
                    Status::Converged(ConvergedReason::GradientAbs)
                } else if state.iter() >= 200 {
                    Status::Diverged(DivergedReason::MaxIterations)
                } else {
                    Status::Continue
                }
            })
            .unwrap();

        assert_eq!(status, Status::Converged(ConvergedReason::GradientAbs));
        assert!((x[0] - 1.0).abs() <= 1e-6);
        assert!((x[1] - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn optimizer_initial() {
        let x0 = vec![10.0; 4];

        let f = Sphere::new(4);
        let optimizer = OptimizerDriver::builder(&f)
            .with_initial(x0.clone())
            .build();

        assert_eq!(optimizer.x(), &x0);
        assert_eq!(optimizer.name(), "TRON");
        assert!(optimizer.report().is_none());
    }

    #[test]
    fn optimizer_initial_in_domain() {
        let f = WithDomain(Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0]));
        let optimizer = OptimizerDriver::builder(&f)
            .with_algo(|_, _| ())
            .with_initial(vec![10.0, -10.0])
            .build();

        assert_eq!(optimizer.x(), &[1.0, 0.0]);
    }

    #[test]
    fn optimizer_manual_iterations() {
        let f = Sphere::new(2);
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![3.0, -4.0])
            .build();

        let report = optimizer.next().unwrap();

        assert_eq!(optimizer.iter(), 1);
        assert!(report.fx < 25.0);
        assert_eq!(optimizer.fx(), report.fx);
        assert_eq!(optimizer.report(), Some(&report));

        optimizer.reset();
        assert_eq!(optimizer.iter(), 0);
        assert!(optimizer.report().is_none());
    }

    #[test]
    fn optimizer_bound_exhausted_and_dual() {
        let f = Boxed::new(Linear::new(vec![-1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![0.5])
            .build();

        let (x, fx, status) = optimizer.find(Tolerances::default()).unwrap();

        assert_eq!(x, &[1.0]);
        assert_eq!(fx, -1.0);
        assert_eq!(status, Status::Converged(ConvergedReason::BoundExhausted));

        let dual = optimizer.dual().unwrap();
        assert_eq!(dual.lower.as_slice(), &[1.0]);
        assert_eq!(dual.upper.as_slice(), &[-1.0]);
    }

    #[test]
    fn optimizer_iteration_budget() {
        let f = ExtendedRosenbrock::new(2);
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![-1.2, 1.0])
            .build();

        let mut tolerances = Tolerances::default();
        tolerances.set_max_iters(1).set_gatol(0.0).set_grtol(0.0);

        let (_, _, status) = optimizer.find(tolerances).unwrap();

        assert_eq!(status, Status::Diverged(DivergedReason::MaxIterations));
        assert_eq!(optimizer.iter(), 1);
    }

    // f(x) = x with a gradient claiming the opposite, so that the model never
    // agrees with the function.
    struct Backwards;

    impl Problem for Backwards {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::unconstrained(1)
        }
    }

    impl Function for Backwards {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            x[0]
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

    #[test]
    fn optimizer_stops_on_collapse() {
        let f = Backwards;
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![0.0])
            .build();

        let mut tolerances = Tolerances::default();
        tolerances.set_max_iters(10);

        let (x, fx, status) = optimizer.find(tolerances).unwrap();

        assert_eq!(x, &[0.0]);
        assert_eq!(fx, 0.0);
        assert!(matches!(
            status,
            Status::Diverged(DivergedReason::LineSearch(reason)) if !reason.is_success()
        ));

        let report = optimizer.report().unwrap();
        assert_eq!(report.outcome, StepOutcome::Collapsed);
        assert!(report.delta > 0.0 && report.delta <= 1e-30);
        assert!(optimizer.iter() < 10);
    }

    #[test]
    fn dual_requires_iteration() {
        let f = Boxed::new(Linear::new(vec![-1.0]), Domain::rect(vec![0.0], vec![1.0]));
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![0.5])
            .build();

        let mut tolerances = Tolerances::default();
        tolerances.set_max_iters(0);

        optimizer.find(tolerances).unwrap();
        assert!(optimizer.dual().is_err());

        optimizer.next().unwrap();
        assert!(optimizer.dual().is_ok());
    }
}
