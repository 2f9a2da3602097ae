//! Test functions and utilities useful for benchmarking, debugging and smoke
//! testing.
//!
//! [`ExtendedRosenbrock`] and [`Sphere`] are recommended for first tests.
//! [`Quadratic`] has an exact quadratic model, [`Linear`] is unbounded below
//! and makes sense only with bounds provided by [`Boxed`].
//!
//! All functions here provide analytic gradients and Hessians.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use std::error::Error as StdError;

use nalgebra::{
    storage::{Storage, StorageMut},
    DMatrix, DVector, Dyn, IsContiguous, OMatrix, OVector, Vector,
};
use thiserror::Error;

use crate::core::{Domain, Function, Iterate, Optimizer, Problem};

/// Extension of the [`Problem`] trait that provides additional information
/// that is useful for testing optimizers.
pub trait TestProblem: Problem {
    /// Standard initial values for the problem. Using the same initial values is
    /// essential for fair comparison of methods.
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>>;
}

/// Extension of the [`Function`] trait that provides additional information
/// that is useful for testing optimizers.
pub trait TestFunction: Function + TestProblem {
    /// A set of optima in the domain (if known and finite). This is mostly
    /// just for information, for example to know how close an optimizer got
    /// even if it failed. For testing if a given point is optimum,
    /// [`TestFunction::is_optimum`] should be used.
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        Vec::new()
    }

    /// Test if given point is an optimum of the function, given the tolerance
    /// `eps`.
    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] (also
/// known as Rosenbrock's valley or banana function).
///
/// The global minimum is inside a long, narrow, parabolic shaped flat valley.
/// The challenge is to find the solution inside the valley.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
    alpha: f64,
}

impl ExtendedRosenbrock {
    /// Initializes the function with given dimension.
    ///
    /// The dimension **must** be a multiplier of 2.
    pub fn new(n: usize) -> Self {
        Self::with_scaling(n, 1.0)
    }

    /// Initializes the function with given dimension and scaling factor.
    ///
    /// The dimension **must** be a multiplier of 2. The higher the scaling
    /// factor is, the more difficult the problem is.
    pub fn with_scaling(n: usize, alpha: f64) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 2 == 0, "n must be a multiple of 2");
        assert!(alpha > 0.0, "alpha must be greater than zero");
        Self { n, alpha }
    }

    fn residuals<'a, Sx>(
        &self,
        x: &'a Vector<f64, Dyn, Sx>,
    ) -> impl Iterator<Item = (f64, f64)> + 'a
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        let alpha = self.alpha;
        (0..(self.n / 2)).map(move |i| {
            let x1 = x[2 * i] * alpha;
            let x2 = x[2 * i + 1] / alpha;

            (10.0 * (x2 - x1 * x1), 1.0 - x1)
        })
    }
}

impl Default for ExtendedRosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for ExtendedRosenbrock {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        (0..self.n)
            .map(|i| {
                if i % 2 == 0 {
                    self.alpha
                } else {
                    1.0 / self.alpha
                }
            })
            .collect()
    }
}

impl Function for ExtendedRosenbrock {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.residuals(x).map(|(r1, r2)| r1 * r1 + r2 * r2).sum()
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        grad: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let alpha = self.alpha;

        for (i, (r1, r2)) in self.residuals(x).enumerate() {
            let x1 = x[2 * i] * alpha;

            grad[2 * i] = -40.0 * alpha * x1 * r1 - 2.0 * alpha * r2;
            grad[2 * i + 1] = 20.0 * r1 / alpha;
        }
    }

    fn hessian<Sx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let alpha = self.alpha;
        hes.fill(0.0);

        for (i, (r1, _)) in self.residuals(x).enumerate() {
            let a = 2 * i;
            let b = 2 * i + 1;
            let x1 = x[a] * alpha;

            hes[(a, a)] = 2.0 * ((20.0 * alpha * x1).powi(2) + alpha * alpha)
                - 40.0 * alpha * alpha * r1;
            hes[(a, b)] = -400.0 * x1;
            hes[(b, a)] = -400.0 * x1;
            hes[(b, b)] = 200.0 / (alpha * alpha);
        }
    }
}

impl TestProblem for ExtendedRosenbrock {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init1 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        let init2 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 6.39 } else { -0.221 }),
        );

        vec![init1, init2]
    }
}

impl TestFunction for ExtendedRosenbrock {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let alpha = self.alpha;
        let optimum = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 1.0 / alpha } else { alpha }),
        );
        vec![optimum]
    }

    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.apply(x).abs() <= eps
    }
}

/// [Sphere
/// function](https://en.wikipedia.org/wiki/Test_functions_for_optimization)
/// \[1\].
///
/// This is a simple paraboloid which can be used in early development and
/// sanity checking as it can be considered a trivial problem.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the function with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.n)
    }
}

impl Function for Sphere {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x.norm_squared()
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        grad: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        grad.zip_apply(x, |gi, xi| *gi = 2.0 * xi);
    }

    fn hessian<Sx>(
        &self,
        _x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        hes.fill_with_identity();
        *hes *= 2.0;
    }
}

impl TestProblem for Sphere {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }),
        );

        vec![init]
    }
}

impl TestFunction for Sphere {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 0.0)]
    }

    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.apply(x).abs() <= eps
    }
}

/// Quadratic function `f(x) = 1/2 x^T A x - b^T x`.
///
/// For symmetric positive definite `A`, the quadratic model built from the
/// gradient and the Hessian is exact and the unconstrained minimizer is the
/// solution of `A x = b`.
#[derive(Debug, Clone)]
pub struct Quadratic {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl Quadratic {
    /// Initializes the function with given matrix and vector.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Self {
        assert!(a.is_square(), "matrix must be square");
        assert!(a.nrows() == b.nrows(), "matrix and vector size mismatch");
        assert!(a.nrows() > 0, "empty problem");
        Self { a, b }
    }
}

impl Problem for Quadratic {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.b.nrows())
    }
}

impl Function for Quadratic {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        0.5 * x.dot(&(&self.a * x)) - self.b.dot(x)
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        grad: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        self.a.mul_to(x, grad);
        *grad -= &self.b;
    }

    fn hessian<Sx>(
        &self,
        _x: &Vector<Self::Field, Dyn, Sx>,
        _fx: Self::Field,
        hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        hes.copy_from(&self.a);
    }
}

impl TestProblem for Quadratic {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.b.nrows())]
    }
}

impl TestFunction for Quadratic {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        self.a
            .clone()
            .lu()
            .solve(&self.b)
            .into_iter()
            .collect()
    }

    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        (&self.a * x - &self.b).norm() <= eps
    }
}

/// Linear function `f(x) = c^T x`.
///
/// It has no minimum in an unconstrained domain, use it with bounds (see
/// [`Boxed`]).
#[derive(Debug, Clone)]
pub struct Linear {
    c: DVector<f64>,
}

impl Linear {
    /// Initializes the function with given coefficients.
    pub fn new(c: Vec<f64>) -> Self {
        assert!(!c.is_empty(), "empty problem");
        Self {
            c: DVector::from_vec(c),
        }
    }
}

impl Problem for Linear {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.c.nrows())
    }
}

impl Function for Linear {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.c.dot(x)
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
        grad.copy_from(&self.c);
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

/// Wrapper that replaces the domain of a function, typically to add bounds.
#[derive(Debug, Clone)]
pub struct Boxed<F: Problem> {
    f: F,
    dom: Domain<F::Field>,
}

impl<F: Problem> Boxed<F> {
    /// Wraps the function with given domain.
    pub fn new(f: F, dom: Domain<F::Field>) -> Self {
        Self { f, dom }
    }

    /// Gets the wrapped function.
    pub fn inner(&self) -> &F {
        &self.f
    }
}

impl<F: Problem> Problem for Boxed<F> {
    type Field = F::Field;

    fn domain(&self) -> Domain<Self::Field> {
        self.dom.clone()
    }
}

impl<F: Function> Function for Boxed<F> {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.f.apply(x)
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: Self::Field,
        grad: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        self.f.gradient(x, fx, grad)
    }

    fn hessian<Sx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: Self::Field,
        hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.f.hessian(x, fx, hes)
    }

    fn hessian_pre<Sx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        pre: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.f.hessian_pre(x, pre)
    }
}

impl<F: TestProblem> TestProblem for Boxed<F> {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        self.f
            .initials()
            .into_iter()
            .map(|mut x| {
                self.dom.project(&mut x);
                x
            })
            .collect()
    }
}

/// Optimization error of the testing optimizer driver (see [`optimize`]).
#[derive(Debug, Error)]
pub enum TestingError<E: StdError + 'static> {
    /// Error of the optimizer used.
    #[error("{0}")]
    Inner(#[from] E),
    /// Optimizer did not terminate.
    #[error("optimizer did not terminate")]
    Termination,
}

/// A simple optimizer driver that can be used in tests.
///
/// Runs the optimizer until the function value gets within `tolerance` from
/// given minimum `min`.
pub fn optimize<F: Function, O: Optimizer<F>>(
    f: &F,
    dom: &Domain<F::Field>,
    mut optimizer: O,
    x: OVector<F::Field, Dyn>,
    min: F::Field,
    max_iters: usize,
    tolerance: F::Field,
) -> Result<OVector<F::Field, Dyn>, TestingError<O::Error>>
where
    O::Error: StdError,
{
    let mut it = Iterate::new(x);
    let mut report = optimizer.setup(f, dom, &mut it)?;
    let mut iter = 0;

    loop {
        if report.fx <= min + tolerance {
            // Converged.
            return Ok(it.x);
        }

        if iter == max_iters {
            return Err(TestingError::Termination);
        } else {
            iter += 1;
        }

        report = optimizer.opt_next(f, dom, &mut it)?;
    }
}
