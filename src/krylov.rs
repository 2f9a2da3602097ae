//! Truncated Krylov solvers for linear systems constrained by a radius.
//!
//! The Newton correction of a trust region method solves `H dx = rhs` only
//! approximately and never leaves the ball of given radius. This is the job of
//! the [`RadiusSolver`] interface, implemented by [`SteihaugCg`].
//!
//! # References
//!
//! \[1\] [The Conjugate Gradient Method and Trust Regions in Large Scale
//! Optimization](https://epubs.siam.org/doi/10.1137/0720042)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, DimName, Dyn, OMatrix, OVector, U1};

use crate::core::RealField;

/// Reason why a radius-constrained solve terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgReason {
    /// Residual dropped below the tolerance.
    Converged,
    /// The iterate reached the boundary of the radius.
    Boundary,
    /// Direction of non-positive curvature was followed to the boundary.
    NegativeCurvature,
    /// Maximum number of iterations was reached.
    MaxIterations,
}

/// Result of a radius-constrained solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOutcome<T> {
    /// Number of iterations performed.
    pub iterations: usize,
    /// Termination reason.
    pub reason: CgReason,
    /// Euclidean norm of the computed solution.
    pub norm: T,
}

/// Interface of a linear solver whose solution is constrained by a radius.
pub trait RadiusSolver<T: RealField> {
    /// (Re)creates the internal state for systems of given dimension.
    fn setup(&mut self, dim: usize);

    /// Approximately solves `hes sol = rhs` subject to `|| sol || <= radius`,
    /// using `pre` for building the preconditioner.
    fn solve(
        &mut self,
        hes: &OMatrix<T, Dyn, Dyn>,
        pre: &OMatrix<T, Dyn, Dyn>,
        rhs: &OVector<T, Dyn>,
        radius: T,
        sol: &mut OVector<T, Dyn>,
    ) -> CgOutcome<T>;
}

/// Options for [`SteihaugCg`] solver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct SteihaugCgOptions<T: RealField> {
    /// Relative tolerance on the residual norm. Default: `1e-5`.
    rtol: T,
    /// Absolute tolerance on the residual norm. Default: `1e-50`.
    atol: T,
    /// Maximum number of iterations. Default: `10000`.
    max_iters: usize,
}

impl<T: RealField> Default for SteihaugCgOptions<T> {
    fn default() -> Self {
        Self {
            rtol: convert(1e-5),
            atol: convert(1e-50),
            max_iters: 10000,
        }
    }
}

/// Steihaug-Toint truncated conjugate gradients with Jacobi preconditioner.
///
/// Starting from zero, the conjugate gradient iterates are monotonically
/// improving the quadratic model `1/2 dx^T H dx - rhs^T dx`. The iteration
/// stops when the residual is small enough, when the next iterate would leave
/// the ball of given radius or when a direction of non-positive curvature is
/// encountered. In the last two cases, the solution is extended to the
/// boundary.
#[derive(Debug, Clone)]
pub struct SteihaugCg<T: RealField> {
    options: SteihaugCgOptions<T>,
    r: OVector<T, Dyn>,
    z: OVector<T, Dyn>,
    p: OVector<T, Dyn>,
    hp: OVector<T, Dyn>,
    diag_inv: OVector<T, Dyn>,
}

impl<T: RealField> SteihaugCg<T> {
    /// Initializes the solver with default options.
    pub fn new() -> Self {
        Self::with_options(SteihaugCgOptions::default())
    }

    /// Initializes the solver with given options.
    pub fn with_options(options: SteihaugCgOptions<T>) -> Self {
        Self {
            options,
            r: OVector::zeros_generic(Dyn(0), U1::name()),
            z: OVector::zeros_generic(Dyn(0), U1::name()),
            p: OVector::zeros_generic(Dyn(0), U1::name()),
            hp: OVector::zeros_generic(Dyn(0), U1::name()),
            diag_inv: OVector::zeros_generic(Dyn(0), U1::name()),
        }
    }

    /// Gets the options.
    pub fn options(&self) -> &SteihaugCgOptions<T> {
        &self.options
    }
}

impl<T: RealField> Default for SteihaugCg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField> RadiusSolver<T> for SteihaugCg<T> {
    fn setup(&mut self, dim: usize) {
        let dim = Dyn(dim);

        self.r = OVector::zeros_generic(dim, U1::name());
        self.z = OVector::zeros_generic(dim, U1::name());
        self.p = OVector::zeros_generic(dim, U1::name());
        self.hp = OVector::zeros_generic(dim, U1::name());
        self.diag_inv = OVector::zeros_generic(dim, U1::name());
    }

    fn solve(
        &mut self,
        hes: &OMatrix<T, Dyn, Dyn>,
        pre: &OMatrix<T, Dyn, Dyn>,
        rhs: &OVector<T, Dyn>,
        radius: T,
        sol: &mut OVector<T, Dyn>,
    ) -> CgOutcome<T> {
        if self.r.nrows() != rhs.nrows() {
            self.setup(rhs.nrows());
        }

        let SteihaugCgOptions {
            rtol,
            atol,
            max_iters,
        } = self.options;

        let Self {
            r,
            z,
            p,
            hp,
            diag_inv,
            ..
        } = self;

        let zero = T::zero();
        let one = T::one();

        // Jacobi preconditioner. Non-positive diagonal entries are not usable
        // for scaling, these components are left unpreconditioned.
        for (i, di) in diag_inv.iter_mut().enumerate() {
            let d = pre[(i, i)];
            *di = if d > zero { one / d } else { one };
        }

        sol.fill(zero);
        r.copy_from(rhs);

        let r0_norm = r.norm();
        let tol = (rtol * r0_norm).max(atol);

        if r0_norm <= tol {
            debug!("right-hand side is negligible (|| r || = {})", r0_norm);
            return CgOutcome {
                iterations: 0,
                reason: CgReason::Converged,
                norm: zero,
            };
        }

        z.copy_from(r);
        z.component_mul_assign(diag_inv);
        p.copy_from(z);
        let mut rz = r.dot(z);

        for k in 0..max_iters {
            hes.mul_to(p, hp);
            let curvature = p.dot(hp);

            if curvature <= zero {
                let tau = boundary_step(sol, p, radius);
                sol.axpy(tau, p, one);
                debug!(
                    "negative curvature ({}) in iteration {}, step to the boundary (tau = {})",
                    curvature,
                    k + 1,
                    tau
                );

                return CgOutcome {
                    iterations: k + 1,
                    reason: CgReason::NegativeCurvature,
                    norm: sol.norm(),
                };
            }

            let alpha = rz / curvature;

            // Norm of sol + alpha p without forming the vector.
            let sp = sol.dot(p);
            let pp = p.norm_squared();
            let ss = sol.norm_squared();
            let next_norm2 = ss + (sp + sp) * alpha + pp * alpha * alpha;

            if next_norm2 >= radius * radius {
                let tau = boundary_step(sol, p, radius);
                sol.axpy(tau, p, one);
                debug!(
                    "trust region boundary reached in iteration {} (tau = {})",
                    k + 1,
                    tau
                );

                return CgOutcome {
                    iterations: k + 1,
                    reason: CgReason::Boundary,
                    norm: sol.norm(),
                };
            }

            sol.axpy(alpha, p, one);
            r.axpy(-alpha, hp, one);

            let r_norm = r.norm();
            if r_norm <= tol {
                debug!(
                    "converged in iteration {} (|| r || = {})",
                    k + 1,
                    r_norm
                );

                return CgOutcome {
                    iterations: k + 1,
                    reason: CgReason::Converged,
                    norm: sol.norm(),
                };
            }

            z.copy_from(r);
            z.component_mul_assign(diag_inv);
            let rz_next = r.dot(z);
            let beta = rz_next / rz;
            rz = rz_next;

            // p = z + beta p
            p.axpy(one, z, beta);
        }

        debug!("maximum number of iterations ({}) reached", max_iters);

        CgOutcome {
            iterations: max_iters,
            reason: CgReason::MaxIterations,
            norm: sol.norm(),
        }
    }
}

/// Computes tau >= 0 such that || s + tau p || = radius.
fn boundary_step<T: RealField>(s: &OVector<T, Dyn>, p: &OVector<T, Dyn>, radius: T) -> T {
    // We need to find tau such that || s + tau p ||^2 - radius^2 = 0. For
    // equation a tau^2 + 2b tau + c = 0, we get:
    //
    //     a = || p ||^2
    //     b = s^T p
    //     c = || s ||^2 - radius^2
    //
    // Since s is inside the ball, c is nonpositive and the polynomial has one
    // nonpositive and one nonnegative root. We seek for the latter:
    //
    //     tau = (-b + sqrt(b^2 - ac)) / a
    //
    // For slightly better numerical accuracy, we will avoid some subtractions
    // (possible catastrophic cancellation) by computing -c and using Muller's
    // formula for b > 0.
    let zero = T::zero();

    let a = p.norm_squared();
    if a == zero {
        return zero;
    }

    let b = s.dot(p);
    let c_neg = (radius * radius - s.norm_squared()).max(zero);

    #[allow(clippy::suspicious_operation_groupings)]
    let d = (b * b + a * c_neg).sqrt();

    if b <= zero {
        (-b + d) / a
    } else if b + d > zero {
        c_neg / (b + d)
    } else {
        zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    fn solve(
        hes: &OMatrix<f64, Dyn, Dyn>,
        rhs: &OVector<f64, Dyn>,
        radius: f64,
    ) -> (OVector<f64, Dyn>, CgOutcome<f64>) {
        let mut cg = SteihaugCg::new();
        cg.setup(rhs.nrows());

        let mut sol = rhs.clone();
        let outcome = cg.solve(hes, hes, rhs, radius, &mut sol);
        (sol, outcome)
    }

    #[test]
    fn converges_inside_radius() {
        let hes = dmatrix![4.0, 1.0; 1.0, 3.0];
        let rhs = dvector![1.0, 2.0];

        let (sol, outcome) = solve(&hes, &rhs, 100.0);

        assert_eq!(outcome.reason, CgReason::Converged);
        assert!(outcome.iterations <= 2);
        assert_abs_diff_eq!(&hes * &sol, rhs, epsilon = 1e-5);
    }

    #[test]
    fn stops_on_boundary() {
        let hes = dmatrix![4.0, 1.0; 1.0, 3.0];
        let rhs = dvector![10.0, 20.0];

        let (sol, outcome) = solve(&hes, &rhs, 0.5);

        assert_eq!(outcome.reason, CgReason::Boundary);
        assert_abs_diff_eq!(sol.norm(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.norm, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn negative_curvature_goes_to_boundary() {
        let hes = dmatrix![-1.0, 0.0; 0.0, -2.0];
        let rhs = dvector![1.0, 1.0];

        let (sol, outcome) = solve(&hes, &rhs, 2.0);

        assert_eq!(outcome.reason, CgReason::NegativeCurvature);
        assert_eq!(outcome.iterations, 1);
        assert_abs_diff_eq!(sol.norm(), 2.0, epsilon = 1e-12);
        // The boundary step follows the preconditioned residual, i.e., the
        // right-hand side itself for non-positive diagonal.
        assert!(sol[0] > 0.0 && sol[1] > 0.0);
    }

    #[test]
    fn zero_rhs() {
        let hes = dmatrix![2.0, 0.0; 0.0, 2.0];
        let rhs = dvector![0.0, 0.0];

        let (sol, outcome) = solve(&hes, &rhs, 1.0);

        assert_eq!(outcome.reason, CgReason::Converged);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(sol, dvector![0.0, 0.0]);
    }

    #[test]
    fn jacobi_solves_diagonal_in_one_iteration() {
        let hes = dmatrix![
            100.0, 0.0, 0.0;
            0.0, 1.0, 0.0;
            0.0, 0.0, 0.01
        ];
        let rhs = dvector![1.0, 1.0, 1.0];

        let (sol, outcome) = solve(&hes, &rhs, 1e3);

        assert_eq!(outcome.reason, CgReason::Converged);
        assert_eq!(outcome.iterations, 1);
        assert_abs_diff_eq!(sol, dvector![0.01, 1.0, 100.0], epsilon = 1e-9);
    }

    #[test]
    fn boundary_step_from_inside() {
        let s = dvector![0.0, 0.0];
        let p = dvector![3.0, 4.0];
        assert_abs_diff_eq!(boundary_step(&s, &p, 10.0), 2.0, epsilon = 1e-12);

        let s = dvector![1.0, 0.0];
        let p = dvector![1.0, 0.0];
        assert_abs_diff_eq!(boundary_step(&s, &p, 2.0), 1.0, epsilon = 1e-12);

        let s = dvector![1.0, 0.0];
        let p = dvector![-1.0, 0.0];
        assert_abs_diff_eq!(boundary_step(&s, &p, 2.0), 3.0, epsilon = 1e-12);
    }
}
