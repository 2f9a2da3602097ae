//! Finite difference approximations of derivatives.
//!
//! These are used by the provided methods of [`Function`] when the function
//! implementation does not supply the gradient or the Hessian analytically.

use std::ops::Deref;

use nalgebra::{
    storage::{Storage, StorageMut},
    DimName, Dyn, IsContiguous, OMatrix, OVector, Vector, U1,
};

use crate::core::{Function, RealField};

/// Gradient vector of a function.
#[derive(Debug)]
pub struct Gradient<T: RealField> {
    grad: OVector<T, Dyn>,
}

impl<T: RealField> Gradient<T> {
    /// Initializes the gradient vector with zeros.
    pub fn zeros(dim: usize) -> Self {
        Self {
            grad: OVector::zeros_generic(Dyn(dim), U1::name()),
        }
    }

    /// Computes the gradient vector of the function in given point with given
    /// scale of variables. See [`compute`](Gradient::compute) for more
    /// details.
    pub fn new<F, Sx, Sscale>(
        f: &F,
        x: &mut Vector<T, Dyn, Sx>,
        scale: &Vector<T, Dyn, Sscale>,
        fx: T,
    ) -> Self
    where
        F: Function<Field = T>,
        Sx: StorageMut<T, Dyn> + IsContiguous,
        Sscale: Storage<T, Dyn>,
    {
        let mut grad = Self::zeros(x.nrows());
        grad.compute(f, x, scale, fx);
        grad
    }

    /// Computes the gradient vector of the function in given point with given
    /// scale of variables.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of the
    /// vector is exactly the same as before.
    ///
    /// Information about variable scale is useful for problematic cases of
    /// finite differentiation (e.g., when the value is near zero).
    pub fn compute<F, Sx, Sscale>(
        &mut self,
        f: &F,
        x: &mut Vector<T, Dyn, Sx>,
        scale: &Vector<T, Dyn, Sscale>,
        fx: T,
    ) -> &mut Self
    where
        F: Function<Field = T>,
        Sx: StorageMut<T, Dyn> + IsContiguous,
        Sscale: Storage<T, Dyn>,
    {
        let eps = T::EPSILON_SQRT;

        for i in 0..x.nrows() {
            let xi = x[i];
            let step = step_size(xi, scale[i], eps);

            // Update the point.
            x[i] = xi + step;
            let fxi = f.apply(x);

            // Compute the derivative approximation: grad[i] = (F(x + e_i * step_i) - F(x)) / step_i.
            self.grad[i] = (fxi - fx) / step;

            // Restore the original value.
            x[i] = xi;
        }

        self
    }
}

impl<T: RealField> Deref for Gradient<T> {
    type Target = OVector<T, Dyn>;

    fn deref(&self) -> &Self::Target {
        &self.grad
    }
}

/// Hessian matrix of a function.
#[derive(Debug)]
pub struct Hessian<T: RealField> {
    hes: OMatrix<T, Dyn, Dyn>,
    steps: OVector<T, Dyn>,
    neighbors: OVector<T, Dyn>,
}

impl<T: RealField> Hessian<T> {
    /// Initializes the Hessian matrix with zeros.
    pub fn zeros(dim: usize) -> Self {
        let dim = Dyn(dim);

        Self {
            hes: OMatrix::zeros_generic(dim, dim),
            steps: OVector::zeros_generic(dim, U1::name()),
            neighbors: OVector::zeros_generic(dim, U1::name()),
        }
    }

    /// Computes the Hessian matrix of the function in given point with given
    /// scale of variables. See [`compute`](Hessian::compute) for more
    /// details.
    pub fn new<F, Sx, Sscale>(
        f: &F,
        x: &mut Vector<T, Dyn, Sx>,
        scale: &Vector<T, Dyn, Sscale>,
        fx: T,
    ) -> Self
    where
        F: Function<Field = T>,
        Sx: StorageMut<T, Dyn> + IsContiguous,
        Sscale: Storage<T, Dyn>,
    {
        let mut hes = Self::zeros(x.nrows());
        hes.compute(f, x, scale, fx);
        hes
    }

    /// Computes the Hessian matrix of the function in given point with given
    /// scale of variables.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of the
    /// vector is exactly the same as before.
    pub fn compute<F, Sx, Sscale>(
        &mut self,
        f: &F,
        x: &mut Vector<T, Dyn, Sx>,
        scale: &Vector<T, Dyn, Sscale>,
        fx: T,
    ) -> &mut Self
    where
        F: Function<Field = T>,
        Sx: StorageMut<T, Dyn> + IsContiguous,
        Sscale: Storage<T, Dyn>,
    {
        let eps = T::EPSILON_CBRT;
        let n = x.nrows();

        for i in 0..n {
            let xi = x[i];
            let step = step_size(xi, scale[i], eps);

            // Store the step for Hessian calculation.
            self.steps[i] = step;

            // Update the point and store the function output.
            x[i] = xi + step;
            self.neighbors[i] = f.apply(x);

            // Restore the original value.
            x[i] = xi;
        }

        for i in 0..n {
            let xi = x[i];
            let stepi = self.steps[i];

            // Prepare x_i + 2 * e_i.
            x[i] = xi + stepi + stepi;

            let fxi = f.apply(x);
            let fni = self.neighbors[i];

            x[i] = xi + stepi;

            self.hes[(i, i)] = ((fx - fni) + (fxi - fni)) / (stepi * stepi);

            for j in (i + 1)..n {
                let xj = x[j];
                let stepj = self.steps[j];

                x[j] = xj + stepj;

                let fxj = f.apply(x);
                let fnj = self.neighbors[j];

                let hij = ((fx - fni) + (fxj - fnj)) / (stepi * stepj);
                self.hes[(i, j)] = hij;
                self.hes[(j, i)] = hij;

                x[j] = xj;
            }

            x[i] = xi;
        }

        self
    }
}

impl<T: RealField> Deref for Hessian<T> {
    type Target = OMatrix<T, Dyn, Dyn>;

    fn deref(&self) -> &Self::Target {
        &self.hes
    }
}

fn step_size<T: RealField>(xi: T, scale: T, eps: T) -> T {
    // Compute the step size. We would like to have the step as small as
    // possible (to be as close to the zero -- i.e., real derivative -- as
    // possible). But at the same time, very small step could cause
    // F(x + e_j * step_j) ~= F(x) with very small number of good digits.
    //
    // A reasonable way to balance these competing needs is to scale each
    // component by x_j itself. To avoid problems when x_j is close to zero, it
    // is modified to take the typical magnitude instead.
    let magnitude = T::one() / scale;
    let step = eps * xi.abs().max(magnitude) * T::one().copysign(xi);

    if step == T::zero() {
        eps
    } else {
        step
    }
}
