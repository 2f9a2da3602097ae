use nalgebra::{
    storage::{Storage, StorageMut},
    DimName, Dyn, IsContiguous, OMatrix, OVector, Vector, U1,
};
use num_traits::One;

use super::base::Problem;
use crate::derivatives::{Gradient, Hessian};

/// Definition of an objective function.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`] and [`Problem`] traits.
/// Only the function value is required. The gradient and the Hessian are
/// approximated by finite differences unless the implementation provides them.
///
/// ```rust
/// use tron::nalgebra as na;
/// use tron::{Domain, Function, Problem};
/// use na::{Dyn, IsContiguous};
///
/// struct Rosenbrock {
///     a: f64,
///     b: f64,
/// }
///
/// impl Problem for Rosenbrock {
///     type Field = f64;
///
///     fn domain(&self) -> Domain<Self::Field> {
///         Domain::rect(vec![-2.0, -2.0], vec![0.5, 2.0])
///     }
/// }
///
/// impl Function for Rosenbrock {
///     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
///     where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///     {
///         // Compute the function value.
///         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
///     }
/// }
/// ```
pub trait Function: Problem {
    /// Calculates the function value in given point.
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;

    /// Calculates the gradient in given point with the function value `fx`
    /// already known.
    ///
    /// The default implementation uses forward finite differences with the
    /// scale of the domain.
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: Self::Field,
        grad: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Self: Sized,
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let mut x = x.clone_owned();
        let scale = variable_scale(self, x.nrows());
        let approx = Gradient::new(self, &mut x, &scale, fx);
        grad.copy_from(&*approx);
    }

    /// Calculates the Hessian matrix in given point with the function value
    /// `fx` already known.
    ///
    /// The default implementation uses finite differences of function values
    /// with the scale of the domain.
    fn hessian<Sx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: Self::Field,
        hes: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Self: Sized,
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let mut x = x.clone_owned();
        let scale = variable_scale(self, x.nrows());
        let approx = Hessian::new(self, &mut x, &scale, fx);
        hes.copy_from(&*approx);
    }

    /// Calculates the matrix from which the preconditioner of the Newton
    /// system is built.
    ///
    /// Returns `false` if the function does not distinguish the
    /// preconditioning matrix from the Hessian, which is the default. In that
    /// case `pre` is left untouched and the Hessian is used instead.
    fn hessian_pre<Sx>(
        &self,
        _x: &Vector<Self::Field, Dyn, Sx>,
        _pre: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        false
    }
}

fn variable_scale<F: Problem>(f: &F, dim: usize) -> OVector<F::Field, Dyn> {
    f.domain()
        .scale()
        .cloned()
        .unwrap_or_else(|| OVector::from_element_generic(Dyn(dim), U1::name(), F::Field::one()))
}
