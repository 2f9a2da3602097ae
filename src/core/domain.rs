//! Problem domain definition (dimensionality, bound constraints).

use std::iter::FromIterator;

use na::{Dim, DimName};
use nalgebra as na;
use nalgebra::{
    storage::{Storage, StorageMut},
    OVector, Vector,
};
use thiserror::Error;

use crate::core::RealField;
use crate::subset::FreeSet;

/// Error returned when the bounds of a domain are inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Lower bound of a variable is greater than its upper bound.
    #[error("lower bound of variable {index} exceeds its upper bound")]
    InvertedBounds {
        /// Index of the offending variable.
        index: usize,
    },
}

/// Domain for a problem.
#[derive(Debug, Clone)]
pub struct Domain<T: RealField> {
    lower: OVector<T, na::Dyn>,
    upper: OVector<T, na::Dyn>,
    scale: Option<OVector<T, na::Dyn>>,
}

impl<T: RealField> Domain<T> {
    /// Creates unconstrained domain with given dimensionality.
    pub fn unconstrained(dim: usize) -> Self {
        assert!(dim > 0, "empty domain");

        let inf = T::from_subset(&f64::INFINITY);
        let n = na::Dyn(dim);
        let one = na::Const::<1>;

        Self {
            lower: OVector::from_iterator_generic(n, one, (0..dim).map(|_| -inf)),
            upper: OVector::from_iterator_generic(n, one, (0..dim).map(|_| inf)),
            scale: None,
        }
    }

    /// Creates rectangular domain with given lower and upper bounds.
    ///
    /// Positive and negative infinity can be used to indicate a value unbounded
    /// in that dimension and direction. If the entire domain is unconstrained,
    /// use [`Domain::unconstrained`] instead.
    ///
    /// The bounds are not validated here, inconsistent bounds are reported by
    /// [`Domain::check`] when an optimizer is set up.
    pub fn rect(lower: Vec<T>, upper: Vec<T>) -> Self {
        assert!(
            lower.len() == upper.len(),
            "lower and upper have different size"
        );

        let dim = lower.len();
        assert!(dim > 0, "empty domain");

        let one = T::one();
        let scale = lower
            .iter()
            .copied()
            .zip(upper.iter().copied())
            .map(|(l, u)| one / estimate_magnitude_from_bounds(l, u));

        let dim = na::Dyn(dim);
        let scale = OVector::from_iterator_generic(dim, na::U1::name(), scale);
        let lower = OVector::from_iterator_generic(dim, na::U1::name(), lower);
        let upper = OVector::from_iterator_generic(dim, na::U1::name(), upper);

        Self {
            lower,
            upper,
            scale: Some(scale),
        }
    }

    /// Sets a custom scale for the domain.
    ///
    /// Scale of a variable is the inverse of its expected magnitude. It is used
    /// for choosing the steps in finite difference approximations of
    /// derivatives.
    pub fn with_scale(mut self, scale: Vec<T>) -> Self {
        assert!(
            scale.len() == self.lower.nrows(),
            "scale has invalid dimension"
        );

        let dim = na::Dyn(self.lower.nrows());
        let scale = OVector::from_iterator_generic(dim, na::U1::name(), scale);

        self.scale = Some(scale);
        self
    }

    /// Gets the dimensionality of the domain.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Gets the lower bounds.
    pub fn lower(&self) -> &OVector<T, na::Dyn> {
        &self.lower
    }

    /// Gets the upper bounds.
    pub fn upper(&self) -> &OVector<T, na::Dyn> {
        &self.upper
    }

    /// Gets the scale if available.
    ///
    /// Scale can be either provided by [`Domain::with_scale`] or estimated for
    /// a constrained domain. If there is no reliable way to estimate the scale
    /// (for unconstrained problem), `None` is returned.
    pub fn scale(&self) -> Option<&OVector<T, na::Dyn>> {
        self.scale.as_ref()
    }

    /// Checks that no lower bound exceeds the corresponding upper bound.
    pub fn check(&self) -> Result<(), DomainError> {
        match self
            .lower
            .iter()
            .zip(self.upper.iter())
            .position(|(li, ui)| li > ui)
        {
            Some(index) => Err(DomainError::InvertedBounds { index }),
            None => Ok(()),
        }
    }

    /// Projects given point into the domain.
    ///
    /// Returns `true` if the point was not feasible before the projection.
    pub fn project<D, Sx>(&self, x: &mut Vector<T, D, Sx>) -> bool
    where
        D: Dim,
        Sx: StorageMut<T, D>,
    {
        let mut not_feasible = false;

        self.lower
            .iter()
            .zip(self.upper.iter())
            .zip(x.iter_mut())
            .for_each(|((li, ui), xi)| {
                if &*xi < li {
                    *xi = *li;
                    not_feasible = true;
                } else if &*xi > ui {
                    *xi = *ui;
                    not_feasible = true;
                }
            });

        not_feasible
    }

    /// Projects given point into the domain in given dimension.
    pub fn project_in<D, Sx>(&self, x: &mut Vector<T, D, Sx>, i: usize) -> bool
    where
        D: Dim,
        Sx: StorageMut<T, D>,
    {
        let li = self.lower[(i, 0)];
        let ui = self.upper[(i, 0)];
        let xi = &mut x[(i, 0)];

        if *xi < li {
            *xi = li;
            true
        } else if *xi > ui {
            *xi = ui;
            true
        } else {
            false
        }
    }

    /// Identifies the variables that are strictly inside their bounds.
    ///
    /// A variable at (or beyond) one of its bounds is never free.
    pub fn free_set<D, Sx>(&self, x: &Vector<T, D, Sx>) -> Result<FreeSet, DomainError>
    where
        D: Dim,
        Sx: Storage<T, D>,
    {
        self.check()?;

        Ok(FreeSet::from_predicate(self.dim(), |i| {
            let xi = x[(i, 0)];
            self.lower[i] < xi && xi < self.upper[i]
        }))
    }

    /// Computes the projection of the gradient `grad` in point `x`.
    ///
    /// A gradient component is zeroed if the variable is at its lower bound
    /// and the gradient is positive, or if it is at its upper bound and the
    /// gradient is negative. Decreasing the function along such component
    /// would leave the domain.
    pub fn bound_gradient_projection<D, Sx, Sg, Spg>(
        &self,
        x: &Vector<T, D, Sx>,
        grad: &Vector<T, D, Sg>,
        pg: &mut Vector<T, D, Spg>,
    ) where
        D: Dim,
        Sx: Storage<T, D>,
        Sg: Storage<T, D>,
        Spg: StorageMut<T, D>,
    {
        let zero = T::zero();

        for i in 0..self.dim() {
            let xi = x[(i, 0)];
            let gi = grad[(i, 0)];

            let blocked =
                (xi == self.lower[i] && gi > zero) || (xi == self.upper[i] && gi < zero);

            pg[(i, 0)] = if blocked { zero } else { gi };
        }
    }
}

impl<T: RealField> FromIterator<(T, T)> for Domain<T> {
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let (lower, upper): (Vec<_>, Vec<_>) = iter.into_iter().unzip();
        Self::rect(lower, upper)
    }
}

impl<T: RealField> FromIterator<T> for Domain<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let one = T::from_subset(&1.0);
        let scale = iter
            .into_iter()
            .map(|magnitude| one / magnitude)
            .collect::<Vec<_>>();

        Self::unconstrained(scale.len()).with_scale(scale)
    }
}

/// Estimates magnitude of the variable given lower and upper bounds.
fn estimate_magnitude_from_bounds<T: RealField>(lower: T, upper: T) -> T {
    let ten = T::from_subset(&10.0);
    let half = T::from_subset(&0.5);

    let avg = half * (lower.abs() + upper.abs());
    let magnitude = ten.powf(avg.abs().log10().trunc());

    // For [0, 0] range or infinite bounds, the computed magnitude is
    // undefined.
    if magnitude.is_finite() && magnitude > T::zero() {
        magnitude
    } else {
        T::one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    fn unit_box() -> Domain<f64> {
        [(-1.0, 1.0), (0.0, 2.0), (-3.0, 3.0)].into_iter().collect()
    }

    #[test]
    fn projection_clamps() {
        let dom = unit_box();
        let mut x = dvector![-5.0, 1.0, 10.0];

        assert!(dom.project(&mut x));
        assert_eq!(x, dvector![-1.0, 1.0, 3.0]);
    }

    #[test]
    fn projection_is_idempotent() {
        let dom = unit_box();

        for x in [
            dvector![-5.0, 1.0, 10.0],
            dvector![0.5, -0.1, 3.0],
            dvector![1.0, 2.0, -3.0],
        ] {
            let mut once = x.clone();
            dom.project(&mut once);

            let mut twice = once.clone();
            assert!(!dom.project(&mut twice));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn free_set_excludes_boundary() {
        let dom = unit_box();
        let x = dvector![-1.0, 1.0, 3.0];

        let free = dom.free_set(&x).unwrap();
        assert_eq!(free.indices(), &[1]);
        assert!(!free.contains(0));
        assert!(!free.contains(2));
    }

    #[test]
    fn free_set_unconstrained() {
        let dom = Domain::unconstrained(4);
        let x = dvector![1e300, -1e300, 0.0, 1.0];

        assert_eq!(dom.free_set(&x).unwrap().len(), 4);
    }

    #[test]
    fn fixed_variable_is_never_free() {
        let dom: Domain<f64> = [(2.0, 2.0)].into_iter().collect();
        let x = dvector![2.0];

        assert!(dom.free_set(&x).unwrap().is_empty());
    }

    #[test]
    fn inverted_bounds() {
        let dom: Domain<f64> = [(0.0, 1.0), (2.0, 1.0)].into_iter().collect();
        let x = dvector![0.5, 1.5];

        assert_eq!(
            dom.free_set(&x),
            Err(DomainError::InvertedBounds { index: 1 })
        );
        assert!(dom.check().is_err());
    }

    #[test]
    fn gradient_projection_zeroes_blocked_components() {
        let dom = unit_box();
        let x = dvector![-1.0, 2.0, 0.0];
        let mut pg = dvector![0.0, 0.0, 0.0];

        // Lower bound with positive gradient, upper bound with negative
        // gradient.
        dom.bound_gradient_projection(&x, &dvector![3.0, -2.0, 1.0], &mut pg);
        assert_eq!(pg, dvector![0.0, 0.0, 1.0]);

        // Gradients pointing into the domain are kept.
        dom.bound_gradient_projection(&x, &dvector![-3.0, 2.0, -1.0], &mut pg);
        assert_eq!(pg, dvector![-3.0, 2.0, -1.0]);
    }

    #[test]
    fn scale_estimated_from_bounds() {
        let dom: Domain<f64> = [(-100.0, 100.0), (0.0, 0.0)].into_iter().collect();
        let scale = dom.scale().unwrap();

        assert_eq!(scale[0], 0.01);
        assert_eq!(scale[1], 1.0);
    }
}
