//! Free variable subsets and reduced linear systems.
//!
//! The Newton step of a bound-constrained method is computed only in the
//! subspace of *free* variables, i.e., variables strictly inside their bounds.
//! [`FreeSet`] describes this subspace and provides the scatter/gather maps
//! between the full and the reduced space. [`ReducedSystem`] restricts the
//! Hessian and the gradient to the free subspace using one of the strategies
//! in [`SubsetType`].

use std::{fmt, str::FromStr};

use log::debug;
use nalgebra::{
    storage::{Storage, StorageMut},
    DimName, Dyn, OMatrix, OVector, Vector, U1,
};

use crate::core::RealField;

/// Set of indices of free variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSet {
    indices: Vec<usize>,
    dim: usize,
}

impl FreeSet {
    /// Creates the set from a predicate evaluated for each index in `0..dim`.
    pub fn from_predicate<P>(dim: usize, mut is_free: P) -> Self
    where
        P: FnMut(usize) -> bool,
    {
        Self {
            indices: (0..dim).filter(|&i| is_free(i)).collect(),
            dim,
        }
    }

    /// Creates the set of all indices in `0..dim`.
    pub fn full(dim: usize) -> Self {
        Self::from_predicate(dim, |_| true)
    }

    /// Gets the number of free variables.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Determines whether there are no free variables.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Gets the dimensionality of the full space.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Gets the sorted indices of free variables.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Determines whether given variable is free.
    pub fn contains(&self, i: usize) -> bool {
        self.indices.binary_search(&i).is_ok()
    }

    /// Gathers the free components of a full-space vector into a reduced
    /// vector.
    pub fn gather<T, Sf, Sr>(&self, full: &Vector<T, Dyn, Sf>, reduced: &mut Vector<T, Dyn, Sr>)
    where
        T: RealField,
        Sf: Storage<T, Dyn>,
        Sr: StorageMut<T, Dyn>,
    {
        assert!(reduced.nrows() == self.len(), "reduced vector size mismatch");

        for (k, &i) in self.indices.iter().enumerate() {
            reduced[k] = full[i];
        }
    }

    /// Scatters a reduced vector into a full-space vector. Components that are
    /// not free are set to zero.
    pub fn scatter<T, Sr, Sf>(&self, reduced: &Vector<T, Dyn, Sr>, full: &mut Vector<T, Dyn, Sf>)
    where
        T: RealField,
        Sr: Storage<T, Dyn>,
        Sf: StorageMut<T, Dyn>,
    {
        assert!(reduced.nrows() == self.len(), "reduced vector size mismatch");

        full.fill(T::zero());
        for (k, &i) in self.indices.iter().enumerate() {
            full[i] = reduced[k];
        }
    }

    /// Extracts the free rows and columns of a full-space matrix.
    pub fn gather_matrix<T: RealField>(
        &self,
        full: &OMatrix<T, Dyn, Dyn>,
        reduced: &mut OMatrix<T, Dyn, Dyn>,
    ) {
        assert!(
            reduced.nrows() == self.len() && reduced.ncols() == self.len(),
            "reduced matrix size mismatch"
        );

        for (kj, &j) in self.indices.iter().enumerate() {
            for (ki, &i) in self.indices.iter().enumerate() {
                reduced[(ki, kj)] = full[(i, j)];
            }
        }
    }
}

/// Strategy for restricting the linear system to the free variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsetType {
    /// Extract the free rows and columns into a smaller system.
    #[default]
    Submatrix,
    /// Keep the full dimension, replacing the rows and columns of bound
    /// variables by identity and zeroing their right-hand side.
    Mask,
}

impl fmt::Display for SubsetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsetType::Submatrix => f.write_str("submat"),
            SubsetType::Mask => f.write_str("mask"),
        }
    }
}

/// Error returned when parsing unknown [`SubsetType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subset type `{0}` (expected `submat` or `mask`)")]
pub struct ParseSubsetTypeError(String);

impl FromStr for SubsetType {
    type Err = ParseSubsetTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submat" => Ok(SubsetType::Submatrix),
            "mask" => Ok(SubsetType::Mask),
            other => Err(ParseSubsetTypeError(other.to_string())),
        }
    }
}

/// Linear system restricted to the free variables.
///
/// The system is `H|free dx = -g|free`. The dense storage is kept between
/// assemblies and reallocated only when the size of the free set changes.
#[derive(Debug)]
pub struct ReducedSystem<T: RealField> {
    subset_type: SubsetType,
    hes: OMatrix<T, Dyn, Dyn>,
    hes_pre: Option<OMatrix<T, Dyn, Dyn>>,
    rhs: OVector<T, Dyn>,
    sol: OVector<T, Dyn>,
    built_for: Option<usize>,
}

impl<T: RealField> ReducedSystem<T> {
    /// Creates an empty system using given strategy.
    pub fn new(subset_type: SubsetType) -> Self {
        Self {
            subset_type,
            hes: OMatrix::zeros_generic(Dyn(0), Dyn(0)),
            hes_pre: None,
            rhs: OVector::zeros_generic(Dyn(0), U1::name()),
            sol: OVector::zeros_generic(Dyn(0), U1::name()),
            built_for: None,
        }
    }

    /// Gets the strategy used for the restriction.
    pub fn subset_type(&self) -> SubsetType {
        self.subset_type
    }

    /// Gets the size of the free set the system was last assembled for.
    pub fn built_for(&self) -> Option<usize> {
        self.built_for
    }

    /// Forgets the cached free set size so that the next assembly is treated
    /// as the first one.
    pub fn invalidate(&mut self) {
        self.built_for = None;
    }

    /// Assembles the reduced system for given free set, Hessian, optional
    /// preconditioning matrix and gradient.
    ///
    /// Returns `true` if the size of the free set differs from the previous
    /// assembly (or if this is the first one). In that case, any linear solver
    /// state sized to the reduced system must be recreated.
    pub fn assemble(
        &mut self,
        free: &FreeSet,
        hes: &OMatrix<T, Dyn, Dyn>,
        hes_pre: Option<&OMatrix<T, Dyn, Dyn>>,
        grad: &OVector<T, Dyn>,
    ) -> bool {
        let n_free = free.len();
        let resized = self.built_for != Some(n_free);

        let dim = match self.subset_type {
            SubsetType::Submatrix => n_free,
            SubsetType::Mask => free.dim(),
        };

        if self.rhs.nrows() != dim {
            self.hes = OMatrix::zeros_generic(Dyn(dim), Dyn(dim));
            self.rhs = OVector::zeros_generic(Dyn(dim), U1::name());
            self.sol = OVector::zeros_generic(Dyn(dim), U1::name());
            self.hes_pre = None;
        }

        match self.subset_type {
            SubsetType::Submatrix => {
                free.gather_matrix(hes, &mut self.hes);
                free.gather(grad, &mut self.rhs);
            }
            SubsetType::Mask => {
                mask_matrix(free, hes, &mut self.hes);
                self.rhs.copy_from(grad);
                for i in 0..dim {
                    if !free.contains(i) {
                        self.rhs[i] = T::zero();
                    }
                }
            }
        }
        self.rhs.neg_mut();

        match hes_pre {
            Some(pre) => {
                let reduced_pre = self
                    .hes_pre
                    .get_or_insert_with(|| OMatrix::zeros_generic(Dyn(dim), Dyn(dim)));

                match self.subset_type {
                    SubsetType::Submatrix => free.gather_matrix(pre, reduced_pre),
                    SubsetType::Mask => mask_matrix(free, pre, reduced_pre),
                }
            }
            None => self.hes_pre = None,
        }

        self.sol.fill(T::zero());

        if resized {
            debug!(
                "reduced system resized from {:?} to {} free variables ({})",
                self.built_for, n_free, self.subset_type
            );
        }

        self.built_for = Some(n_free);
        resized
    }

    /// Gets the dimension of the reduced system.
    pub fn dim(&self) -> usize {
        self.rhs.nrows()
    }

    /// Gets the reduced Hessian.
    pub fn hessian(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.hes
    }

    /// Gets the reduced preconditioning matrix. If no distinct matrix was
    /// provided, this is the reduced Hessian.
    pub fn preconditioner(&self) -> &OMatrix<T, Dyn, Dyn> {
        self.hes_pre.as_ref().unwrap_or(&self.hes)
    }

    /// Gets the reduced right-hand side, i.e., the negated gradient restricted
    /// to free variables.
    pub fn rhs(&self) -> &OVector<T, Dyn> {
        &self.rhs
    }

    /// Gets the reduced correction.
    pub fn solution(&self) -> &OVector<T, Dyn> {
        &self.sol
    }

    /// Splits the system into the parts consumed by a linear solver.
    pub fn parts_mut(
        &mut self,
    ) -> (
        &OMatrix<T, Dyn, Dyn>,
        &OMatrix<T, Dyn, Dyn>,
        &OVector<T, Dyn>,
        &mut OVector<T, Dyn>,
    ) {
        let pre = self.hes_pre.as_ref().unwrap_or(&self.hes);
        (&self.hes, pre, &self.rhs, &mut self.sol)
    }

    /// Expands the reduced correction into a full-space step which is zero
    /// outside the free set.
    pub fn expand(&self, free: &FreeSet, step: &mut OVector<T, Dyn>) {
        match self.subset_type {
            SubsetType::Submatrix => free.scatter(&self.sol, step),
            SubsetType::Mask => {
                step.copy_from(&self.sol);
                for i in 0..step.nrows() {
                    if !free.contains(i) {
                        step[i] = T::zero();
                    }
                }
            }
        }
    }
}

fn mask_matrix<T: RealField>(
    free: &FreeSet,
    full: &OMatrix<T, Dyn, Dyn>,
    masked: &mut OMatrix<T, Dyn, Dyn>,
) {
    masked.copy_from(full);

    for i in 0..full.nrows() {
        if !free.contains(i) {
            masked.row_mut(i).fill(T::zero());
            masked.column_mut(i).fill(T::zero());
            masked[(i, i)] = T::one();
        }
    }
}
