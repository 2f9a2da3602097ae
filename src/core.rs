//! Core abstractions and types for tron.
//!
//! *Users* are mainly interested in implementing the [`Function`] trait and
//! specifying the [domain](Domain) with bound constraints.
//!
//! Algorithms *developers* are interested in implementing the [`Optimizer`]
//! trait and using the [subset](crate::subset),
//! [line search](crate::linesearch) and [Krylov](crate::krylov) tools.

mod base;
mod domain;
mod function;
mod optimizer;

pub use base::*;
pub use domain::*;
pub use function::*;
pub use optimizer::*;
