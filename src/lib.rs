#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Tron
//!
//! A pure Rust implementation of the trust region Newton method (TRON) for
//! minimizing a smooth function of *n* variables subject to bound constraints
//! on each variable.
//!
//! Every iteration of the method combines a few projected gradient steps,
//! which identify the variables that are strictly inside their bounds, with a
//! Newton correction computed on those variables by truncated conjugate
//! gradients and safeguarded by a trust region. The line search, the solver of
//! the reduced Newton system and the termination predicate are replaceable
//! components.
//!
//! ## Problem
//!
//! Mathematically, the problem is formulated as
//!
//! ```text
//! min f(x)
//!
//! subject to Li <= xi <= Ui for every i
//! ```
//!
//! The bounds can be negative/positive infinity, effectively making the
//! variable unconstrained.
//!
//! When it comes to code, the problem is any type that implements the
//! [`Function`] and [`Problem`] traits.
//!
//! ```rust
//! // Tron is based on `nalgebra` crate.
//! use tron::nalgebra as na;
//! use tron::{Domain, Function, Problem};
//! use na::{Dyn, IsContiguous};
//!
//! // A problem is represented by a type.
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl Problem for Rosenbrock {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // Specification for the domain. At the very least, the dimension
//!     // must be known.
//!     fn domain(&self) -> Domain<Self::Field> {
//!         Domain::unconstrained(2)
//!     }
//! }
//!
//! impl Function for Rosenbrock {
//!     // Evaluate the function in a trial point.
//!     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
//!     }
//! }
//! ```
//!
//! And that's it. There is no need for defining gradient vector or Hessian
//! matrix, the library uses [finite
//! difference](https://en.wikipedia.org/wiki/Finite_difference_method)
//! approximations by default. If the derivatives are known analytically, it is
//! recommended to override [`Function::gradient`] and [`Function::hessian`].
//!
//! The previous example used unconstrained variables, but the method is
//! designed for bounds.
//!
//! ```rust
//! # use tron::nalgebra as na;
//! # use tron::*;
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! impl Problem for Rosenbrock {
//! #     type Field = f64;
//!     // ...
//!
//!     fn domain(&self) -> Domain<Self::Field> {
//!         [(-2.0, 0.5), (-2.0, 2.0)].into_iter().collect()
//!     }
//! }
//! ```
//!
//! ## Optimizing
//!
//! When you have your function available, you can use the
//! [`OptimizerDriver`] to run the iteration process until a stopping
//! criterion is reached.
//!
//! ```rust
//! use tron::termination::{ConvergedReason, DivergedReason, Status};
//! use tron::{OptimizerDriver, OptimizerIterState};
//! # use tron::nalgebra as na;
//! # use tron::{Domain, Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         [(-2.0, 0.5), (-2.0, 2.0)].into_iter().collect()
//! #     }
//! # }
//! #
//! # impl Function for Rosenbrock {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
//! #     }
//! # }
//!
//! let f = Rosenbrock { a: 1.0, b: 100.0 };
//! let mut optimizer = OptimizerDriver::builder(&f)
//!     .with_initial(vec![-1.2, 1.0])
//!     .build();
//!
//! let tolerance = 1e-6;
//!
//! let (x, fx, status) = optimizer
//!     .find(|state: &OptimizerIterState<'_, f64>| {
//!         println!(
//!             "iter = {}\tf = {}\t|| pg || = {}\tx = {:?}",
//!             state.iter(),
//!             state.fx(),
//!             state.gnorm(),
//!             state.x()
//!         );
//!
//!         if state.gnorm() <= tolerance {
//!             Status::Converged(ConvergedReason::GradientAbs)
//!         } else if state.iter() >= 100 {
//!             Status::Diverged(DivergedReason::MaxIterations)
//!         } else {
//!             Status::Continue
//!         }
//!     })
//!     .expect("optimizer encountered an error");
//!
//! if status.is_converged() {
//!     println!("minimum f({:?}) = {}", x, fx);
//! } else {
//!     println!("{}", status);
//! }
//! ```
//!
//! The standard combination of tolerances is available as
//! [`Tolerances`](termination::Tolerances).
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod derivatives;
pub mod driver;
pub mod krylov;
pub mod linesearch;
pub mod subset;
pub mod termination;

pub use core::*;
pub use driver::{OptimizerDriver, OptimizerIterState};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
