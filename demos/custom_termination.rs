use tron::nalgebra as na;
use tron::termination::{ConvergedReason, DivergedReason, Status};
use tron::{Domain, Function, OptimizerDriver, OptimizerIterState, Problem};
use na::{Dyn, IsContiguous};

// https://en.wikipedia.org/wiki/Himmelblau%27s_function
struct Himmelblau;

impl Problem for Himmelblau {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::rect(vec![0.0, 0.0], vec![5.0, 5.0])
    }
}

impl Function for Himmelblau {
    fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
    {
        (x[0].powi(2) + x[1] - 11.0).powi(2) + (x[0] + x[1].powi(2) - 7.0).powi(2)
    }
}

fn main() -> Result<(), String> {
    let f = Himmelblau;
    let mut optimizer = OptimizerDriver::builder(&f)
        .with_initial(vec![4.5, 4.5])
        .build();

    let tolerance = 1e-6;

    let (x, fx, status) = optimizer
        .find(|state: &OptimizerIterState<'_, f64>| {
            println!(
                "iter = {}\tf = {}\t|| pg || = {}\tdelta = {}\tfree = {}",
                state.iter(),
                state.fx(),
                state.gnorm(),
                state.delta(),
                state.n_free()
            );

            if state.gnorm() <= tolerance {
                Status::Converged(ConvergedReason::GradientAbs)
            } else if state.iter() >= 100 {
                Status::Diverged(DivergedReason::MaxIterations)
            } else {
                Status::Continue
            }
        })
        .map_err(|error| format!("{error}"))?;

    println!("{}: f({:?}) = {}", status, x, fx);

    if status.is_converged() {
        Ok(())
    } else {
        Err("did not converge".to_string())
    }
}
