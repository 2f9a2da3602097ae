use tron::algo::tron::{Tron, TronOptions};
use tron::termination::Tolerances;
use tron::testing::{Boxed, ExtendedRosenbrock, TestProblem};
use tron::{Domain, OptimizerDriver};

fn main() -> Result<(), String> {
    let n = 6;
    // The unconstrained minimum (1, ..., 1) lies outside of the box.
    let f = Boxed::new(
        ExtendedRosenbrock::new(n),
        Domain::rect(vec![-2.0; n], vec![0.5; n]),
    );
    let x0 = f.initials()[0].as_slice().to_vec();

    let mut options = TronOptions::default();
    options.set_max_gp_iters(5);

    let mut optimizer = OptimizerDriver::builder(&f)
        .with_initial(x0)
        .with_algo(|f, dom| Tron::with_options(f, dom, options))
        .build();

    let mut stop = Tolerances::new();
    stop.set_max_iters(200);

    let (x, fx, status) = optimizer
        .find(stop)
        .map_err(|error| format!("{error}"))?;
    let x = x.to_vec();

    println!("{}", status);
    println!("f({:?}) = {}", x, fx);
    println!("{}", optimizer.algo());

    let dual = optimizer.dual().map_err(|error| format!("{error}"))?;
    println!("lower multipliers = {:?}", dual.lower.as_slice());
    println!("upper multipliers = {:?}", dual.upper.as_slice());

    if status.is_converged() {
        Ok(())
    } else {
        Err("did not converge".to_string())
    }
}
