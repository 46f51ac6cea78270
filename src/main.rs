//! Nodal - MNA Circuit Simulator
//!
//! Runs one of the built-in demonstration circuits and prints the
//! resulting dataset as whitespace-separated columns.
//!
//! # Usage
//!
//! ```bash
//! nodal divider
//! nodal rc --method gear2 --stop 5e-3 --step 1e-5
//! nodal lowpass --points 10
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand};
use nodal_core::{
    error::Result,
    solver::Method,
    AcAnalysis, AcOptions, Analysis, Circuit, DcAnalysis, NewtonOptions, Sweep, TransientAnalysis,
    TransientOptions,
};

/// Dense MNA circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    circuit: Demo,

    #[command(flatten)]
    newton: NewtonArgs,
}

/// Newton-Raphson tolerances shared by every analysis.
#[derive(ClapArgs, Debug)]
struct NewtonArgs {
    /// Absolute current tolerance in A
    #[arg(long, global = true, default_value_t = 1e-12)]
    abstol: f64,

    /// Absolute voltage tolerance in V
    #[arg(long, global = true, default_value_t = 1e-6)]
    vntol: f64,

    /// Relative tolerance
    #[arg(long, global = true, default_value_t = 1e-3)]
    reltol: f64,

    /// Newton iteration limit
    #[arg(long, global = true, default_value_t = 100)]
    max_iter: usize,
}

#[derive(Subcommand, Debug)]
enum Demo {
    /// Operating point of a 10 V divider, swept over the lower resistor
    Divider,
    /// Step response of an RC network
    Rc {
        /// Integration method: be, trap, amK or gearK
        #[arg(short, long, default_value = "trap")]
        method: Method,

        /// Stop time in seconds
        #[arg(long, default_value_t = 5e-3)]
        stop: f64,

        /// Time step in seconds
        #[arg(long, default_value_t = 1e-5)]
        step: f64,
    },
    /// Forward-biased diode behind a series resistor, swept over the supply
    Diode,
    /// AC response of an RC low-pass filter
    Lowpass {
        /// Frequency points per decade
        #[arg(short, long, default_value_t = 5)]
        points: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let newton = NewtonOptions::default()
        .with_abstol(args.newton.abstol)
        .with_vntol(args.newton.vntol)
        .with_reltol(args.newton.reltol)
        .with_max_iterations(args.newton.max_iter);

    let mut circuit = Circuit::new();
    let dataset = match args.circuit {
        Demo::Divider => {
            circuit.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())])?;
            circuit.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())])?;
            circuit.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())])?;
            DcAnalysis::new(newton)
                .with_sweep(Sweep::list("R2.r", vec![1e3, 2e3, 3e3])?)
                .run(&mut circuit)?
        }
        Demo::Rc { method, stop, step } => {
            circuit.add_device(
                "V",
                "V1",
                &["in", "0"],
                &[("type", "step".into()), ("amplitude", 1.0.into())],
            )?;
            circuit.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())])?;
            circuit.add_device("C", "C1", &["out", "0"], &[("c", 1e-6.into())])?;
            let options = TransientOptions::new(stop, step).with_method(method);
            TransientAnalysis::new(options)
                .with_newton(newton)
                .run(&mut circuit)?
        }
        Demo::Diode => {
            circuit.add_model("D1N4148", "D", &[("is", 2.52e-9.into()), ("n", 1.752.into())])?;
            circuit.add_device("V", "V1", &["in", "0"], &[("dc", 5.0.into())])?;
            circuit.add_device("R", "R1", &["in", "a"], &[("r", 1e3.into())])?;
            circuit.add_device_with_model("D", "D1", &["a", "0"], "D1N4148", &[])?;
            DcAnalysis::new(newton)
                .with_sweep(Sweep::linear("V1.dc", 0.0, 5.0, 6)?)
                .run(&mut circuit)?
        }
        Demo::Lowpass { points } => {
            circuit.add_device("V", "V1", &["in", "0"], &[("ac", 1.0.into())])?;
            circuit.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())])?;
            circuit.add_device("C", "C1", &["out", "0"], &[("c", 1e-6.into())])?;
            let sweep = Sweep::decade("frequency", 1.0, 1e5, points)?;
            AcAnalysis::new(AcOptions::new(sweep))
                .with_newton(newton)
                .run(&mut circuit)?
        }
    };

    print!("{}", dataset);
    Ok(())
}
