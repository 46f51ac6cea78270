//! Analysis entry points.
//!
//! Every analysis walks its parameter sweeps, solves the circuit once per
//! combination and captures one [`RowGroup`] of probe values per
//! combination into a [`Dataset`].

mod ac;
mod dataset;
mod dc;
mod probe;
mod tran;

pub use ac::{AcAnalysis, AcOptions};
pub use dataset::{Column, Dataset, RowGroup};
pub use dc::DcAnalysis;
pub use probe::Probe;
pub use tran::TransientAnalysis;

use crate::circuit::Circuit;
use crate::error::Result;
use crate::sweep::{walk, Sweep, SweepVisitor};

/// Title of the row group captured without any sweep.
pub const DEFAULT_GROUP: &str = "default";

/// A runnable analysis.
pub trait Analysis {
    /// Solve the circuit for every sweep combination.
    ///
    /// Any failure aborts the whole run; no partial dataset is returned.
    fn run(&mut self, circuit: &mut Circuit) -> Result<Dataset>;
}

/// Applies sweep values to the circuit and hands each combination to a
/// solve callback along with its row-group title.
struct SweepRunner<'c, F> {
    circuit: &'c mut Circuit,
    assignments: Vec<String>,
    solve: F,
}

impl<F> SweepVisitor for SweepRunner<'_, F>
where
    F: FnMut(&mut Circuit, &str) -> Result<()>,
{
    fn enter(&mut self, _depth: usize, _sweep: &Sweep) -> Result<()> {
        self.assignments.push(String::new());
        Ok(())
    }

    fn set(&mut self, depth: usize, sweep: &Sweep, value: f64) -> Result<()> {
        self.circuit.set_parameter(sweep.variable(), value)?;
        self.assignments[depth] = format!("{}={}", sweep.variable(), value);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let title = if self.assignments.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            self.assignments.join(", ")
        };
        (self.solve)(&mut *self.circuit, &title)
    }

    fn leave(&mut self, _depth: usize, _sweep: &Sweep) -> Result<()> {
        self.assignments.pop();
        Ok(())
    }
}

/// Walk `sweeps` over `circuit`, calling `solve` once per combination.
fn run_sweeps<F>(circuit: &mut Circuit, sweeps: &[Sweep], solve: F) -> Result<()>
where
    F: FnMut(&mut Circuit, &str) -> Result<()>,
{
    let mut runner = SweepRunner {
        circuit,
        assignments: Vec::new(),
        solve,
    };
    walk(sweeps, &mut runner)
}
