//! Newton-Raphson iteration for the DC operating point.
//!
//! Every iteration clears the system, stamps every device linearized at
//! the previous solution, solves, and compares against that previous
//! solution. The first iteration has nothing to compare against and never
//! counts as converged; a circuit with no nonlinear device is solved
//! exactly by its first iteration.

use log::{debug, trace};

use super::linear::LinearSolver;
use super::mna::MnaSystem;
use crate::circuit::{Circuit, Conditions, Pass, Unknown};
use crate::components::GMIN;
use crate::error::{NodalError, Result};

/// Default absolute current tolerance (A).
pub const DEFAULT_ABSTOL: f64 = 1e-12;

/// Default absolute voltage tolerance (V).
pub const DEFAULT_VNTOL: f64 = 1e-6;

/// Default relative tolerance.
pub const DEFAULT_RELTOL: f64 = 1e-3;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Configuration for the Newton-Raphson solver.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonOptions {
    /// Absolute tolerance on branch currents (A)
    pub abstol: f64,
    /// Absolute tolerance on node voltages (V)
    pub vntol: f64,
    /// Relative tolerance on every unknown
    pub reltol: f64,
    /// Iteration cap before reporting non-convergence
    pub max_iterations: usize,
    /// Conductance shunted across nonlinear junctions (S)
    pub gmin: f64,
    /// Dense solver used for every linear solve
    pub linear_solver: LinearSolver,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            abstol: DEFAULT_ABSTOL,
            vntol: DEFAULT_VNTOL,
            reltol: DEFAULT_RELTOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gmin: GMIN,
            linear_solver: LinearSolver::default(),
        }
    }
}

impl NewtonOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abstol(mut self, abstol: f64) -> Self {
        self.abstol = abstol;
        self
    }

    pub fn with_vntol(mut self, vntol: f64) -> Self {
        self.vntol = vntol;
        self
    }

    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    pub fn with_linear_solver(mut self, solver: LinearSolver) -> Self {
        self.linear_solver = solver;
        self
    }

    /// Reject non-positive tolerances and a zero iteration cap.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("abstol", self.abstol),
            ("vntol", self.vntol),
            ("reltol", self.reltol),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(NodalError::invalid_param(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.gmin >= 0.0 && self.gmin.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "gmin must be non-negative, got {}",
                self.gmin
            )));
        }
        if self.max_iterations == 0 {
            return Err(NodalError::invalid_param("max_iterations must be at least 1"));
        }
        Ok(())
    }

    /// Tolerance for one unknown given its new value.
    fn tolerance(&self, unknown: &Unknown, value: f64) -> f64 {
        let absolute = if unknown.is_voltage() {
            self.vntol
        } else {
            self.abstol
        };
        absolute + self.reltol * value.abs()
    }
}

/// How an iteration loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every unknown passed the convergence test
    Converged { iterations: usize },
    /// The cap was reached; `worst` is the unknown furthest from passing
    MaxIterExceeded { iterations: usize, worst: usize },
}

/// Newton-Raphson solver with reusable system buffers.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    options: NewtonOptions,
    system: MnaSystem,
    x_prev: Vec<f64>,
}

impl NewtonRaphson {
    /// Create a solver; buffers are sized on first use.
    pub fn new(options: NewtonOptions) -> Self {
        Self {
            options,
            system: MnaSystem::new(0),
            x_prev: Vec::new(),
        }
    }

    pub fn options(&self) -> &NewtonOptions {
        &self.options
    }

    /// Iterate from the circuit's current solution until convergence or
    /// the iteration cap. The circuit holds the last solution either way.
    pub fn iterate(
        &mut self,
        circuit: &mut Circuit,
        pass: Pass,
        conditions: &Conditions,
    ) -> Result<Outcome> {
        let size = circuit.size();
        if circuit.solution().len() != size {
            return Err(NodalError::not_reset());
        }
        if self.system.size() != size {
            self.system = MnaSystem::new(size);
        }
        self.x_prev.clear();
        self.x_prev.extend_from_slice(circuit.solution());
        let nonlinear = circuit.has_nonlinear();

        let mut worst = 0;
        for iteration in 1..=self.options.max_iterations {
            let step = Conditions {
                gmin: self.options.gmin,
                init_junctions: conditions.init_junctions && iteration == 1,
                ..*conditions
            };
            self.system.clear();
            circuit.load(pass, &step, &mut self.system);
            let x = self.system.solve(self.options.linear_solver)?;
            circuit.set_solution(x);

            if !nonlinear {
                return Ok(Outcome::Converged { iterations: 1 });
            }

            if iteration > 1 {
                match self.worst_failing(circuit) {
                    None => {
                        trace!("iteration {}: converged", iteration);
                        return Ok(Outcome::Converged { iterations: iteration });
                    }
                    Some(index) => {
                        trace!(
                            "iteration {}: {} still moving by {:.3e}",
                            iteration,
                            circuit.network().describe(index),
                            (circuit.solution()[index] - self.x_prev[index]).abs()
                        );
                        worst = index;
                    }
                }
            }
            self.x_prev.copy_from_slice(circuit.solution());
        }

        Ok(Outcome::MaxIterExceeded {
            iterations: self.options.max_iterations,
            worst,
        })
    }

    /// Like [`NewtonRaphson::iterate`], but non-convergence is an error.
    ///
    /// Returns the number of iterations used.
    pub fn solve(
        &mut self,
        circuit: &mut Circuit,
        pass: Pass,
        conditions: &Conditions,
    ) -> Result<usize> {
        match self.iterate(circuit, pass, conditions)? {
            Outcome::Converged { iterations } => {
                debug!("newton converged in {} iterations", iterations);
                Ok(iterations)
            }
            Outcome::MaxIterExceeded { iterations, worst } => Err(NodalError::convergence_failure(
                iterations,
                circuit.network().describe(worst),
            )),
        }
    }

    /// Solve the DC operating point at `time` (NaN outside transient
    /// analysis) and let every device derive its outputs.
    pub fn operating_point(&mut self, circuit: &mut Circuit, time: f64) -> Result<usize> {
        let conditions = Conditions {
            time,
            init_junctions: true,
            ..Conditions::default()
        };
        let iterations = self.solve(circuit, Pass::Dc, &conditions)?;
        circuit.finish(Pass::Dc, &conditions);
        Ok(iterations)
    }

    /// Solve the t = 0 point from device initial conditions instead of
    /// the operating point: capacitors are held at their `ic` voltage and
    /// inductors at their `ic` current.
    pub fn initial_conditions(&mut self, circuit: &mut Circuit, time: f64) -> Result<usize> {
        let conditions = Conditions {
            time,
            init_junctions: true,
            use_ic: true,
            ..Conditions::default()
        };
        let iterations = self.solve(circuit, Pass::Dc, &conditions)?;
        circuit.finish(Pass::Dc, &conditions);
        Ok(iterations)
    }

    /// Index of the unknown that fails the convergence test by the widest
    /// margin, or `None` when every unknown passes.
    fn worst_failing(&self, circuit: &Circuit) -> Option<usize> {
        let mut worst: Option<(usize, f64)> = None;
        for (i, unknown) in circuit.unknowns().iter().enumerate() {
            let value = circuit.solution()[i];
            let delta = (value - self.x_prev[i]).abs();
            let tol = self.options.tolerance(unknown, value);
            if delta < tol {
                continue;
            }
            // NaN ratios sort first so a diverged unknown is always reported
            let ratio = delta / tol;
            match worst {
                Some((_, r)) if !ratio.is_nan() && ratio <= r => {}
                _ => worst = Some((i, ratio)),
            }
        }
        worst.map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diode_circuit() -> Circuit {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "a"], &[("r", 1e3.into())]).unwrap();
        c.add_device("D", "D1", &["a", "0"], &[]).unwrap();
        c.reset().unwrap();
        c
    }

    #[test]
    fn test_linear_circuit_single_iteration() {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())]).unwrap();
        c.reset().unwrap();
        let mut newton = NewtonRaphson::new(NewtonOptions::default());
        assert_eq!(newton.operating_point(&mut c, f64::NAN).unwrap(), 1);
        assert_relative_eq!(c.voltage("out").unwrap(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_never_converged_on_first_iteration() {
        // Even with absurd tolerances, a nonlinear solve takes at least two
        let mut c = diode_circuit();
        let options = NewtonOptions::default()
            .with_abstol(1e9)
            .with_vntol(1e9)
            .with_reltol(1e9);
        let mut newton = NewtonRaphson::new(options);
        let outcome = newton
            .iterate(&mut c, Pass::Dc, &Conditions::default())
            .unwrap();
        assert_eq!(outcome, Outcome::Converged { iterations: 2 });
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let mut c = diode_circuit();
        let mut newton = NewtonRaphson::new(NewtonOptions::default().with_max_iterations(2));
        let outcome = newton
            .iterate(&mut c, Pass::Dc, &Conditions::default())
            .unwrap();
        assert!(matches!(outcome, Outcome::MaxIterExceeded { iterations: 2, .. }));

        c.reset().unwrap();
        let err = newton.operating_point(&mut c, f64::NAN).unwrap_err();
        assert!(matches!(err, NodalError::ConvergenceFailure { iterations: 2, .. }));
    }

    #[test]
    fn test_diode_operating_point() {
        let mut c = diode_circuit();
        let mut newton = NewtonRaphson::new(NewtonOptions::default().with_max_iterations(10));
        let iterations = newton.operating_point(&mut c, f64::NAN).unwrap();
        assert!(iterations <= 10);

        let vd = c.voltage("a").unwrap();
        let i = (10.0 - vd) / 1e3;
        let vt = crate::components::K_OVER_Q * 300.15;
        let expected = 1e-14 * ((vd / vt).exp() - 1.0);
        assert_relative_eq!(i, expected, max_relative = 1e-2);
        assert!(vd > 0.65 && vd < 0.75);
    }

    #[test]
    fn test_options_validation() {
        assert!(NewtonOptions::default().validate().is_ok());
        assert!(NewtonOptions::default().with_reltol(0.0).validate().is_err());
        assert!(NewtonOptions::default().with_max_iterations(0).validate().is_err());
        assert!(NewtonOptions::default().with_gmin(-1.0).validate().is_err());
    }
}
