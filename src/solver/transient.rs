//! Fixed-step transient integration of a circuit.
//!
//! Each step shifts every device history, seeds the Newton guess with a
//! linear extrapolation of the last two accepted solutions, and solves the
//! companion network once. Newton iterates the implicit corrector until
//! successive solutions agree, so a converged solve is the accepted point.

use log::{debug, info, warn};

use super::integration::{CoefficientTable, Method};
use super::newton::{NewtonOptions, NewtonRaphson};
use crate::circuit::{Circuit, Conditions, Pass};
use crate::error::{NodalError, Result};

/// Relative slack when counting steps that fit before the stop time.
const STOP_TIME_SLACK: f64 = 1e-9;

/// Configuration for a transient run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientOptions {
    /// Last simulated time (s)
    pub stop: f64,
    /// Fixed step (s)
    pub step: f64,
    /// Implicit integration method
    pub method: Method,
    /// Seed the run with a DC operating point at t = 0; otherwise solve
    /// the t = 0 point from device initial conditions
    pub use_operating_point: bool,
}

impl TransientOptions {
    /// Trapezoidal integration from the operating point.
    pub fn new(stop: f64, step: f64) -> Self {
        Self {
            stop,
            step,
            method: Method::Trapezoidal,
            use_operating_point: true,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_operating_point(mut self, use_operating_point: bool) -> Self {
        self.use_operating_point = use_operating_point;
        self
    }

    /// Number of steps after t = 0.
    pub fn steps(&self) -> usize {
        (self.stop / self.step * (1.0 + STOP_TIME_SLACK)).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "time step must be positive, got {}",
                self.step
            )));
        }
        if !(self.stop >= self.step && self.stop.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "stop time {} must be at least one step ({})",
                self.stop, self.step
            )));
        }
        self.method.validate()?;
        if !self.method.is_implicit() {
            return Err(NodalError::invalid_param(format!(
                "circuit integration needs an implicit method, got {}",
                self.method
            )));
        }
        Ok(())
    }
}

/// Steps a circuit through time, one fixed step per call.
#[derive(Debug, Clone)]
pub struct TransientEngine {
    options: TransientOptions,
    newton: NewtonRaphson,
    corrector: CoefficientTable,
    step: usize,
    solves: usize,
    accepted: Vec<f64>,
    guess: Vec<f64>,
}

impl TransientEngine {
    pub fn new(options: TransientOptions, newton: NewtonOptions) -> Result<Self> {
        options.validate()?;
        newton.validate()?;
        Ok(Self {
            corrector: CoefficientTable::new(options.method)?,
            newton: NewtonRaphson::new(newton),
            options,
            step: 0,
            solves: 0,
            accepted: Vec::new(),
            guess: Vec::new(),
        })
    }

    pub fn options(&self) -> &TransientOptions {
        &self.options
    }

    /// Time of the last accepted point.
    pub fn time(&self) -> f64 {
        self.step as f64 * self.options.step
    }

    /// Newton solves run by [`TransientEngine::step`] since the last start.
    pub fn solves(&self) -> usize {
        self.solves
    }

    /// Whether another step fits before the stop time.
    pub fn has_next(&self) -> bool {
        self.step < self.options.steps()
    }

    /// Establish the point at t = 0 and seed every device history.
    ///
    /// The circuit must have been reset.
    pub fn start(&mut self, circuit: &mut Circuit) -> Result<()> {
        info!(
            "transient: {} to {:.3e}s, step {:.3e}s",
            self.options.method, self.options.stop, self.options.step
        );
        self.step = 0;
        self.solves = 0;
        circuit.set_time(0.0);
        if self.options.use_operating_point {
            let iterations = self.newton.operating_point(circuit, 0.0)?;
            debug!("initial operating point in {} iterations", iterations);
        } else {
            let iterations = self.newton.initial_conditions(circuit, 0.0)?;
            debug!("initial conditions in {} iterations", iterations);
        }
        let conditions = Conditions {
            time: 0.0,
            time_step: self.options.step,
            use_ic: !self.options.use_operating_point,
            ..Conditions::default()
        };
        circuit.begin_transient(&conditions);
        Ok(())
    }

    /// Advance one step. Any failure aborts the run and names the time.
    pub fn step(&mut self, circuit: &mut Circuit) -> Result<f64> {
        self.step += 1;
        let time = self.time();
        circuit.set_time(time);
        match self.advance(circuit, time) {
            Ok(iterations) => {
                debug!("t={:.6e}: accepted after {} newton iterations", time, iterations);
                Ok(time)
            }
            Err(err) => {
                warn!("transient aborted at t={:.6e}: {}", time, err);
                Err(NodalError::step_failed(time, err))
            }
        }
    }

    fn advance(&mut self, circuit: &mut Circuit, time: f64) -> Result<usize> {
        let h = self.options.step;
        let coefficients = self.corrector.for_step(self.step);
        circuit.shift_histories();

        // x[n+1] ≈ 2·x[n] - x[n-1]; the first step starts from x[0]
        self.guess.clear();
        self.guess.extend_from_slice(circuit.solution());
        if self.step > 1 {
            for (g, a) in self.guess.iter_mut().zip(&self.accepted) {
                *g = 2.0 * *g - a;
            }
        }
        self.accepted.clear();
        self.accepted.extend_from_slice(circuit.solution());
        circuit.set_solution(&self.guess);

        let conditions = Conditions {
            time,
            time_step: h,
            coefficients: Some(coefficients),
            ..Conditions::default()
        };
        self.solves += 1;
        let iterations = self.newton.solve(circuit, Pass::Transient, &conditions)?;
        circuit.finish(Pass::Transient, &conditions);
        Ok(iterations)
    }
}
