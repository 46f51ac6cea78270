//! Small-signal AC solve at a single frequency.
//!
//! Devices stamp their admittances linearized at the operating point held
//! by the circuit. The system is linear, so one solve per frequency.

use log::trace;
use num_complex::Complex64;

use super::linear::LinearSolver;
use super::mna::AcSystem;
use crate::circuit::Circuit;
use crate::error::{NodalError, Result};

/// Magnitude of a phasor.
pub fn magnitude(z: Complex64) -> f64 {
    (z.re * z.re + z.im * z.im).sqrt()
}

/// Phase of a phasor in degrees.
pub fn phase_degrees(z: Complex64) -> f64 {
    z.im.atan2(z.re).to_degrees()
}

/// AC solver with a reusable doubled real system.
#[derive(Debug, Clone)]
pub struct AcSolver {
    system: AcSystem,
    linear_solver: LinearSolver,
}

impl Default for AcSolver {
    fn default() -> Self {
        Self::new(LinearSolver::Gauss)
    }
}

impl AcSolver {
    pub fn new(linear_solver: LinearSolver) -> Self {
        Self {
            system: AcSystem::new(0),
            linear_solver,
        }
    }

    /// Solve the phasor network at `frequency` (Hz) and store the result
    /// in the circuit.
    pub fn solve(&mut self, circuit: &mut Circuit, frequency: f64) -> Result<()> {
        if !(frequency >= 0.0 && frequency.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "frequency must be non-negative, got {}",
                frequency
            )));
        }
        let size = circuit.size();
        if self.system.size() != size {
            self.system = AcSystem::new(size);
        } else {
            self.system.clear();
        }
        circuit.set_frequency(frequency);
        circuit.load_ac(frequency, &mut self.system);
        let solution = self.system.solve(self.linear_solver)?;
        trace!("ac solve at {:.3e} Hz", frequency);
        circuit.set_ac_solution(solution);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_magnitude_and_phase() {
        let z = Complex64::new(1.0, -1.0);
        assert_relative_eq!(magnitude(z), 2f64.sqrt());
        assert_relative_eq!(phase_degrees(z), -45.0);
        assert_relative_eq!(phase_degrees(Complex64::new(-1.0, 0.0)), 180.0);
    }

    #[test]
    fn test_rl_highpass_corner() {
        // V(ac=1) -> R 1k -> out, L 1 H from out to ground: corner at R/(2πL)
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("ac", 1.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("L", "L1", &["out", "0"], &[("l", 1.0.into())]).unwrap();
        c.reset().unwrap();

        let mut ac = AcSolver::default();
        ac.solve(&mut c, 1e3 / (2.0 * PI)).unwrap();
        let node = c.network().find_node("out").unwrap();
        let out = c.ac_solution()[c.network().node_index(node).unwrap()];
        assert_relative_eq!(magnitude(out), 1.0 / 2f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(phase_degrees(out), 45.0, epsilon = 1e-6);
    }

    #[test]
    fn test_negative_frequency_rejected() {
        let mut c = Circuit::new();
        c.reset().unwrap();
        assert!(AcSolver::default().solve(&mut c, -1.0).is_err());
    }
}
