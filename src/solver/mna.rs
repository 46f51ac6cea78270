//! MNA matrix assembly.
//!
//! Devices never see the matrix itself: they receive a [`Stamper`], a
//! write-only accumulator. Every stamp adds to what is already there, so
//! any number of devices may contribute to the same cell. The owner of the
//! system clears it between iterations.
//!
//! The same stamping vocabulary serves DC/transient assembly over `f64`
//! ([`MnaSystem`]) and AC assembly over complex phasors ([`AcSystem`]),
//! which lays each complex unknown out as a real/imaginary row pair.

use std::ops::{Mul, Neg};

use num_complex::Complex64;

use super::linear::{LinearSolver, Matrix};
use crate::error::Result;

/// Value type a stamper accepts: `f64` or [`Complex64`].
pub trait Scalar: Copy + Neg<Output = Self> + Mul<Output = Self> + From<f64> {}

impl<T> Scalar for T where T: Copy + Neg<Output = T> + Mul<Output = T> + From<f64> {}

/// Write-only access to an MNA system `A·x = b`.
///
/// Node arguments are solution-vector indices; `None` is ground, whose
/// row and column do not exist.
pub trait Stamper<T: Scalar = f64> {
    /// Add `value` to `A[row, col]`.
    fn stamp_a(&mut self, row: usize, col: usize, value: T);

    /// Add `value` to `b[row]`.
    fn stamp_b(&mut self, row: usize, value: T);

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: T) {
        if let Some(i) = n1 {
            self.stamp_a(i, i, g);
        }
        if let Some(j) = n2 {
            self.stamp_a(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.stamp_a(i, j, -g);
            self.stamp_a(j, i, -g);
        }
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ to n- through the source.
    fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: T) {
        // Current leaves n+ and enters n-
        if let Some(i) = n_pos {
            self.stamp_b(i, -current);
        }
        if let Some(j) = n_neg {
            self.stamp_b(j, current);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at index br.
    /// V[n+] - V[n-] = E
    fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: T,
    ) {
        let one = T::from(1.0);
        if let Some(i) = n_pos {
            self.stamp_a(br, i, one);
            self.stamp_a(i, br, one);
        }
        if let Some(j) = n_neg {
            self.stamp_a(br, j, -one);
            self.stamp_a(j, br, -one);
        }
        self.stamp_b(br, voltage);
    }

    /// Stamp a VCCS (Voltage-Controlled Current Source).
    /// I = gm * (V[ctrl+] - V[ctrl-]), flowing from out+ to out-.
    fn stamp_vccs(
        &mut self,
        n_out_pos: Option<usize>,
        n_out_neg: Option<usize>,
        n_ctrl_pos: Option<usize>,
        n_ctrl_neg: Option<usize>,
        gm: T,
    ) {
        if let (Some(i), Some(k)) = (n_out_pos, n_ctrl_pos) {
            self.stamp_a(i, k, gm);
        }
        if let (Some(i), Some(l)) = (n_out_pos, n_ctrl_neg) {
            self.stamp_a(i, l, -gm);
        }
        if let (Some(j), Some(k)) = (n_out_neg, n_ctrl_pos) {
            self.stamp_a(j, k, -gm);
        }
        if let (Some(j), Some(l)) = (n_out_neg, n_ctrl_neg) {
            self.stamp_a(j, l, gm);
        }
    }

    /// Stamp a VCVS (Voltage-Controlled Voltage Source).
    /// V[out+] - V[out-] = gain * (V[ctrl+] - V[ctrl-])
    fn stamp_vcvs(
        &mut self,
        n_out_pos: Option<usize>,
        n_out_neg: Option<usize>,
        n_ctrl_pos: Option<usize>,
        n_ctrl_neg: Option<usize>,
        br: usize,
        gain: T,
    ) {
        self.stamp_voltage_source(n_out_pos, n_out_neg, br, T::from(0.0));
        if let Some(i) = n_ctrl_pos {
            self.stamp_a(br, i, -gain);
        }
        if let Some(j) = n_ctrl_neg {
            self.stamp_a(br, j, gain);
        }
    }
}

/// Real MNA system for DC and transient solves.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// System matrix A
    pub matrix: Matrix,
    /// Right-hand side b; holds the solution after [`MnaSystem::solve`]
    pub rhs: Vec<f64>,
}

impl MnaSystem {
    /// Create a zeroed system with `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            matrix: Matrix::new(size),
            rhs: vec![0.0; size],
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.rhs.len()
    }

    /// Clear the matrix and vector to zero.
    pub fn clear(&mut self) {
        self.matrix.clear();
        self.rhs.fill(0.0);
    }

    /// Solve in place. The matrix is consumed; `rhs` becomes the solution.
    pub fn solve(&mut self, solver: LinearSolver) -> Result<&[f64]> {
        solver.solve(&mut self.matrix, &mut self.rhs)?;
        Ok(&self.rhs)
    }
}

impl Stamper<f64> for MnaSystem {
    fn stamp_a(&mut self, row: usize, col: usize, value: f64) {
        self.matrix.add(row, col, value);
    }

    fn stamp_b(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }
}

/// Complex MNA system stored as a doubled real system.
///
/// Unknown `k` occupies rows/columns `2k` (real part) and `2k+1`
/// (imaginary part). A complex coefficient `a = ar + j·ai` becomes the
/// block `[[ar, -ai], [ai, ar]]`.
#[derive(Debug, Clone)]
pub struct AcSystem {
    /// Doubled real matrix (2n × 2n)
    pub matrix: Matrix,
    /// Doubled right-hand side; holds the solution after solving
    pub rhs: Vec<f64>,
}

impl AcSystem {
    /// Create a zeroed system with `size` complex unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            matrix: Matrix::new(2 * size),
            rhs: vec![0.0; 2 * size],
        }
    }

    /// Number of complex unknowns.
    pub fn size(&self) -> usize {
        self.rhs.len() / 2
    }

    /// Clear the matrix and vector to zero.
    pub fn clear(&mut self) {
        self.matrix.clear();
        self.rhs.fill(0.0);
    }

    /// Solve in place and return the complex solution.
    pub fn solve(&mut self, solver: LinearSolver) -> Result<Vec<Complex64>> {
        solver.solve(&mut self.matrix, &mut self.rhs)?;
        Ok(self
            .rhs
            .chunks_exact(2)
            .map(|pair| Complex64::new(pair[0], pair[1]))
            .collect())
    }
}

impl Stamper<Complex64> for AcSystem {
    fn stamp_a(&mut self, row: usize, col: usize, value: Complex64) {
        let (r, c) = (2 * row, 2 * col);
        self.matrix.add(r, c, value.re);
        self.matrix.add(r, c + 1, -value.im);
        self.matrix.add(r + 1, c, value.im);
        self.matrix.add(r + 1, c + 1, value.re);
    }

    fn stamp_b(&mut self, row: usize, value: Complex64) {
        self.rhs[2 * row] += value.re;
        self.rhs[2 * row + 1] += value.im;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stamps_accumulate() {
        let mut mna = MnaSystem::new(2);
        mna.stamp_conductance(Some(0), Some(1), 1e-3);
        mna.stamp_conductance(Some(0), Some(1), 1e-3);
        mna.stamp_conductance(Some(1), None, 1e-3);
        assert_relative_eq!(mna.matrix[(0, 0)], 2e-3);
        assert_relative_eq!(mna.matrix[(0, 1)], -2e-3);
        assert_relative_eq!(mna.matrix[(1, 0)], -2e-3);
        assert_relative_eq!(mna.matrix[(1, 1)], 3e-3);
    }

    #[test]
    fn test_current_source_direction() {
        let mut mna = MnaSystem::new(2);
        mna.stamp_current_source(Some(0), Some(1), 1.0);
        assert_eq!(mna.rhs, vec![-1.0, 1.0]);
        mna.stamp_current_source(None, Some(1), 0.5);
        assert_eq!(mna.rhs, vec![-1.0, 1.5]);
    }

    #[test]
    fn test_voltage_source_divider() {
        // V1 = 10V at node 0, R1 = 1k from 0 to 1, R2 = 1k from 1 to ground
        let mut mna = MnaSystem::new(3);
        mna.stamp_voltage_source(Some(0), None, 2, 10.0);
        mna.stamp_conductance(Some(0), Some(1), 1e-3);
        mna.stamp_conductance(Some(1), None, 1e-3);
        let x = mna.solve(LinearSolver::Gauss).unwrap();
        assert_relative_eq!(x[0], 10.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 5.0, epsilon = 1e-12);
        // Source delivers 5 mA, which flows into its + terminal from the branch
        assert_relative_eq!(x[2], -5e-3, epsilon = 1e-15);
    }

    #[test]
    fn test_clear_keeps_size() {
        let mut mna = MnaSystem::new(2);
        mna.stamp_a(0, 1, 3.0);
        mna.stamp_b(1, 2.0);
        mna.clear();
        assert_eq!(mna.size(), 2);
        assert_eq!(mna.rhs, vec![0.0, 0.0]);
        assert_eq!(mna.matrix, Matrix::new(2));
    }

    #[test]
    fn test_ac_block_layout() {
        let mut ac = AcSystem::new(1);
        ac.stamp_a(0, 0, Complex64::new(2.0, 3.0));
        ac.stamp_b(0, Complex64::new(1.0, -1.0));
        assert_eq!(ac.matrix.row(0), &[2.0, -3.0]);
        assert_eq!(ac.matrix.row(1), &[3.0, 2.0]);
        assert_eq!(ac.rhs, vec![1.0, -1.0]);

        // (2 + 3j) x = 1 - j  =>  x = (1 - j) / (2 + 3j)
        let x = ac.solve(LinearSolver::Gauss).unwrap();
        let expected = Complex64::new(1.0, -1.0) / Complex64::new(2.0, 3.0);
        assert_relative_eq!(x[0].re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(x[0].im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_vcvs_gain() {
        // V(0) = 1V source, E: V(1) = 5 * V(0), R load on node 1
        let mut mna = MnaSystem::new(4);
        mna.stamp_voltage_source(Some(0), None, 2, 1.0);
        mna.stamp_vcvs(Some(1), None, Some(0), None, 3, 5.0);
        mna.stamp_conductance(Some(1), None, 1e-3);
        let x = mna.solve(LinearSolver::Gauss).unwrap();
        assert_relative_eq!(x[1], 5.0, epsilon = 1e-12);
    }
}
