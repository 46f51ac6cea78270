//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources and inductors to nodes
//! - D holds inductor companion resistances (0 for ideal voltage sources)
//! - v is the vector of node voltages
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of branch constraint values
//!
//! Layers, leaves first: [`linear`] dense solvers, [`mna`] stamping,
//! [`newton`] operating point, [`integration`] + [`transient`] time
//! stepping, [`ac`] phasor solve.

pub mod ac;
pub mod integration;
pub mod linear;
pub mod mna;
pub mod newton;
pub mod transient;

pub use ac::{magnitude, phase_degrees, AcSolver};
pub use integration::{
    CoefficientTable, Coefficients, History, Method, OdeIntegrator, HISTORY_LEN, MAX_ORDER,
};
pub use linear::{LinearSolver, Matrix, PIVOT_TOLERANCE};
pub use mna::{AcSystem, MnaSystem, Scalar, Stamper};
pub use newton::{NewtonOptions, NewtonRaphson, Outcome};
pub use transient::{TransientEngine, TransientOptions};
