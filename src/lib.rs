//! # Nodal Core
//!
//! A dense Modified Nodal Analysis (MNA) circuit simulation engine.
//!
//! This library provides:
//! - A circuit model of nodes, branches, device instances and named models
//! - Linear devices (R, C, L), independent and controlled sources, and a
//!   junction diode
//! - DC operating point, fixed-step transient and small-signal AC analyses
//! - Nested parameter sweeps with results captured into a [`Dataset`]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`circuit`] - Circuit graph, unknown numbering and device lifecycle
//! - [`components`] - Device classes, their property schemas and stamps
//! - [`solver`] - Linear solvers, MNA assembly, Newton-Raphson, integration
//!   methods, the transient engine and the AC solver
//! - [`sweep`] - Parameter sweeps and the nested sweep walker
//! - [`analysis`] - DC, transient and AC analyses producing datasets
//!
//! ## Usage
//!
//! ```no_run
//! use nodal_core::analysis::{Analysis, DcAnalysis};
//! use nodal_core::Circuit;
//!
//! let mut circuit = Circuit::new();
//! circuit.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())])?;
//! circuit.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())])?;
//! circuit.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())])?;
//!
//! let dataset = DcAnalysis::default().run(&mut circuit)?;
//! println!("{}", dataset);
//! # Ok::<(), nodal_core::NodalError>(())
//! ```
//!
//! ## Simulation Method
//!
//! Every analysis assembles `A·x = b` over the unknowns of the circuit:
//!
//! 1. Devices stamp their contributions into `A` and `b`
//! 2. The system is solved for node voltages and branch currents
//! 3. Nonlinear devices iterate with Newton-Raphson until convergence
//!
//! Reactive devices are discretized with a selectable implicit integration
//! method (backward Euler, trapezoidal, Gear or Adams-Moulton).

pub mod analysis;
pub mod circuit;
pub mod components;
pub mod error;
pub mod props;
pub mod solver;
pub mod sweep;

// Re-export main types for convenience
pub use analysis::{AcAnalysis, AcOptions, Analysis, Dataset, DcAnalysis, Probe, TransientAnalysis};
pub use circuit::Circuit;
pub use error::{NodalError, Result};
pub use solver::{Method, NewtonOptions, TransientOptions};
pub use sweep::Sweep;
