//! Circuit graph representation.
//!
//! This module provides the internal representation of a circuit: the
//! [`Network`] enumerating MNA unknowns and the [`Circuit`] that owns
//! devices, models, their state and the latest solutions.

mod graph;
mod network;
mod types;

pub use graph::{Circuit, Conditions, Pass, DEFAULT_TEMPERATURE};
pub use network::{is_ground_name, Network, GROUND_NAME};
pub use types::*;
