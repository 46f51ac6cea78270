//! Core types for circuit representation.

use std::fmt;

/// A handle to a node in the circuit's node arena.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// A handle to a device instance in the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// A handle to an extra current unknown (voltage sources, inductors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// What a slot of the MNA solution vector stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unknown {
    /// Node voltage variable
    Voltage(NodeId),
    /// Branch current variable
    Current(BranchId),
}

impl Unknown {
    /// Whether this unknown is a node voltage.
    pub fn is_voltage(&self) -> bool {
        matches!(self, Unknown::Voltage(_))
    }
}

/// A circuit terminal.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier
    pub name: String,
    /// Position in the unknown vector; `None` for ground
    pub index: Option<usize>,
}

/// An auxiliary current unknown.
#[derive(Debug, Clone)]
pub struct Branch {
    /// Name of the owning device, e.g. `V1`
    pub name: String,
    /// Position in the unknown vector
    pub index: usize,
}
