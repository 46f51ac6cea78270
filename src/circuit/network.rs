//! Node and branch arenas plus the enumeration of MNA unknowns.
//!
//! Nodes and branches share one index counter: every new non-ground node
//! and every new branch takes the next slot of the solution vector, in
//! creation order, starting at 0. Ground has no slot.

use std::collections::HashMap;

use super::types::{Branch, BranchId, Node, NodeId, Unknown};
use crate::error::{NodalError, Result};

/// Canonical name of the ground node.
pub const GROUND_NAME: &str = "0";

/// Check whether a node name refers to ground (`0` or `gnd`).
pub fn is_ground_name(name: &str) -> bool {
    name == GROUND_NAME || name.eq_ignore_ascii_case("gnd")
}

/// Circuit topology: node and branch storage and the unknown layout.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    branches: Vec<Branch>,
    node_map: HashMap<String, NodeId>,
    unknowns: Vec<Unknown>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create a network holding only the ground node.
    pub fn new() -> Self {
        let mut node_map = HashMap::new();
        node_map.insert(GROUND_NAME.to_string(), NodeId::GROUND);
        Self {
            nodes: vec![Node {
                name: GROUND_NAME.to_string(),
                index: None,
            }],
            branches: Vec::new(),
            node_map,
            unknowns: Vec::new(),
        }
    }

    fn canonical(name: &str) -> &str {
        if is_ground_name(name) {
            GROUND_NAME
        } else {
            name
        }
    }

    fn push_node(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let index = self.unknowns.len();
        self.nodes.push(Node {
            name: name.to_string(),
            index: Some(index),
        });
        self.unknowns.push(Unknown::Voltage(id));
        self.node_map.insert(name.to_string(), id);
        id
    }

    /// Create a new node, rejecting an identifier already in use.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId> {
        let name = Self::canonical(name);
        if self.node_map.contains_key(name) {
            return Err(NodalError::DuplicateNode {
                name: name.to_string(),
            });
        }
        Ok(self.push_node(name))
    }

    /// Return the node with this name, creating it on first use.
    pub fn node(&mut self, name: &str) -> NodeId {
        let name = Self::canonical(name);
        match self.node_map.get(name) {
            Some(&id) => id,
            None => self.push_node(name),
        }
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(Self::canonical(name)).copied()
    }

    /// Allocate a branch current unknown owned by the named device.
    pub fn alloc_branch(&mut self, name: impl Into<String>) -> BranchId {
        let id = BranchId(self.branches.len());
        let index = self.unknowns.len();
        self.branches.push(Branch {
            name: name.into(),
            index,
        });
        self.unknowns.push(Unknown::Current(id));
        id
    }

    /// Get the solution-vector index for a node voltage.
    /// Returns None for ground.
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        self.nodes[node.0].index
    }

    /// Get the solution-vector index for a branch current.
    pub fn branch_index(&self, branch: BranchId) -> usize {
        self.branches[branch.0].index
    }

    /// Number of unknowns (matrix dimension).
    pub fn size(&self) -> usize {
        self.unknowns.len()
    }

    /// Meaning of every slot of the solution vector, in index order.
    pub fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    /// All branches in creation order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    /// Get the name of a branch.
    pub fn branch_name(&self, branch: BranchId) -> &str {
        &self.branches[branch.0].name
    }

    /// Human-readable label for a solution-vector slot, e.g. `v(out)`.
    pub fn describe(&self, index: usize) -> String {
        match self.unknowns.get(index) {
            Some(Unknown::Voltage(n)) => format!("v({})", self.node_name(*n)),
            Some(Unknown::Current(b)) => format!("i({})", self.branch_name(*b)),
            None => format!("#{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknowns_are_contiguous_in_creation_order() {
        let mut net = Network::new();
        let a = net.node("a");
        let b = net.node("b");
        let br = net.alloc_branch("V1");
        let c = net.node("c");

        assert_eq!(net.node_index(a), Some(0));
        assert_eq!(net.node_index(b), Some(1));
        assert_eq!(net.branch_index(br), 2);
        assert_eq!(net.node_index(c), Some(3));
        assert_eq!(net.size(), 4);
        assert_eq!(net.unknowns()[2], Unknown::Current(br));
    }

    #[test]
    fn test_ground_aliases() {
        let mut net = Network::new();
        assert_eq!(net.node("0"), NodeId::GROUND);
        assert_eq!(net.node("GND"), NodeId::GROUND);
        assert_eq!(net.node_index(NodeId::GROUND), None);
        assert_eq!(net.size(), 0);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut net = Network::new();
        net.add_node("out").unwrap();
        assert!(matches!(
            net.add_node("out"),
            Err(NodalError::DuplicateNode { .. })
        ));
        assert!(net.add_node("gnd").is_err());
        // Reusing an existing node by lookup is fine
        assert_eq!(net.node("out"), NodeId(1));
    }

    #[test]
    fn test_describe() {
        let mut net = Network::new();
        let out = net.node("out");
        net.alloc_branch("V1");
        assert_eq!(net.describe(0), "v(out)");
        assert_eq!(net.describe(1), "i(V1)");
    }
}
