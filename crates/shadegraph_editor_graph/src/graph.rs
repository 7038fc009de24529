// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store: nodes, connections and the node ID counter.
//!
//! All structural invariants live here:
//! - node IDs are allocated from a monotonic counter and never reused,
//! - at most one connection terminates at any `(node, input)` pair,
//! - removing a node removes every connection that references it,
//! - connections always point at existing nodes and in-range sockets.
//!
//! Violations are never reported as errors. Mutations that would break an
//! invariant are refused and return `false`; corrupt records are healed on load.

use crate::connection::Connection;
use crate::node::{Node, NodeId, NodeKind, PropertyValue, MIN_NODE_WIDTH};
use crate::registry::NodeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Where an auto-inserted output node is placed
pub const DEFAULT_OUTPUT_POSITION: [f32; 2] = [400.0, 100.0];

/// Largest node ID accepted on load (exact as a JSON number)
pub const MAX_NODE_ID: u64 = (1 << 53) - 1;

/// Plain-data state of a graph, as captured by history snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    /// Nodes, back to front
    pub nodes: Vec<Node>,
    /// Connections
    pub connections: Vec<Connection>,
    /// Next node ID to allocate
    pub next_id: u64,
}

/// A shading graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Schema source for new and deserialized nodes
    registry: Arc<NodeRegistry>,
    /// Nodes in insertion order (last is topmost)
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: Vec<Connection>,
    /// Monotonic ID counter
    next_id: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            nodes: IndexMap::new(),
            connections: Vec::new(),
            next_id: 1,
        }
    }

    /// The registry this graph builds nodes from
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        // Loaded counters never exceed MAX_NODE_ID + 1
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// The ID the next added node will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Add a node of `kind` at a world position
    pub fn add_node(&mut self, kind: NodeKind, position: [f32; 2]) -> NodeId {
        let id = self.allocate_id();
        let node = self.registry.instantiate(kind, id, position);
        self.nodes.insert(id, node);
        id
    }

    /// Insert a deep copy of `source` under a fresh ID
    pub fn insert_node_copy(&mut self, source: &Node, position: [f32; 2]) -> NodeId {
        let id = self.allocate_id();
        let mut node = source.clone();
        node.id = id;
        node.position = position;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.connections.retain(|c| !c.involves_node(node_id));
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes, back to front
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs, back to front
    pub fn node_ids(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Move a node to a new world position
    pub fn move_node(&mut self, node_id: NodeId, position: [f32; 2]) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Resize a node horizontally (clamped to [`MIN_NODE_WIDTH`])
    pub fn set_node_width(&mut self, node_id: NodeId, width: f32) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) if width.is_finite() => {
                node.width = width.max(MIN_NODE_WIDTH);
                true
            }
            _ => false,
        }
    }

    /// Set a node's display name override
    pub fn set_node_name(&mut self, node_id: NodeId, name: Option<String>) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.name = name;
                true
            }
            None => false,
        }
    }

    /// Set a property value.
    ///
    /// Refused when the schema declares `key` with a different value type.
    /// Keys the schema does not know are stored as-is.
    pub fn set_property(&mut self, node_id: NodeId, key: &str, value: PropertyValue) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        let schema = self.registry.describe(node.kind);
        if let Some(default) = schema.properties.get(key) {
            if !default.same_type(&value) {
                return false;
            }
        }
        node.properties.insert(key.to_string(), value);
        true
    }

    /// Check that a connection references existing nodes and in-range sockets
    pub fn is_valid_connection(&self, connection: &Connection) -> bool {
        let (Some(from), Some(to)) = (self.node(connection.from_node), self.node(connection.to_node)) else {
            return false;
        };
        connection.from_output < from.outputs.len() && connection.to_input < to.inputs.len()
    }

    /// Connect an output socket to an input socket.
    ///
    /// Any connection already occupying the input is replaced. Returns `false`
    /// without touching the graph if either endpoint is unknown or out of range.
    pub fn add_connection(
        &mut self,
        from_node: NodeId,
        from_output: usize,
        to_node: NodeId,
        to_input: usize,
    ) -> bool {
        let connection = Connection::new(from_node, from_output, to_node, to_input);
        if !self.is_valid_connection(&connection) {
            return false;
        }
        self.remove_connections_to(to_node, to_input);
        self.connections.push(connection);
        true
    }

    /// Remove every connection terminating at an input. Returns how many were removed.
    pub fn remove_connections_to(&mut self, to_node: NodeId, to_input: usize) -> usize {
        let before = self.connections.len();
        self.connections.retain(|c| !c.targets(to_node, to_input));
        before - self.connections.len()
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the connection feeding an input, if any
    pub fn connection_to(&self, to_node: NodeId, to_input: usize) -> Option<&Connection> {
        self.connections.iter().find(|c| c.targets(to_node, to_input))
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.involves_node(node_id))
    }

    /// Whether an output socket feeds at least one input
    pub fn is_output_connected(&self, node_id: NodeId, output: usize) -> bool {
        self.connections
            .iter()
            .any(|c| c.from_node == node_id && c.from_output == output)
    }

    /// The material output node, if present
    pub fn output_node(&self) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.kind == NodeKind::MaterialOutput)
            .map(|n| n.id)
    }

    /// Insert a default output node if the graph has none. Returns `true` if one was added.
    pub fn ensure_output_node(&mut self) -> bool {
        if self.output_node().is_some() {
            return false;
        }
        let id = self.add_node(NodeKind::MaterialOutput, DEFAULT_OUTPUT_POSITION);
        tracing::debug!("Inserted default output node {id}");
        true
    }

    /// Whether connecting `from_node` to `to_node` would close a cycle
    pub fn would_create_cycle(&self, from_node: NodeId, to_node: NodeId) -> bool {
        if from_node == to_node {
            return true;
        }

        // A cycle appears iff `from_node` is already downstream of `to_node`
        let mut queue = VecDeque::from([to_node]);
        let mut seen = HashSet::from([to_node]);
        while let Some(current) = queue.pop_front() {
            for connection in self.connections.iter().filter(|c| c.from_node == current) {
                if connection.to_node == from_node {
                    return true;
                }
                if seen.insert(connection.to_node) {
                    queue.push_back(connection.to_node);
                }
            }
        }
        false
    }

    /// Get nodes in topological order (sources first)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut in_degree: HashMap<NodeId, usize> = self.nodes.keys().map(|id| (*id, 0)).collect();
        for connection in &self.connections {
            if let Some(degree) = in_degree.get_mut(&connection.to_node) {
                *degree += 1;
            }
        }

        let mut ready: VecDeque<NodeId> = self
            .nodes
            .keys()
            .filter(|id| in_degree[*id] == 0)
            .copied()
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node_id) = ready.pop_front() {
            order.push(node_id);
            for connection in self.connections.iter().filter(|c| c.from_node == node_id) {
                if let Some(degree) = in_degree.get_mut(&connection.to_node) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(connection.to_node);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(CycleError)
        }
    }

    /// Capture the plain-data state of the graph
    pub fn snapshot(&self) -> GraphState {
        GraphState {
            nodes: self.nodes.values().cloned().collect(),
            connections: self.connections.clone(),
            next_id: self.next_id,
        }
    }

    /// Replace the graph contents with a previously captured state
    pub fn restore(&mut self, state: GraphState) {
        self.nodes = state.nodes.into_iter().map(|n| (n.id, n)).collect();
        self.connections = state.connections;
        self.next_id = state.next_id;
    }

    /// Assemble a graph from parts, healing anything that breaks an invariant
    pub(crate) fn from_parts(
        registry: Arc<NodeRegistry>,
        nodes: Vec<Node>,
        connections: Vec<Connection>,
        next_id: u64,
    ) -> Self {
        let max_id = nodes
            .iter()
            .map(|n| n.id.0)
            .filter(|id| *id <= MAX_NODE_ID)
            .max()
            .unwrap_or(0);
        let next_id = if next_id > MAX_NODE_ID + 1 {
            tracing::warn!("Ignoring out-of-range next id {next_id}");
            0
        } else {
            next_id
        };
        let mut graph = Self {
            registry,
            nodes: IndexMap::new(),
            connections: Vec::new(),
            next_id: next_id.max(max_id + 1),
        };

        let mut has_output = false;
        for node in nodes {
            if node.id.0 > MAX_NODE_ID {
                tracing::warn!("Dropping node with out-of-range id {}", node.id);
                continue;
            }
            if graph.nodes.contains_key(&node.id) {
                tracing::warn!("Dropping duplicate node {}", node.id);
                continue;
            }
            if node.kind == NodeKind::MaterialOutput {
                if has_output {
                    tracing::warn!("Dropping extra output node {}", node.id);
                    continue;
                }
                has_output = true;
            }
            graph.nodes.insert(node.id, node);
        }

        for connection in connections {
            if !graph.is_valid_connection(&connection) {
                tracing::warn!("Dropping invalid connection {:?}", connection);
                continue;
            }
            if graph.connection_to(connection.to_node, connection.to_input).is_some() {
                tracing::warn!("Dropping duplicate connection into {:?}", connection);
                continue;
            }
            graph.connections.push(connection);
        }

        graph
    }
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        Graph::new(Arc::new(NodeRegistry::new()))
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut graph = graph();
        let a = graph.add_node(NodeKind::Float, [0.0, 0.0]);
        let b = graph.add_node(NodeKind::Float, [0.0, 0.0]);
        graph.remove_node(b);
        let c = graph.add_node(NodeKind::Float, [0.0, 0.0]);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_single_input_invariant() {
        let mut graph = graph();
        let c1 = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let c2 = graph.add_node(NodeKind::Color, [0.0, 100.0]);
        let mix = graph.add_node(NodeKind::Mix, [200.0, 0.0]);

        let attempts = [(c1, 0), (c2, 0), (c1, 1), (c2, 1), (c2, 0), (c1, 0)];
        for (source, input) in attempts {
            assert!(graph.add_connection(source, 0, mix, input));
            for slot in 0..3 {
                let count = graph.connections().filter(|c| c.targets(mix, slot)).count();
                assert!(count <= 1);
            }
        }

        assert_eq!(graph.connection_to(mix, 0).map(|c| c.from_node), Some(c1));
        assert_eq!(graph.connection_to(mix, 1).map(|c| c.from_node), Some(c2));
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_out_of_range_connection_is_refused() {
        let mut graph = graph();
        let color = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let output = graph.add_node(NodeKind::MaterialOutput, [200.0, 0.0]);

        assert!(!graph.add_connection(color, 1, output, 0));
        assert!(!graph.add_connection(color, 0, output, 99));
        assert!(!graph.add_connection(color, 0, NodeId(999), 0));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_cascade_delete() {
        let mut graph = graph();
        let c1 = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let c2 = graph.add_node(NodeKind::Color, [0.0, 100.0]);
        let mix = graph.add_node(NodeKind::Mix, [200.0, 0.0]);
        let output = graph.add_node(NodeKind::MaterialOutput, [400.0, 0.0]);
        graph.add_connection(c1, 0, mix, 0);
        graph.add_connection(c2, 0, mix, 1);
        graph.add_connection(mix, 0, output, 0);
        graph.add_connection(c1, 0, output, 4);

        let removed = graph.remove_node(mix);
        assert_eq!(removed.map(|n| n.kind), Some(NodeKind::Mix));
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.connection_count(), 1);
        for connection in graph.connections() {
            assert!(graph.node(connection.from_node).is_some());
            assert!(graph.node(connection.to_node).is_some());
        }
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut graph = graph();
        assert!(graph.remove_node(NodeId(42)).is_none());
        assert!(!graph.move_node(NodeId(42), [1.0, 1.0]));
        assert!(!graph.set_property(NodeId(42), "value", PropertyValue::Float(1.0)));
        assert_eq!(graph.remove_connections_to(NodeId(42), 0), 0);
    }

    #[test]
    fn test_set_property_checks_schema_type() {
        let mut graph = graph();
        let float = graph.add_node(NodeKind::Float, [0.0, 0.0]);
        assert!(graph.set_property(float, "value", PropertyValue::Float(2.5)));
        assert!(!graph.set_property(float, "value", PropertyValue::Bool(true)));
        assert!(graph.set_property(float, "note", PropertyValue::Text("hi".into())));
        let node = graph.node(float).unwrap();
        assert_eq!(node.property("value"), Some(&PropertyValue::Float(2.5)));
    }

    #[test]
    fn test_width_is_clamped() {
        let mut graph = graph();
        let node = graph.add_node(NodeKind::Float, [0.0, 0.0]);
        assert!(graph.set_node_width(node, 10.0));
        assert_eq!(graph.node(node).unwrap().width, MIN_NODE_WIDTH);
        assert!(!graph.set_node_width(node, f32::NAN));
    }

    #[test]
    fn test_ensure_output_node() {
        let mut graph = graph();
        assert!(graph.ensure_output_node());
        assert!(!graph.ensure_output_node());
        assert_eq!(graph.node_count(), 1);
        assert!(graph.output_node().is_some());
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = graph();
        let a = graph.add_node(NodeKind::Add, [0.0, 0.0]);
        let b = graph.add_node(NodeKind::Multiply, [200.0, 0.0]);
        graph.add_connection(a, 0, b, 0);

        assert!(graph.would_create_cycle(b, a));
        assert!(graph.would_create_cycle(a, a));
        assert!(!graph.would_create_cycle(a, b));
        assert_eq!(graph.topological_order().unwrap(), vec![a, b]);

        // Force a cycle past the guard to exercise the sort
        graph.add_connection(b, 0, a, 0);
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut graph = graph();
        let a = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let state = graph.snapshot();
        graph.add_node(NodeKind::Float, [0.0, 0.0]);
        graph.remove_node(a);

        graph.restore(state.clone());
        assert_eq!(graph.snapshot(), state);
        assert_eq!(graph.next_id(), 2);
    }

    #[test]
    fn test_from_parts_heals_corruption() {
        let registry = Arc::new(NodeRegistry::new());
        let color = registry.instantiate(NodeKind::Color, NodeId(3), [0.0, 0.0]);
        let output = registry.instantiate(NodeKind::MaterialOutput, NodeId(5), [0.0, 0.0]);
        let connections = vec![
            Connection::new(NodeId(3), 0, NodeId(5), 0),
            Connection::new(NodeId(3), 0, NodeId(5), 0),
            Connection::new(NodeId(9), 0, NodeId(5), 1),
            Connection::new(NodeId(3), 4, NodeId(5), 2),
        ];

        let graph = Graph::from_parts(registry, vec![color, output], connections, 0);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.next_id(), 6);
    }

    #[test]
    fn test_from_parts_keeps_first_output_node() {
        let registry = Arc::new(NodeRegistry::new());
        let color = registry.instantiate(NodeKind::Color, NodeId(1), [0.0, 0.0]);
        let first = registry.instantiate(NodeKind::MaterialOutput, NodeId(2), [300.0, 0.0]);
        let second = registry.instantiate(NodeKind::MaterialOutput, NodeId(3), [300.0, 300.0]);
        let connections = vec![
            Connection::new(NodeId(1), 0, NodeId(2), 0),
            Connection::new(NodeId(1), 0, NodeId(3), 0),
        ];

        let mut graph = Graph::from_parts(registry, vec![color, first, second], connections, 0);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.output_node(), Some(NodeId(2)));
        assert!(graph.node(NodeId(3)).is_none());
        assert_eq!(graph.connection_count(), 1);
        assert!(!graph.ensure_output_node());
    }

    #[test]
    fn test_from_parts_caps_ids() {
        let registry = Arc::new(NodeRegistry::new());
        let kept = registry.instantiate(NodeKind::Float, NodeId(MAX_NODE_ID), [0.0, 0.0]);
        let hostile = registry.instantiate(NodeKind::Float, NodeId(u64::MAX), [0.0, 0.0]);

        let mut graph = Graph::from_parts(Arc::clone(&registry), vec![kept, hostile], Vec::new(), u64::MAX);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.next_id(), MAX_NODE_ID + 1);
        let added = graph.add_node(NodeKind::Int, [0.0, 0.0]);
        assert_eq!(added, NodeId(MAX_NODE_ID + 1));
        assert_eq!(graph.next_id(), MAX_NODE_ID + 2);
    }
}
