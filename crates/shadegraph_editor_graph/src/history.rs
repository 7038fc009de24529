// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of whole-graph snapshots.
//!
//! Each checkpoint stores an encoded copy of the graph's nodes, connections
//! and ID counter. Snapshots are immutable once pushed; restoring one never
//! pushes a new entry.

use crate::graph::{Graph, GraphState};
use std::collections::VecDeque;
use thiserror::Error;

/// Maximum number of snapshots kept
pub const MAX_HISTORY: usize = 50;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Encoded, immutable copy of a graph state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    /// Encoded [`GraphState`]
    data: Vec<u8>,
}

impl HistorySnapshot {
    /// Capture the current state of a graph
    pub fn capture(graph: &Graph) -> Result<Self> {
        let data = bincode::serialize(&graph.snapshot())?;
        Ok(Self { data })
    }

    /// Decode the captured state
    pub fn state(&self) -> Result<GraphState> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    /// Snapshots, oldest first
    snapshots: VecDeque<HistorySnapshot>,
    /// Index of the snapshot matching the live graph
    cursor: usize,
    /// Maximum number of snapshots
    max_depth: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Record the current graph state as the newest entry.
    ///
    /// Entries after the cursor (undone actions) are discarded, and the oldest
    /// entry is evicted once the depth limit is exceeded.
    pub fn checkpoint(&mut self, graph: &Graph) -> Result<()> {
        let snapshot = HistorySnapshot::capture(graph)?;

        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push_back(snapshot);

        while self.snapshots.len() > self.max_depth {
            self.snapshots.pop_front();
        }
        self.cursor = self.snapshots.len() - 1;

        Ok(())
    }

    /// Step back one entry and restore it into `graph`
    pub fn undo(&mut self, graph: &mut Graph) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.restore_at(self.cursor - 1, graph)
    }

    /// Step forward one entry and restore it into `graph`
    pub fn redo(&mut self, graph: &mut Graph) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.restore_at(self.cursor + 1, graph)
    }

    fn restore_at(&mut self, index: usize, graph: &mut Graph) -> bool {
        match self.snapshots[index].state() {
            Ok(state) => {
                graph.restore(state);
                self.cursor = index;
                true
            }
            Err(err) => {
                tracing::error!("Failed to restore history entry {index}: {err}");
                false
            }
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been checkpointed yet
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot matching the live graph
    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.cursor)
    }

    /// Total memory used by history (bytes)
    pub fn memory_used(&self) -> usize {
        self.snapshots.iter().map(HistorySnapshot::size).sum()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::registry::NodeRegistry;
    use std::sync::Arc;

    fn graph() -> Graph {
        Graph::new(Arc::new(NodeRegistry::new()))
    }

    #[test]
    fn test_undo_redo_symmetry() {
        let mut graph = graph();
        let mut history = History::new();
        history.checkpoint(&graph).unwrap();
        let initial = HistorySnapshot::capture(&graph).unwrap();

        let color = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        history.checkpoint(&graph).unwrap();
        let output = graph.add_node(NodeKind::MaterialOutput, [300.0, 0.0]);
        history.checkpoint(&graph).unwrap();
        graph.add_connection(color, 0, output, 0);
        history.checkpoint(&graph).unwrap();
        graph.move_node(color, [-50.0, 80.0]);
        history.checkpoint(&graph).unwrap();
        let last = HistorySnapshot::capture(&graph).unwrap();

        for _ in 0..4 {
            assert!(history.undo(&mut graph));
        }
        assert!(!history.undo(&mut graph));
        assert_eq!(HistorySnapshot::capture(&graph).unwrap(), initial);

        for _ in 0..4 {
            assert!(history.redo(&mut graph));
        }
        assert!(!history.redo(&mut graph));
        assert_eq!(HistorySnapshot::capture(&graph).unwrap(), last);
    }

    #[test]
    fn test_new_checkpoint_discards_redo_branch() {
        let mut graph = graph();
        let mut history = History::new();
        history.checkpoint(&graph).unwrap();
        graph.add_node(NodeKind::Float, [0.0, 0.0]);
        history.checkpoint(&graph).unwrap();

        assert!(history.undo(&mut graph));
        assert!(history.can_redo());
        graph.add_node(NodeKind::Int, [0.0, 0.0]);
        history.checkpoint(&graph).unwrap();

        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert!(!history.redo(&mut graph));
    }

    #[test]
    fn test_history_bound() {
        let mut graph = graph();
        let mut history = History::new();
        history.checkpoint(&graph).unwrap();
        for i in 0..60 {
            graph.add_node(NodeKind::Float, [i as f32, 0.0]);
            history.checkpoint(&graph).unwrap();
        }
        assert_eq!(history.len(), MAX_HISTORY);

        let mut undos = 0;
        while history.undo(&mut graph) {
            undos += 1;
        }
        assert!(undos <= 50);
        assert_eq!(undos, MAX_HISTORY - 1);
        assert!(!history.undo(&mut graph));
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut graph = graph();
        let mut history = History::new();
        assert!(!history.undo(&mut graph));
        assert!(!history.redo(&mut graph));
        assert!(history.is_empty());
    }
}
