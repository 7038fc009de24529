// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized form of a graph (the material record).
//!
//! The record is what gets persisted and what the material compiler consumes.
//! Loading is forgiving: unknown node kinds, non-numeric or out-of-range IDs,
//! extra output nodes, malformed property values and dangling connections are
//! dropped with a warning, and missing fields fall back to the schema defaults.

use crate::connection::Connection;
use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind, PropertyValue, MIN_NODE_WIDTH};
use crate::registry::NodeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error when encoding or decoding a record
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// JSON error
    #[error("Invalid material record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecord {
    /// Nodes keyed by stringified ID, back to front
    #[serde(default)]
    pub nodes: IndexMap<String, NodeRecord>,
    /// Connections
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    /// ID counter at save time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<u64>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Kind identifier (see [`NodeKind::as_str`])
    pub kind: String,
    /// Display name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Header color override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
    /// Width (schema default when missing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Top-left corner in world space
    #[serde(default)]
    pub position: PositionRecord,
    /// Property values
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
}

/// Serialized position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// X
    #[serde(default)]
    pub x: f32,
    /// Y
    #[serde(default)]
    pub y: f32,
}

/// Serialized connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    /// Source node ID
    pub from_node: u64,
    /// Source output index
    pub from_output: usize,
    /// Target node ID
    pub to_node: u64,
    /// Target input index
    pub to_input: usize,
}

impl GraphRecord {
    /// Encode as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Connections touching a node ID
    pub fn connections_for(&self, node_id: u64) -> impl Iterator<Item = &ConnectionRecord> {
        self.connections
            .iter()
            .filter(move |c| c.from_node == node_id || c.to_node == node_id)
    }
}

impl Graph {
    /// Serialize into a material record
    pub fn serialize(&self) -> GraphRecord {
        let nodes = self
            .nodes()
            .map(|node| (node.id.to_string(), node_record(node)))
            .collect();
        let connections = self
            .connections()
            .map(|c| ConnectionRecord {
                from_node: c.from_node.0,
                from_output: c.from_output,
                to_node: c.to_node.0,
                to_input: c.to_input,
            })
            .collect();

        GraphRecord {
            nodes,
            connections,
            next_id: Some(self.next_id()),
        }
    }

    /// Rebuild a graph from a material record, healing what can't be loaded
    pub fn deserialize(registry: Arc<NodeRegistry>, record: &GraphRecord) -> Graph {
        let nodes = record
            .nodes
            .iter()
            .filter_map(|(key, node)| node_from_record(&registry, key, node))
            .collect();
        let connections = record
            .connections
            .iter()
            .map(|c| Connection::new(NodeId(c.from_node), c.from_output, NodeId(c.to_node), c.to_input))
            .collect();

        Graph::from_parts(registry, nodes, connections, record.next_id.unwrap_or(0))
    }
}

fn node_record(node: &Node) -> NodeRecord {
    NodeRecord {
        kind: node.kind.as_str().to_string(),
        name: node.name.clone(),
        color: node.color,
        width: Some(node.width),
        position: PositionRecord {
            x: node.position[0],
            y: node.position[1],
        },
        properties: node
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    }
}

fn node_from_record(registry: &NodeRegistry, key: &str, record: &NodeRecord) -> Option<Node> {
    let Ok(id) = key.parse::<u64>() else {
        tracing::warn!("Dropping node with non-numeric id {key:?}");
        return None;
    };
    let Some(kind) = NodeKind::parse(&record.kind) else {
        tracing::warn!("Dropping node {id} of unknown kind {:?}", record.kind);
        return None;
    };

    let position = [record.position.x, record.position.y];
    let mut node = registry.instantiate(kind, NodeId(id), position);
    node.name = record.name.clone();
    node.color = record.color;
    if let Some(width) = record.width.filter(|w| w.is_finite()) {
        node.width = width.max(MIN_NODE_WIDTH);
    }

    for (prop, value) in &record.properties {
        match node.properties.get(prop) {
            Some(template) => match PropertyValue::from_json(template, value) {
                Some(decoded) => {
                    node.properties.insert(prop.clone(), decoded);
                }
                None => tracing::warn!("Node {id}: ignoring malformed property {prop:?}"),
            },
            None => {
                node.properties
                    .insert(prop.clone(), PropertyValue::from_untyped_json(value));
            }
        }
    }

    Some(node)
}
