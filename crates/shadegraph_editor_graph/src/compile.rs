// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material compilation requests and the preview they feed.
//!
//! Compilers may finish out of order. Each request gets a generation number
//! and only the result of the newest request is applied; older results are
//! dropped on completion. A compiler returning `None` ("not compilable yet")
//! leaves the previous preview in place.

use crate::graph::Graph;
use crate::node::{NodeId, NodeKind, PropertyValue};
use crate::record::GraphRecord;
use crate::registry::NodeRegistry;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// How one input of the material output is driven
#[derive(Debug, Clone, PartialEq)]
pub enum InputBinding {
    /// Nothing connected; the renderer default applies
    Default,
    /// Connected to a constant node, folded to its value
    Constant(PropertyValue),
    /// Connected to a computed node output
    Linked {
        /// Source node
        node: NodeId,
        /// Source output index
        output: usize,
    },
}

/// Renderable description of a compiled material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescription {
    /// The material output node
    pub output: NodeId,
    /// Binding of each output input, by socket label
    pub inputs: IndexMap<String, InputBinding>,
    /// Nodes feeding the output, sources first
    pub evaluation_order: Vec<NodeId>,
    /// Texture paths referenced by those nodes
    pub textures: Vec<String>,
}

/// Opaque handle to a compiled material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialHandle(Arc<MaterialDescription>);

impl MaterialHandle {
    /// Wrap a description
    pub fn new(description: MaterialDescription) -> Self {
        Self(Arc::new(description))
    }

    /// The compiled description
    pub fn description(&self) -> &MaterialDescription {
        &self.0
    }
}

/// Compiles a material record into something renderable
pub trait MaterialCompiler {
    /// Compile, or `None` if the graph can't be resolved to a material yet.
    /// Must not panic for any structurally valid record.
    fn compile(&self, record: &GraphRecord) -> Option<MaterialHandle>;
}

impl<F: Fn(&GraphRecord) -> Option<MaterialHandle>> MaterialCompiler for F {
    fn compile(&self, record: &GraphRecord) -> Option<MaterialHandle> {
        self(record)
    }
}

/// Ticket identifying one compile request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompileTicket(u64);

/// Latest successfully compiled material, guarded by request generations
#[derive(Debug, Default)]
pub struct PreviewPipeline {
    generation: u64,
    current: Option<MaterialHandle>,
}

impl PreviewPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding all earlier ones
    pub fn request(&mut self) -> CompileTicket {
        self.generation += 1;
        CompileTicket(self.generation)
    }

    /// Deliver a compile result. Returns `true` if the preview was updated.
    pub fn complete(&mut self, ticket: CompileTicket, result: Option<MaterialHandle>) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!("Discarding stale compile result {} (latest {})", ticket.0, self.generation);
            return false;
        }
        match result {
            Some(handle) => {
                self.current = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Latest material
    pub fn current(&self) -> Option<&MaterialHandle> {
        self.current.as_ref()
    }
}

/// Reference compiler resolving the output node's inputs.
///
/// Constant nodes wired straight into the output are folded to their value;
/// everything else is left as a link for the renderer to evaluate.
#[derive(Debug, Clone)]
pub struct SurfaceCompiler {
    registry: Arc<NodeRegistry>,
}

impl SurfaceCompiler {
    /// Create a compiler using `registry` for node schemas
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }
}

fn constant_value(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::Color => Some("color"),
        NodeKind::Float
        | NodeKind::Int
        | NodeKind::Bool
        | NodeKind::Vec2
        | NodeKind::Vec3
        | NodeKind::Vec4 => Some("value"),
        _ => None,
    }
}

impl MaterialCompiler for SurfaceCompiler {
    fn compile(&self, record: &GraphRecord) -> Option<MaterialHandle> {
        // Deserializing would drop these nodes
        if let Some(unknown) = record.nodes.values().find(|n| NodeKind::parse(&n.kind).is_none()) {
            tracing::debug!("Not compiling: unknown node kind {:?}", unknown.kind);
            return None;
        }
        let graph = Graph::deserialize(Arc::clone(&self.registry), record);
        let output = graph.output_node()?;
        let order = graph.topological_order().ok()?;

        // Everything upstream of the output
        let mut upstream = HashSet::from([output]);
        let mut queue = VecDeque::from([output]);
        while let Some(current) = queue.pop_front() {
            for connection in graph.connections().filter(|c| c.to_node == current) {
                if upstream.insert(connection.from_node) {
                    queue.push_back(connection.from_node);
                }
            }
        }

        let output_node = graph.node(output)?;
        let inputs = output_node
            .inputs
            .iter()
            .enumerate()
            .map(|(index, socket)| {
                let binding = match graph.connection_to(output, index) {
                    None => InputBinding::Default,
                    Some(connection) => {
                        let source = graph.node(connection.from_node)?;
                        match constant_value(source.kind).and_then(|key| source.property(key)) {
                            Some(value) => InputBinding::Constant(value.clone()),
                            None => InputBinding::Linked {
                                node: connection.from_node,
                                output: connection.from_output,
                            },
                        }
                    }
                };
                Some((socket.label.clone(), binding))
            })
            .collect::<Option<IndexMap<_, _>>>()?;

        let evaluation_order: Vec<NodeId> = order
            .into_iter()
            .filter(|id| *id != output && upstream.contains(id))
            .collect();
        let textures = evaluation_order
            .iter()
            .filter_map(|id| graph.node(*id))
            .filter(|node| node.kind == NodeKind::Texture)
            .filter_map(|node| match node.property("path") {
                Some(PropertyValue::Text(path)) if !path.is_empty() => Some(path.clone()),
                _ => None,
            })
            .collect();

        Some(MaterialHandle::new(MaterialDescription {
            output,
            inputs,
            evaluation_order,
            textures,
        }))
    }
}
