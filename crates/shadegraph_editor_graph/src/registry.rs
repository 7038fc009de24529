// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kind registry: the data-driven schema behind every [`NodeKind`].
//!
//! The set of kinds is closed, but the socket layout, property defaults,
//! default width and header color of each kind live in a table so that a host
//! can override them without touching the graph code.

use crate::node::{Node, NodeId, NodeKind, PropertyValue, DEFAULT_NODE_WIDTH};
use crate::socket::{Socket, SocketType};
use indexmap::IndexMap;

/// Node category (for menus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Constants and mesh attributes
    Input,
    /// Texture operations
    Texture,
    /// Math operations
    Math,
    /// Material outputs
    Output,
}

/// Fixed schema of a node kind
#[derive(Debug, Clone)]
pub struct NodeSchema {
    /// Display name
    pub name: String,
    /// Short description (tooltips)
    pub description: String,
    /// Menu category
    pub category: NodeCategory,
    /// Input sockets
    pub inputs: Vec<Socket>,
    /// Output sockets
    pub outputs: Vec<Socket>,
    /// Properties with their default values
    pub properties: IndexMap<String, PropertyValue>,
    /// Width of a freshly placed node
    pub default_width: f32,
    /// Header color
    pub color: [u8; 3],
}

impl NodeSchema {
    fn new(name: &str, description: &str, category: NodeCategory, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: IndexMap::new(),
            default_width: DEFAULT_NODE_WIDTH,
            color,
        }
    }

    fn input(mut self, label: &str, socket_type: SocketType) -> Self {
        self.inputs.push(Socket::new(label, socket_type));
        self
    }

    fn output(mut self, label: &str, socket_type: SocketType) -> Self {
        self.outputs.push(Socket::new(label, socket_type));
        self
    }

    fn property(mut self, key: &str, default: PropertyValue) -> Self {
        self.properties.insert(key.to_string(), default);
        self
    }

    fn width(mut self, width: f32) -> Self {
        self.default_width = width;
        self
    }
}

const INPUT_COLOR: [u8; 3] = [70, 100, 130];
const TEXTURE_COLOR: [u8; 3] = [120, 80, 140];
const MATH_COLOR: [u8; 3] = [60, 110, 80];
const OUTPUT_COLOR: [u8; 3] = [140, 70, 60];

fn builtin_schema(kind: NodeKind) -> NodeSchema {
    use SocketType as T;

    match kind {
        NodeKind::Color => NodeSchema::new("Color", "Constant color value", NodeCategory::Input, INPUT_COLOR)
            .output("Color", T::Color)
            .property("color", PropertyValue::Color([0.8, 0.8, 0.8, 1.0]))
            .width(160.0),
        NodeKind::Float => NodeSchema::new("Float", "Constant float value", NodeCategory::Input, INPUT_COLOR)
            .output("Value", T::Float)
            .property("value", PropertyValue::Float(0.0))
            .width(160.0),
        NodeKind::Int => NodeSchema::new("Int", "Constant integer value", NodeCategory::Input, INPUT_COLOR)
            .output("Value", T::Int)
            .property("value", PropertyValue::Int(0))
            .width(160.0),
        NodeKind::Bool => NodeSchema::new("Bool", "Constant boolean value", NodeCategory::Input, INPUT_COLOR)
            .output("Value", T::Bool)
            .property("value", PropertyValue::Bool(false))
            .width(160.0),
        NodeKind::Vec2 => NodeSchema::new("Vector2", "Constant 2D vector value", NodeCategory::Input, INPUT_COLOR)
            .output("Vector", T::Vec2)
            .property("value", PropertyValue::Vec2([0.0; 2])),
        NodeKind::Vec3 => NodeSchema::new("Vector3", "Constant 3D vector value", NodeCategory::Input, INPUT_COLOR)
            .output("Vector", T::Vec3)
            .property("value", PropertyValue::Vec3([0.0; 3])),
        NodeKind::Vec4 => NodeSchema::new("Vector4", "Constant 4D vector value", NodeCategory::Input, INPUT_COLOR)
            .output("Vector", T::Vec4)
            .property("value", PropertyValue::Vec4([0.0; 4])),
        NodeKind::UvCoord => NodeSchema::new("UV Coordinates", "Mesh UV coordinates", NodeCategory::Input, INPUT_COLOR)
            .output("UV", T::Vec2)
            .property("tiling", PropertyValue::Vec2([1.0, 1.0])),
        NodeKind::Texture => NodeSchema::new("Texture", "Texture asset reference", NodeCategory::Texture, TEXTURE_COLOR)
            .output("Texture", T::Texture)
            .property("path", PropertyValue::Text(String::new())),
        NodeKind::TextureSample => NodeSchema::new("Texture Sample", "Sample a 2D texture", NodeCategory::Texture, TEXTURE_COLOR)
            .input("Texture", T::Texture)
            .input("UV", T::Vec2)
            .output("Color", T::Color)
            .output("Alpha", T::Float)
            .width(200.0),
        NodeKind::Add => NodeSchema::new("Add", "Add two values", NodeCategory::Math, MATH_COLOR)
            .input("A", T::Vec4)
            .input("B", T::Vec4)
            .output("Result", T::Vec4),
        NodeKind::Multiply => NodeSchema::new("Multiply", "Multiply two values", NodeCategory::Math, MATH_COLOR)
            .input("A", T::Vec4)
            .input("B", T::Vec4)
            .output("Result", T::Vec4),
        NodeKind::Mix => NodeSchema::new("Mix", "Linear interpolation between A and B", NodeCategory::Math, MATH_COLOR)
            .input("A", T::Color)
            .input("B", T::Color)
            .input("T", T::Float)
            .output("Result", T::Color)
            .property("factor", PropertyValue::Float(0.5)),
        NodeKind::MaterialOutput => NodeSchema::new("Material Output", "Final PBR material output", NodeCategory::Output, OUTPUT_COLOR)
            .input("Base Color", T::Color)
            .input("Metallic", T::Float)
            .input("Roughness", T::Float)
            .input("Normal", T::Vec3)
            .input("Emission", T::Color)
            .input("Opacity", T::Float)
            .width(200.0),
    }
}

/// Registry of node schemas, one per [`NodeKind`]
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Schemas by kind; every kind is present from construction on
    types: IndexMap<NodeKind, NodeSchema>,
}

impl NodeRegistry {
    /// Create the registry with the built-in material schemas
    pub fn new() -> Self {
        let types = NodeKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin_schema(kind)))
            .collect();
        Self { types }
    }

    /// Replace the schema of a kind
    pub fn register(&mut self, kind: NodeKind, schema: NodeSchema) {
        self.types.insert(kind, schema);
    }

    /// Get the schema of a kind
    pub fn describe(&self, kind: NodeKind) -> &NodeSchema {
        &self.types[&kind]
    }

    /// Get kinds by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = NodeKind> + '_ {
        self.types
            .iter()
            .filter(move |(_, schema)| schema.category == category)
            .map(|(kind, _)| *kind)
    }

    /// Build a node of `kind` from its schema
    pub fn instantiate(&self, kind: NodeKind, id: NodeId, position: [f32; 2]) -> Node {
        let schema = self.describe(kind);
        Node {
            id,
            kind,
            name: None,
            color: None,
            position,
            width: schema.default_width,
            inputs: schema.inputs.clone(),
            outputs: schema.outputs.clone(),
            properties: schema.properties.clone(),
        }
    }

    /// Display name of a node (its override or the schema name)
    pub fn display_name<'a>(&'a self, node: &'a Node) -> &'a str {
        node.name
            .as_deref()
            .unwrap_or_else(|| self.describe(node.kind).name.as_str())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_is_described() {
        let registry = NodeRegistry::new();
        for kind in NodeKind::ALL {
            assert!(!registry.describe(kind).name.is_empty());
        }
    }

    #[test]
    fn test_wiring_scenario_sockets() {
        let registry = NodeRegistry::new();
        let color = registry.describe(NodeKind::Color);
        let output = registry.describe(NodeKind::MaterialOutput);
        assert_eq!(color.outputs[0].socket_type, SocketType::Color);
        assert_eq!(output.inputs[0].socket_type, SocketType::Color);
        assert!(output.outputs.is_empty());
    }

    #[test]
    fn test_instantiate_uses_schema() {
        let registry = NodeRegistry::new();
        let node = registry.instantiate(NodeKind::Mix, NodeId(7), [1.0, 2.0]);
        assert_eq!(node.id, NodeId(7));
        assert_eq!(node.inputs.len(), 3);
        assert_eq!(node.property("factor"), Some(&PropertyValue::Float(0.5)));
        assert_eq!(registry.display_name(&node), "Mix");
    }

    #[test]
    fn test_register_overrides_schema() {
        let mut registry = NodeRegistry::new();
        let mut schema = registry.describe(NodeKind::Float).clone();
        schema.default_width = 300.0;
        registry.register(NodeKind::Float, schema);
        assert_eq!(registry.describe(NodeKind::Float).default_width, 300.0);
        assert_eq!(registry.types_in_category(NodeCategory::Output).count(), 1);
    }
}
