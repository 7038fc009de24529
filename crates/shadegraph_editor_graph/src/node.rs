// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the shading graph.

use crate::socket::{Socket, SocketDirection};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of the title bar of a node (world units)
pub const HEADER_HEIGHT: f32 = 24.0;
/// Vertical distance between two sockets (world units)
pub const SOCKET_SPACING: f32 = 22.0;
/// Padding below the last socket row (world units)
pub const BODY_PADDING: f32 = 8.0;
/// Default node width when a schema does not specify one
pub const DEFAULT_NODE_WIDTH: f32 = 180.0;
/// Nodes can never be resized narrower than this
pub const MIN_NODE_WIDTH: f32 = 120.0;

/// Unique identifier for a node within a graph.
///
/// Allocated from the graph's monotonic counter and never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds the editor knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Constant color
    Color,
    /// Constant float
    Float,
    /// Constant integer
    Int,
    /// Constant boolean
    Bool,
    /// Constant 2D vector
    Vec2,
    /// Constant 3D vector
    Vec3,
    /// Constant 4D vector
    Vec4,
    /// Mesh UV coordinates
    UvCoord,
    /// Texture asset reference
    Texture,
    /// Sample a texture at a UV
    TextureSample,
    /// A + B
    Add,
    /// A * B
    Multiply,
    /// Linear interpolation between A and B
    Mix,
    /// Final surface output
    MaterialOutput,
}

impl NodeKind {
    /// Every node kind, in menu order
    pub const ALL: [NodeKind; 14] = [
        NodeKind::Color,
        NodeKind::Float,
        NodeKind::Int,
        NodeKind::Bool,
        NodeKind::Vec2,
        NodeKind::Vec3,
        NodeKind::Vec4,
        NodeKind::UvCoord,
        NodeKind::Texture,
        NodeKind::TextureSample,
        NodeKind::Add,
        NodeKind::Multiply,
        NodeKind::Mix,
        NodeKind::MaterialOutput,
    ];

    /// Stable identifier used in serialized records
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::UvCoord => "uv_coord",
            Self::Texture => "texture",
            Self::TextureSample => "texture_sample",
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Mix => "mix",
            Self::MaterialOutput => "material_output",
        }
    }

    /// Parse a serialized kind identifier
    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == id)
    }
}

/// Value of a node property.
///
/// Properties hold plain data only; they never reference other nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector
    Vec4([f32; 4]),
    /// Linear RGBA color
    Color([f32; 4]),
    /// Text (asset paths)
    Text(String),
    /// JSON text of a property this version does not understand
    Opaque(String),
}

impl PropertyValue {
    /// Whether two values are of the same variant
    pub fn same_type(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Encode as JSON for the material record
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Self::Bool(v) => json!(v),
            Self::Int(v) => json!(v),
            Self::Float(v) => json!(v),
            Self::Vec2(v) => json!(v),
            Self::Vec3(v) => json!(v),
            Self::Vec4(v) | Self::Color(v) => json!(v),
            Self::Text(v) => json!(v),
            Self::Opaque(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()))
            }
        }
    }

    /// Decode a JSON value using `template` as the expected type
    pub fn from_json(template: &PropertyValue, value: &serde_json::Value) -> Option<PropertyValue> {
        match template {
            Self::Bool(_) => value.as_bool().map(Self::Bool),
            Self::Int(_) => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::Int),
            Self::Float(_) => value.as_f64().map(|v| Self::Float(v as f32)),
            Self::Vec2(_) => floats::<2>(value).map(Self::Vec2),
            Self::Vec3(_) => floats::<3>(value).map(Self::Vec3),
            Self::Vec4(_) => floats::<4>(value).map(Self::Vec4),
            Self::Color(_) => floats::<4>(value).map(Self::Color),
            Self::Text(_) => value.as_str().map(|s| Self::Text(s.to_string())),
            Self::Opaque(_) => Some(Self::Opaque(value.to_string())),
        }
    }

    /// Decode a JSON value with no schema entry, keeping scalars typed
    pub fn from_untyped_json(value: &serde_json::Value) -> PropertyValue {
        use serde_json::Value;
        match value {
            Value::Bool(v) => Self::Bool(*v),
            Value::String(v) => Self::Text(v.clone()),
            Value::Number(n) => match n.as_i64().and_then(|v| i32::try_from(v).ok()) {
                Some(v) => Self::Int(v),
                None => n
                    .as_f64()
                    .map(|v| v as f32)
                    .filter(|v| v.is_finite())
                    .map_or_else(|| Self::Opaque(value.to_string()), Self::Float),
            },
            _ => Self::Opaque(value.to_string()),
        }
    }
}

fn floats<const N: usize>(value: &serde_json::Value) -> Option<[f32; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()? as f32;
    }
    Some(out)
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node kind (selects socket layout and property schema)
    pub kind: NodeKind,
    /// Display name override
    pub name: Option<String>,
    /// Header color override
    pub color: Option<[u8; 3]>,
    /// Top-left corner in world space
    pub position: [f32; 2],
    /// Width in world space
    pub width: f32,
    /// Input sockets
    pub inputs: Vec<Socket>,
    /// Output sockets
    pub outputs: Vec<Socket>,
    /// Editable properties
    pub properties: IndexMap<String, PropertyValue>,
}

impl Node {
    /// Height in world space, derived from the socket count
    pub fn height(&self) -> f32 {
        let rows = self.inputs.len().max(self.outputs.len());
        HEADER_HEIGHT + rows as f32 * SOCKET_SPACING + BODY_PADDING
    }

    /// World-space extent `[width, height]`
    pub fn size(&self) -> [f32; 2] {
        [self.width, self.height()]
    }

    /// World-space bounding rectangle
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(
            Pos2::new(self.position[0], self.position[1]),
            Vec2::new(self.width, self.height()),
        )
    }

    /// World-space center of a socket
    pub fn socket_position(&self, direction: SocketDirection, index: usize) -> Pos2 {
        let x = match direction {
            SocketDirection::Input => self.position[0],
            SocketDirection::Output => self.position[0] + self.width,
        };
        let y = self.position[1] + HEADER_HEIGHT + index as f32 * SOCKET_SPACING + SOCKET_SPACING / 2.0;
        Pos2::new(x, y)
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// Get a property value
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}
