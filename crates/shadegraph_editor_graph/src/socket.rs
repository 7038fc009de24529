// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket (left edge of a node)
    Input,
    /// Output socket (right edge of a node)
    Output,
}

/// Data type carried by a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// Scalar float
    Float,
    /// Integer
    Int,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// 4D vector
    Vec4,
    /// Color (RGBA)
    Color,
    /// Boolean
    Bool,
    /// Texture reference
    Texture,
}

impl SocketType {
    /// Get the wire/socket color for this type (for UI)
    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Float => [80, 200, 80],
            Self::Int => [80, 200, 200],
            Self::Vec2 => [200, 200, 80],
            Self::Vec3 => [200, 150, 80],
            Self::Vec4 => [200, 100, 200],
            Self::Color => [255, 200, 100],
            Self::Bool => [200, 80, 80],
            Self::Texture => [100, 150, 200],
        }
    }

    /// Check if an output of this type may feed an input of `other`
    pub fn can_connect_to(self, other: SocketType) -> bool {
        if self == other {
            return true;
        }

        matches!(
            (self, other),
            (Self::Int, Self::Float)
                | (Self::Float, Self::Int)
                | (Self::Float, Self::Vec2 | Self::Vec3 | Self::Vec4)
                | (Self::Vec2, Self::Vec3 | Self::Vec4)
                | (Self::Vec3, Self::Vec4)
                | (Self::Color, Self::Vec4)
                | (Self::Vec4, Self::Color)
        )
    }
}

/// A typed connection point on a node, addressed by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Display label
    pub label: String,
    /// Data type
    pub socket_type: SocketType,
}

impl Socket {
    /// Create a new socket
    pub fn new(label: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            label: label.into(),
            socket_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_types_connect() {
        assert!(SocketType::Color.can_connect_to(SocketType::Color));
        assert!(SocketType::Texture.can_connect_to(SocketType::Texture));
    }

    #[test]
    fn test_implicit_conversions() {
        assert!(SocketType::Float.can_connect_to(SocketType::Vec3));
        assert!(SocketType::Color.can_connect_to(SocketType::Vec4));
        assert!(!SocketType::Vec3.can_connect_to(SocketType::Float));
        assert!(!SocketType::Texture.can_connect_to(SocketType::Color));
        assert!(!SocketType::Bool.can_connect_to(SocketType::Float));
    }
}
