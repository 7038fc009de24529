// SPDX-License-Identifier: MIT OR Apache-2.0
//! Read-only projection of the graph into screen-space draw commands.
//!
//! Commands are emitted back to front: committed wires, the in-progress wire,
//! then each node followed by its sockets and labels. Coordinates are relative
//! to the canvas origin; the painter adds the canvas offset.

use crate::graph::Graph;
use crate::interaction::InteractionController;
use crate::node::{Node, NodeId, HEADER_HEIGHT};
use crate::socket::{SocketDirection, SocketType};
use crate::view::ViewTransform;
use egui::{Align2, Color32, Pos2, Rect};

/// Socket circle radius (world units)
pub const SOCKET_RADIUS: f32 = 6.0;
/// Node corner rounding (world units)
pub const NODE_ROUNDING: f32 = 6.0;
/// Wire thickness (world units)
pub const WIRE_THICKNESS: f32 = 2.5;
/// Horizontal distance of socket labels from the socket (world units)
const LABEL_PADDING: f32 = 12.0;

/// One primitive to paint
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Cubic wire between two sockets
    Wire {
        /// Start (output socket)
        from: Pos2,
        /// End (input socket or pointer)
        to: Pos2,
        /// Stroke color
        color: Color32,
        /// Stroke width
        width: f32,
        /// Wire still being dragged
        pending: bool,
    },
    /// Node background, header and title
    NodeBody {
        /// Node
        node: NodeId,
        /// Screen rectangle
        rect: Rect,
        /// Header height in screen pixels
        header_height: f32,
        /// Header fill
        header_color: Color32,
        /// Title text
        title: String,
        /// Corner rounding in screen pixels
        rounding: f32,
        /// Draw the selection outline
        selected: bool,
    },
    /// Socket circle
    Socket {
        /// Center
        center: Pos2,
        /// Radius in screen pixels
        radius: f32,
        /// Fill color (socket type)
        color: Color32,
        /// Filled when connected, outlined otherwise
        connected: bool,
    },
    /// Socket label
    Label {
        /// Anchor position
        pos: Pos2,
        /// Text
        text: String,
        /// Alignment relative to `pos`
        align: Align2,
        /// Font size in screen pixels
        size: f32,
    },
}

/// Draw commands for one frame
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    /// Commands, back to front
    pub commands: Vec<DrawCommand>,
    /// View used to produce the commands
    pub view: ViewTransform,
}

impl DrawList {
    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate wire commands
    pub fn wires(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Wire { .. }))
    }

    /// Iterate node bodies
    pub fn nodes(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::NodeBody { .. }))
    }
}

fn type_color(socket_type: SocketType) -> Color32 {
    let [r, g, b] = socket_type.color();
    Color32::from_rgb(r, g, b)
}

/// Builds a [`DrawList`] per frame, reusing its buffer
#[derive(Debug, Default)]
pub struct RenderAdapter {
    buffer: DrawList,
    released: bool,
}

impl RenderAdapter {
    /// Create an adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`release`](Self::release) has been called
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drop the frame buffer; later frames produce nothing
    pub fn release(&mut self) {
        self.buffer = DrawList::default();
        self.released = true;
    }

    /// Project the graph for the current view
    pub fn frame(&mut self, graph: &Graph, controller: &InteractionController) -> Option<&DrawList> {
        if self.released {
            return None;
        }

        let view = *controller.view();
        let list = &mut self.buffer;
        list.commands.clear();
        list.view = view;

        let socket = |node: &Node, direction, index| view.world_to_screen(node.socket_position(direction, index));

        for connection in graph.connections() {
            let (Some(from), Some(to)) = (graph.node(connection.from_node), graph.node(connection.to_node)) else {
                continue;
            };
            let color = from
                .output(connection.from_output)
                .map_or(Color32::GRAY, |s| type_color(s.socket_type));
            list.commands.push(DrawCommand::Wire {
                from: socket(from, SocketDirection::Output, connection.from_output),
                to: socket(to, SocketDirection::Input, connection.to_input),
                color,
                width: WIRE_THICKNESS * view.zoom,
                pending: false,
            });
        }

        if let Some((from_node, from_output, current)) = controller.pending_wire() {
            if let Some(source) = graph.node(from_node) {
                let color = source
                    .output(from_output)
                    .map_or(Color32::GRAY, |s| type_color(s.socket_type));
                list.commands.push(DrawCommand::Wire {
                    from: socket(source, SocketDirection::Output, from_output),
                    to: current,
                    color,
                    width: WIRE_THICKNESS * view.zoom,
                    pending: true,
                });
            }
        }

        let registry = graph.registry();
        for node in graph.nodes() {
            let world = node.rect();
            let rect = Rect::from_min_max(view.world_to_screen(world.min), view.world_to_screen(world.max));
            let [r, g, b] = node.color.unwrap_or(registry.describe(node.kind).color);

            list.commands.push(DrawCommand::NodeBody {
                node: node.id,
                rect,
                header_height: HEADER_HEIGHT * view.zoom,
                header_color: Color32::from_rgb(r, g, b),
                title: registry.display_name(node).to_string(),
                rounding: NODE_ROUNDING * view.zoom,
                selected: controller.selection() == Some(node.id),
            });

            for (index, input) in node.inputs.iter().enumerate() {
                let center = socket(node, SocketDirection::Input, index);
                list.commands.push(DrawCommand::Socket {
                    center,
                    radius: SOCKET_RADIUS * view.zoom,
                    color: type_color(input.socket_type),
                    connected: graph.connection_to(node.id, index).is_some(),
                });
                list.commands.push(DrawCommand::Label {
                    pos: Pos2::new(center.x + LABEL_PADDING * view.zoom, center.y),
                    text: input.label.clone(),
                    align: Align2::LEFT_CENTER,
                    size: 10.0 * view.zoom,
                });
            }

            for (index, output) in node.outputs.iter().enumerate() {
                let center = socket(node, SocketDirection::Output, index);
                list.commands.push(DrawCommand::Socket {
                    center,
                    radius: SOCKET_RADIUS * view.zoom,
                    color: type_color(output.socket_type),
                    connected: graph.is_output_connected(node.id, index),
                });
                list.commands.push(DrawCommand::Label {
                    pos: Pos2::new(center.x - LABEL_PADDING * view.zoom, center.y),
                    text: output.label.clone(),
                    align: Align2::RIGHT_CENTER,
                    size: 10.0 * view.zoom,
                });
            }
        }

        Some(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{InputEvent, PointerButton};
    use crate::node::NodeKind;
    use crate::registry::NodeRegistry;
    use std::sync::Arc;

    fn wired_graph() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new(Arc::new(NodeRegistry::new()));
        let color = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let output = graph.add_node(NodeKind::MaterialOutput, [300.0, 0.0]);
        graph.add_connection(color, 0, output, 0);
        (graph, color, output)
    }

    #[test]
    fn test_frame_contents() {
        let (graph, color, output) = wired_graph();
        let mut controller = InteractionController::new();
        controller.select(Some(output));
        let mut adapter = RenderAdapter::new();
        let list = adapter.frame(&graph, &controller).unwrap();

        assert_eq!(list.wires().count(), 1);
        let bodies: Vec<_> = list
            .nodes()
            .map(|c| match c {
                DrawCommand::NodeBody { node, selected, title, .. } => (*node, *selected, title.clone()),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            bodies,
            vec![
                (color, false, "Color".to_string()),
                (output, true, "Material Output".to_string()),
            ]
        );

        let connected = list
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Socket { connected: true, .. }))
            .count();
        assert_eq!(connected, 2);
        assert!(matches!(list.commands[0], DrawCommand::Wire { pending: false, .. }));
    }

    #[test]
    fn test_frame_follows_view() {
        let (graph, color, _) = wired_graph();
        let mut controller = InteractionController::new();
        controller.view_mut().zoom = 2.0;
        controller.view_mut().pan = egui::Vec2::new(10.0, 20.0);
        let mut adapter = RenderAdapter::new();
        let list = adapter.frame(&graph, &controller).unwrap();

        let rect = list
            .nodes()
            .find_map(|c| match c {
                DrawCommand::NodeBody { node, rect, .. } if *node == color => Some(*rect),
                _ => None,
            })
            .unwrap();
        assert_eq!(rect.min, Pos2::new(10.0, 20.0));
        assert_eq!(rect.width(), graph.node(color).unwrap().width * 2.0);
    }

    #[test]
    fn test_pending_wire_is_drawn() {
        let (mut graph, color, _) = wired_graph();
        let mut controller = InteractionController::new();
        let start = graph
            .node(color)
            .unwrap()
            .socket_position(SocketDirection::Output, 0);
        controller.handle_event(
            &mut graph,
            &InputEvent::PointerDown {
                pos: start,
                button: PointerButton::Primary,
            },
        );
        controller.handle_event(&mut graph, &InputEvent::PointerMove { pos: Pos2::new(50.0, 300.0) });

        let mut adapter = RenderAdapter::new();
        let list = adapter.frame(&graph, &controller).unwrap();
        let pending: Vec<_> = list
            .wires()
            .filter(|c| matches!(c, DrawCommand::Wire { pending: true, .. }))
            .collect();
        assert_eq!(pending.len(), 1);
        assert!(matches!(pending[0], DrawCommand::Wire { to, .. } if *to == Pos2::new(50.0, 300.0)));
    }

    #[test]
    fn test_release_stops_frames() {
        let (graph, _, _) = wired_graph();
        let controller = InteractionController::new();
        let mut adapter = RenderAdapter::new();
        assert!(adapter.frame(&graph, &controller).is_some());
        adapter.release();
        assert!(adapter.is_released());
        assert!(adapter.frame(&graph, &controller).is_none());
    }
}
