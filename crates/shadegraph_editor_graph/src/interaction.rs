// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer/keyboard interaction state machine.
//!
//! The controller is the only component that mutates the graph in response
//! to direct manipulation. It never checkpoints or saves by itself: each
//! event returns an [`Effect`] and the owner decides what to do with it.
//! Node drags mutate positions directly and only report a commit on release,
//! so history gets one entry per gesture instead of one per pointer move.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind};
use crate::socket::SocketDirection;
use crate::view::ViewTransform;
use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Socket hit radius in screen pixels
pub const SOCKET_HIT_RADIUS: f32 = 10.0;
/// Offset applied to pasted nodes (world units)
pub const PASTE_OFFSET: Vec2 = Vec2::new(30.0, 30.0);
/// Zoom factor per wheel notch
pub const WHEEL_ZOOM_STEP: f32 = 1.1;

/// Pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    /// Left button / touch
    Primary,
    /// Right button
    Secondary,
    /// Middle button
    Middle,
}

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Alt / Option
    #[serde(default)]
    pub alt: bool,
    /// Control
    #[serde(default)]
    pub ctrl: bool,
    /// Shift
    #[serde(default)]
    pub shift: bool,
    /// Platform command key (Cmd on macOS)
    #[serde(default)]
    pub command: bool,
}

impl Modifiers {
    /// Ctrl or Cmd
    pub fn command_held(&self) -> bool {
        self.ctrl || self.command
    }
}

/// Keys the editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// Z
    Z,
    /// Y
    Y,
    /// C
    C,
    /// X
    X,
    /// V
    V,
    /// Delete
    Delete,
    /// Backspace
    Backspace,
    /// Escape
    Escape,
}

/// Host input event, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Pointer button pressed
    PointerDown {
        /// Pointer position
        pos: Pos2,
        /// Button
        button: PointerButton,
    },
    /// Pointer moved
    PointerMove {
        /// Pointer position
        pos: Pos2,
    },
    /// Pointer button released
    PointerUp {
        /// Pointer position
        pos: Pos2,
        /// Button
        button: PointerButton,
    },
    /// Scroll wheel; positive notches zoom in
    Wheel {
        /// Pointer position
        pos: Pos2,
        /// Scroll amount in notches
        delta: f32,
    },
    /// Key pressed
    Key {
        /// Key
        key: Key,
        /// Held modifiers
        modifiers: Modifiers,
    },
}

/// Current interaction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InteractionState {
    /// Waiting for input
    #[default]
    Idle,
    /// Moving a node
    DraggingNode {
        /// Node being dragged
        node: NodeId,
        /// Pointer position relative to the node origin (world units)
        offset: Vec2,
        /// Node position when the drag started
        start: [f32; 2],
    },
    /// Dragging a new wire out of an output socket
    DraggingConnection {
        /// Source node
        from_node: NodeId,
        /// Source output index
        from_output: usize,
        /// Current wire end (screen space)
        current: Pos2,
    },
    /// Panning the view
    Panning {
        /// Pan when the gesture started
        origin_pan: Vec2,
        /// Pointer when the gesture started
        origin_pointer: Pos2,
    },
}

/// What the owner should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing changed
    None,
    /// View, selection or transient state changed
    Redraw,
    /// The graph changed but the gesture is still in progress
    Moved,
    /// A discrete structural edit completed: checkpoint and autosave
    Commit(&'static str),
    /// Undo requested
    Undo,
    /// Redo requested
    Redo,
}

/// Interaction controller
#[derive(Debug)]
pub struct InteractionController {
    state: InteractionState,
    view: ViewTransform,
    selection: Option<NodeId>,
    clipboard: Option<Node>,
    focused: bool,
    text_editing: bool,
    detached: bool,
    hit_radius: f32,
    paste_offset: Vec2,
    pointer: Option<Pos2>,
}

impl InteractionController {
    /// Create a controller with the default hit radius and paste offset
    pub fn new() -> Self {
        Self::with_settings(SOCKET_HIT_RADIUS, PASTE_OFFSET)
    }

    /// Create a controller with custom hit radius (screen pixels) and paste offset
    pub fn with_settings(hit_radius: f32, paste_offset: Vec2) -> Self {
        Self {
            state: InteractionState::Idle,
            view: ViewTransform::new(),
            selection: None,
            clipboard: None,
            focused: true,
            text_editing: false,
            detached: false,
            hit_radius,
            paste_offset,
            pointer: None,
        }
    }

    /// Current interaction state
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// View transform
    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Mutable view transform
    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    /// Selected node
    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    /// Select a node (replaces any prior selection)
    pub fn select(&mut self, node: Option<NodeId>) {
        self.selection = node;
    }

    /// Clear selection
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Node held by the internal clipboard
    pub fn clipboard(&self) -> Option<&Node> {
        self.clipboard.as_ref()
    }

    /// Last known pointer position (screen space)
    pub fn pointer(&self) -> Option<Pos2> {
        self.pointer
    }

    /// Whether the editor has keyboard focus
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Whether a text field is being edited (suppresses shortcuts)
    pub fn set_text_editing(&mut self, editing: bool) {
        self.text_editing = editing;
    }

    /// Stop reacting to input
    pub fn detach(&mut self) {
        self.detached = true;
        self.state = InteractionState::Idle;
    }

    /// Whether the controller has been detached
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Abort any gesture and clear selection (after the graph was replaced)
    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
        self.selection = None;
    }

    /// In-progress wire: source node, output index and screen end point
    pub fn pending_wire(&self) -> Option<(NodeId, usize, Pos2)> {
        match self.state {
            InteractionState::DraggingConnection {
                from_node,
                from_output,
                current,
            } => Some((from_node, from_output, current)),
            _ => None,
        }
    }

    /// Feed one host event
    pub fn handle_event(&mut self, graph: &mut Graph, event: &InputEvent) -> Effect {
        if self.detached {
            return Effect::None;
        }

        match *event {
            InputEvent::PointerDown { pos, button } => {
                self.pointer = Some(pos);
                self.pointer_down(graph, pos, button)
            }
            InputEvent::PointerMove { pos } => {
                self.pointer = Some(pos);
                self.pointer_move(graph, pos)
            }
            InputEvent::PointerUp { pos, .. } => {
                self.pointer = Some(pos);
                self.pointer_up(graph, pos)
            }
            InputEvent::Wheel { pos, delta } => {
                if delta == 0.0 {
                    return Effect::None;
                }
                self.view.zoom_at(pos, WHEEL_ZOOM_STEP.powf(delta));
                Effect::Redraw
            }
            InputEvent::Key { key, modifiers } => self.key(graph, key, modifiers),
        }
    }

    fn world_hit_radius(&self) -> f32 {
        self.view.screen_len_to_world(self.hit_radius)
    }

    fn pointer_down(&mut self, graph: &mut Graph, pos: Pos2, button: PointerButton) -> Effect {
        if self.state != InteractionState::Idle {
            return Effect::None;
        }

        match button {
            PointerButton::Primary => {}
            PointerButton::Middle => {
                self.start_panning(pos);
                return Effect::Redraw;
            }
            PointerButton::Secondary => return Effect::None,
        }

        let world = self.view.screen_to_world(pos);
        let radius = self.world_hit_radius();

        if let Some((from_node, from_output)) = hit_socket(graph, world, radius, SocketDirection::Output, |_, _| true) {
            tracing::debug!("Start wire from {from_node}:{from_output}");
            self.state = InteractionState::DraggingConnection {
                from_node,
                from_output,
                current: pos,
            };
            return Effect::Redraw;
        }

        let connected = |node: &Node, index: usize| graph.connection_to(node.id, index).is_some();
        if let Some((node, input)) = hit_socket(graph, world, radius, SocketDirection::Input, connected) {
            graph.remove_connections_to(node, input);
            tracing::debug!("Unplugged {node}:{input}");
            return Effect::Commit("Disconnect");
        }

        if let Some(node) = hit_node(graph, world) {
            let position = graph.node(node).map(|n| n.position).unwrap_or_default();
            self.selection = Some(node);
            self.state = InteractionState::DraggingNode {
                node,
                offset: world - Pos2::new(position[0], position[1]),
                start: position,
            };
            return Effect::Redraw;
        }

        self.selection = None;
        self.start_panning(pos);
        Effect::Redraw
    }

    fn start_panning(&mut self, pos: Pos2) {
        self.state = InteractionState::Panning {
            origin_pan: self.view.pan,
            origin_pointer: pos,
        };
    }

    fn pointer_move(&mut self, graph: &mut Graph, pos: Pos2) -> Effect {
        match &mut self.state {
            InteractionState::Idle => Effect::None,
            InteractionState::DraggingNode { node, offset, .. } => {
                let target = self.view.screen_to_world(pos) - *offset;
                if graph.move_node(*node, [target.x, target.y]) {
                    Effect::Moved
                } else {
                    Effect::None
                }
            }
            InteractionState::DraggingConnection { current, .. } => {
                *current = pos;
                Effect::Redraw
            }
            InteractionState::Panning {
                origin_pan,
                origin_pointer,
            } => {
                self.view.pan = *origin_pan + (pos - *origin_pointer);
                Effect::Redraw
            }
        }
    }

    fn pointer_up(&mut self, graph: &mut Graph, pos: Pos2) -> Effect {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle => Effect::None,
            InteractionState::DraggingNode { node, start, .. } => match graph.node(node) {
                Some(n) if n.position != start => Effect::Commit("Move node"),
                _ => Effect::Redraw,
            },
            InteractionState::DraggingConnection {
                from_node,
                from_output,
                ..
            } => self.drop_wire(graph, from_node, from_output, pos),
            InteractionState::Panning { .. } => Effect::Redraw,
        }
    }

    fn drop_wire(&mut self, graph: &mut Graph, from_node: NodeId, from_output: usize, pos: Pos2) -> Effect {
        let Some(source_type) = graph
            .node(from_node)
            .and_then(|n| n.output(from_output))
            .map(|s| s.socket_type)
        else {
            return Effect::Redraw;
        };

        let world = self.view.screen_to_world(pos);
        let accepts = |node: &Node, index: usize| {
            node.id != from_node
                && node
                    .input(index)
                    .is_some_and(|s| source_type.can_connect_to(s.socket_type))
                && !graph.would_create_cycle(from_node, node.id)
        };
        let Some((to_node, to_input)) = hit_socket(graph, world, self.world_hit_radius(), SocketDirection::Input, accepts)
        else {
            tracing::debug!("Wire dropped on nothing");
            return Effect::Redraw;
        };

        let unchanged = graph
            .connection_to(to_node, to_input)
            .is_some_and(|c| c.from_node == from_node && c.from_output == from_output);
        if unchanged {
            return Effect::Redraw;
        }
        if graph.add_connection(from_node, from_output, to_node, to_input) {
            tracing::debug!("Connected {from_node}:{from_output} -> {to_node}:{to_input}");
            Effect::Commit("Connect")
        } else {
            Effect::Redraw
        }
    }

    fn key(&mut self, graph: &mut Graph, key: Key, modifiers: Modifiers) -> Effect {
        if !self.focused || self.text_editing || self.state != InteractionState::Idle {
            return Effect::None;
        }

        let command = modifiers.command_held();
        match key {
            Key::Z if command && modifiers.shift => Effect::Redo,
            Key::Z if command => Effect::Undo,
            Key::Y if command => Effect::Redo,
            Key::C if command => {
                self.copy_selected(graph);
                Effect::None
            }
            Key::X if command => {
                if self.copy_selected(graph) {
                    self.delete_selected(graph)
                } else {
                    Effect::None
                }
            }
            Key::V if command => self.paste(graph),
            Key::Delete | Key::Backspace => self.delete_selected(graph),
            Key::Escape => {
                if self.selection.take().is_some() {
                    Effect::Redraw
                } else {
                    Effect::None
                }
            }
            _ => Effect::None,
        }
    }

    fn editable_selection<'g>(&self, graph: &'g Graph) -> Option<&'g Node> {
        let node = graph.node(self.selection?)?;
        (node.kind != NodeKind::MaterialOutput).then_some(node)
    }

    fn copy_selected(&mut self, graph: &Graph) -> bool {
        match self.editable_selection(graph) {
            Some(node) => {
                self.clipboard = Some(node.clone());
                true
            }
            None => false,
        }
    }

    fn delete_selected(&mut self, graph: &mut Graph) -> Effect {
        let Some(node) = self.editable_selection(graph).map(|n| n.id) else {
            return Effect::None;
        };
        graph.remove_node(node);
        self.selection = None;
        tracing::debug!("Deleted node {node}");
        Effect::Commit("Delete node")
    }

    fn paste(&mut self, graph: &mut Graph) -> Effect {
        let Some(clipboard) = self.clipboard.as_mut() else {
            return Effect::None;
        };
        let position = [
            clipboard.position[0] + self.paste_offset.x,
            clipboard.position[1] + self.paste_offset.y,
        ];
        let id = graph.insert_node_copy(clipboard, position);
        // The next paste cascades from this one
        clipboard.position = position;
        self.selection = Some(id);
        tracing::debug!("Pasted node {id}");
        Effect::Commit("Paste node")
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the first socket within `radius` of `world`, testing nodes topmost first
fn hit_socket(
    graph: &Graph,
    world: Pos2,
    radius: f32,
    direction: SocketDirection,
    accept: impl Fn(&Node, usize) -> bool,
) -> Option<(NodeId, usize)> {
    graph.nodes().rev().find_map(|node| {
        let count = match direction {
            SocketDirection::Input => node.inputs.len(),
            SocketDirection::Output => node.outputs.len(),
        };
        (0..count)
            .find(|&index| {
                node.socket_position(direction, index).distance(world) <= radius && accept(node, index)
            })
            .map(|index| (node.id, index))
    })
}

/// Find the topmost node whose body contains `world`
fn hit_node(graph: &Graph, world: Pos2) -> Option<NodeId> {
    graph
        .nodes()
        .rev()
        .find(|node| node.rect().contains(world))
        .map(|node| node.id)
}
