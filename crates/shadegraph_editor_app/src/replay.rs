// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless replay of scripted editor sessions.
//!
//! A script is a RON list of steps: raw input events, time advances, and a
//! few conveniences (`Connect`, `Drag`) that synthesize pointer gestures at
//! the right socket and node positions.

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};
use shadegraph_editor_graph::node::HEADER_HEIGHT;
use shadegraph_editor_graph::{
    EditorError, InputEvent, ManualClock, MaterialGraphEditor, NodeId, NodeKind, PersistenceError, PointerButton,
    PropertyValue, SocketDirection,
};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed script
    #[error("Script parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Editor error
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Save failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A step referenced a node that does not exist
    #[error("Step {step}: unknown node {node}")]
    UnknownNode {
        /// Step index
        step: usize,
        /// Node ID
        node: u64,
    },
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Feed a raw input event (screen coordinates)
    Input(InputEvent),
    /// Advance the clock
    Advance {
        /// Milliseconds
        ms: u64,
    },
    /// Run one frame tick
    Tick,
    /// Place a node
    AddNode {
        /// Node kind
        kind: NodeKind,
        /// World position
        position: [f32; 2],
    },
    /// Drag a wire from an output to an input
    Connect {
        /// Source node
        from: u64,
        /// Source output index
        output: usize,
        /// Target node
        to: u64,
        /// Target input index
        input: usize,
    },
    /// Drag a node by its header to a new world position
    Drag {
        /// Node
        node: u64,
        /// New top-left corner
        to: [f32; 2],
    },
    /// Live property edit
    SetProperty {
        /// Node
        node: u64,
        /// Property key
        key: String,
        /// New value
        value: PropertyValue,
    },
    /// Settle live property edits
    CommitProperty,
    /// Undo
    Undo,
    /// Redo
    Redo,
    /// Write immediately
    Save,
}

/// A replay script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from RON
    pub fn parse(source: &str) -> Result<Self, ReplayError> {
        Ok(ron::from_str(source)?)
    }

    /// Load a script file
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Steps executed
    pub steps: usize,
    /// Nodes at the end
    pub nodes: usize,
    /// Connections at the end
    pub connections: usize,
    /// Whether a preview material was available at the end
    pub has_preview: bool,
}

fn screen_socket(
    editor: &MaterialGraphEditor,
    step: usize,
    node: u64,
    direction: SocketDirection,
    index: usize,
) -> Result<Pos2, ReplayError> {
    let world = editor
        .graph()
        .node(NodeId(node))
        .ok_or(ReplayError::UnknownNode { step, node })?
        .socket_position(direction, index);
    Ok(editor.controller().view().world_to_screen(world))
}

fn gesture(editor: &mut MaterialGraphEditor, from: Pos2, to: Pos2) {
    let button = PointerButton::Primary;
    editor.handle_input(&InputEvent::PointerDown { pos: from, button });
    editor.handle_input(&InputEvent::PointerMove { pos: to });
    editor.handle_input(&InputEvent::PointerUp { pos: to, button });
}

/// Run `script` against `editor`, driving time through `clock`
pub fn run(script: &Script, editor: &mut MaterialGraphEditor, clock: &ManualClock) -> Result<ReplaySummary, ReplayError> {
    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!("Step {index}: {step:?}");
        match step {
            Step::Input(event) => {
                editor.handle_input(event);
            }
            Step::Advance { ms } => clock.advance(Duration::from_millis(*ms)),
            Step::Tick => {
                editor.tick();
            }
            Step::AddNode { kind, position } => {
                editor.add_node(*kind, *position);
            }
            Step::Connect {
                from,
                output,
                to,
                input,
            } => {
                let start = screen_socket(editor, index, *from, SocketDirection::Output, *output)?;
                let end = screen_socket(editor, index, *to, SocketDirection::Input, *input)?;
                gesture(editor, start, end);
            }
            Step::Drag { node, to } => {
                let position = editor
                    .graph()
                    .node(NodeId(*node))
                    .ok_or(ReplayError::UnknownNode { step: index, node: *node })?
                    .position;
                // Grab the header, away from the sockets
                let grab = Vec2::new(HEADER_HEIGHT, HEADER_HEIGHT / 2.0);
                let view = *editor.controller().view();
                let from = view.world_to_screen(Pos2::new(position[0], position[1]) + grab);
                let target = view.world_to_screen(Pos2::new(to[0], to[1]) + grab);
                gesture(editor, from, target);
            }
            Step::SetProperty { node, key, value } => {
                if !editor.edit_property(NodeId(*node), key, value.clone()) {
                    tracing::warn!("Step {index}: property {key} of node {node} rejected");
                }
            }
            Step::CommitProperty => {
                editor.commit_property_edit();
            }
            Step::Undo => {
                editor.undo();
            }
            Step::Redo => {
                editor.redo();
            }
            Step::Save => editor.save_now()?,
        }
    }

    Ok(ReplaySummary {
        steps: script.steps.len(),
        nodes: editor.graph().node_count(),
        connections: editor.graph().connection_count(),
        has_preview: editor.preview().is_some(),
    })
}
