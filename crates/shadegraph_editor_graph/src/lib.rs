// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-graph editing engine for `ShadeGraph` materials.
//!
//! This crate provides everything behind the material graph canvas:
//! - Typed nodes, sockets and single-input connections
//! - Pan/zoom view math
//! - Pointer and keyboard interaction state machine
//! - Bounded undo/redo history
//! - Debounced autosave through an injected store
//! - Preview compilation with stale-result protection
//!
//! ## Architecture
//!
//! Input events flow into the [`InteractionController`], which mutates the
//! [`Graph`]. Completed edits are checkpointed in [`History`], re-arm the
//! [`PersistenceBridge`] autosave and trigger a preview compile. The
//! [`RenderAdapter`] projects the graph into a [`DrawList`] each frame, and
//! [`ui`] paints it with egui. [`MaterialGraphEditor`] wires these together.

pub mod socket;
pub mod connection;
pub mod node;
pub mod registry;
pub mod graph;
pub mod record;
pub mod view;
pub mod interaction;
pub mod history;
pub mod persistence;
pub mod compile;
pub mod render;
pub mod observer;
pub mod editor;
pub mod ui;

pub use compile::{MaterialCompiler, MaterialDescription, MaterialHandle, PreviewPipeline, SurfaceCompiler};
pub use connection::Connection;
pub use editor::{EditorError, EditorSettings, GraphChange, HistoryStatus, MaterialGraphEditor};
pub use graph::{CycleError, Graph, GraphState};
pub use history::{History, HistoryError};
pub use interaction::{Effect, InputEvent, InteractionController, InteractionState, Key, Modifiers, PointerButton};
pub use node::{Node, NodeId, NodeKind, PropertyValue};
pub use observer::SubscriptionId;
pub use persistence::{
    Clock, LogStatusSink, ManualClock, MaterialStore, MemoryMaterialStore, PersistenceBridge, PersistenceError,
    StatusSink, SystemClock,
};
pub use record::{GraphRecord, RecordError};
pub use registry::{NodeCategory, NodeRegistry, NodeSchema};
pub use render::{DrawCommand, DrawList, RenderAdapter};
pub use socket::{Socket, SocketDirection, SocketType};
pub use view::ViewTransform;
