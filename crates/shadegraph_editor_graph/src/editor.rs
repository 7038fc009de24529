// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material graph editor: wires the graph, interaction, history, persistence,
//! preview and rendering together.
//!
//! Every collaborator is injected through [`MaterialGraphEditor::open`].
//! Completed structural edits go through one path: checkpoint, re-arm the
//! autosave, recompile the preview, notify observers.

use crate::compile::{MaterialCompiler, MaterialHandle, PreviewPipeline};
use crate::graph::Graph;
use crate::history::{History, HistoryError, MAX_HISTORY};
use crate::interaction::{Effect, InputEvent, InteractionController, PASTE_OFFSET, SOCKET_HIT_RADIUS};
use crate::node::{NodeId, NodeKind, PropertyValue};
use crate::observer::{Subscribers, SubscriptionId};
use crate::persistence::{Clock, MaterialStore, PersistenceBridge, PersistenceError, StatusSink, DEFAULT_AUTOSAVE_DELAY};
use crate::registry::NodeRegistry;
use crate::render::{DrawList, RenderAdapter};
use egui::Vec2;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Editor errors
#[derive(Debug, Error)]
pub enum EditorError {
    /// Loading or saving the material failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Capturing the initial history entry failed
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The stored material changed while the editor holds unsaved edits
    #[error("Material changed on disk while edits are unsaved")]
    UnsavedChanges,
}

/// Tunables of an editor session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Quiet period before an autosave fires
    pub autosave_delay: Duration,
    /// Maximum number of history entries
    pub history_depth: usize,
    /// Offset applied to each paste (world units)
    pub paste_offset: Vec2,
    /// Socket hit radius (screen pixels)
    pub socket_hit_radius: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            history_depth: MAX_HISTORY,
            paste_offset: PASTE_OFFSET,
            socket_hit_radius: SOCKET_HIT_RADIUS,
        }
    }
}

/// Why the graph changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    /// A completed edit (checkpointed) or a live property edit
    Edited,
    /// A node moved during a drag
    Moved,
    /// Undo or redo replaced the graph
    Restored,
    /// The graph was reloaded from the store
    Loaded,
}

/// History availability, sent to history observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStatus {
    /// Undo is possible
    pub can_undo: bool,
    /// Redo is possible
    pub can_redo: bool,
    /// Stored entries
    pub len: usize,
}

/// An open material graph
pub struct MaterialGraphEditor {
    graph: Graph,
    controller: InteractionController,
    history: History,
    persistence: PersistenceBridge,
    compiler: Option<Box<dyn MaterialCompiler>>,
    preview: PreviewPipeline,
    render: RenderAdapter,
    graph_observers: Subscribers<GraphChange>,
    history_observers: Subscribers<HistoryStatus>,
    /// A live property edit has not been checkpointed yet
    property_edit_pending: bool,
    closed: bool,
}

impl MaterialGraphEditor {
    /// Load the material and start a session.
    ///
    /// A store without a record starts an empty graph. A missing output node
    /// is inserted. The loaded state becomes the first history entry.
    pub fn open(
        settings: EditorSettings,
        registry: Arc<NodeRegistry>,
        store: Box<dyn MaterialStore>,
        compiler: Option<Box<dyn MaterialCompiler>>,
        status: Box<dyn StatusSink>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, EditorError> {
        let mut persistence = PersistenceBridge::new(store, status, clock, settings.autosave_delay);

        let mut graph = match persistence.load()? {
            Some(record) => Graph::deserialize(registry, &record),
            None => Graph::new(registry),
        };
        if graph.ensure_output_node() {
            persistence.schedule_autosave();
        }

        let mut history = History::with_max_depth(settings.history_depth);
        history.checkpoint(&graph)?;

        tracing::info!(
            "Opened material graph ({} nodes, {} connections)",
            graph.node_count(),
            graph.connection_count()
        );

        let mut editor = Self {
            graph,
            controller: InteractionController::with_settings(settings.socket_hit_radius, settings.paste_offset),
            history,
            persistence,
            compiler,
            preview: PreviewPipeline::new(),
            render: RenderAdapter::new(),
            graph_observers: Subscribers::on_channel(0),
            history_observers: Subscribers::on_channel(1),
            property_edit_pending: false,
            closed: false,
        };
        editor.recompile();
        Ok(editor)
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The interaction controller (view, selection)
    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Mutable interaction controller (focus, text editing, view)
    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    /// Selected node
    pub fn selection(&self) -> Option<NodeId> {
        self.controller.selection()
    }

    /// Whether undo is possible
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is possible
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether an autosave is waiting
    pub fn has_pending_save(&self) -> bool {
        self.persistence.has_pending()
    }

    /// Latest compiled material
    pub fn preview(&self) -> Option<&MaterialHandle> {
        self.preview.current()
    }

    /// Preview pipeline, for hosts delivering compile results themselves
    pub fn preview_mut(&mut self) -> &mut PreviewPipeline {
        &mut self.preview
    }

    /// Feed one host input event
    pub fn handle_input(&mut self, event: &InputEvent) -> Effect {
        if self.closed {
            return Effect::None;
        }
        let effect = self.controller.handle_event(&mut self.graph, event);
        match effect {
            Effect::None | Effect::Redraw => {}
            Effect::Moved => self.graph_observers.emit(&GraphChange::Moved),
            Effect::Commit(label) => self.commit(label),
            Effect::Undo => {
                self.undo();
            }
            Effect::Redo => {
                self.redo();
            }
        }
        effect
    }

    /// Per-frame housekeeping; fires a due autosave. Returns `true` if a write was attempted.
    pub fn tick(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.persistence.tick(&self.graph)
    }

    /// Draw commands for the current frame
    pub fn frame(&mut self) -> Option<&DrawList> {
        self.render.frame(&self.graph, &self.controller)
    }

    /// Step back one history entry
    pub fn undo(&mut self) -> bool {
        if self.closed || !self.history.undo(&mut self.graph) {
            return false;
        }
        self.after_restore();
        true
    }

    /// Step forward one history entry
    pub fn redo(&mut self) -> bool {
        if self.closed || !self.history.redo(&mut self.graph) {
            return false;
        }
        self.after_restore();
        true
    }

    fn after_restore(&mut self) {
        self.controller.reset();
        self.property_edit_pending = false;
        self.persistence.schedule_autosave();
        self.recompile();
        self.graph_observers.emit(&GraphChange::Restored);
        self.emit_history();
    }

    /// Change a property while the user is still editing it (no history entry)
    pub fn edit_property(&mut self, node: NodeId, key: &str, value: PropertyValue) -> bool {
        if self.closed || !self.graph.set_property(node, key, value) {
            return false;
        }
        self.property_edit_pending = true;
        self.recompile();
        self.graph_observers.emit(&GraphChange::Edited);
        true
    }

    /// Settle live property edits into one history entry
    pub fn commit_property_edit(&mut self) -> bool {
        if self.closed || !self.property_edit_pending {
            return false;
        }
        self.property_edit_pending = false;
        self.commit("Edit property");
        true
    }

    /// Place a node and select it
    pub fn add_node(&mut self, kind: NodeKind, position: [f32; 2]) -> Option<NodeId> {
        if self.closed {
            return None;
        }
        let id = self.graph.add_node(kind, position);
        self.controller.select(Some(id));
        self.commit("Add node");
        Some(id)
    }

    /// Change a node's width
    pub fn resize_node(&mut self, node: NodeId, width: f32) -> bool {
        let before = self.graph.node(node).map(|n| n.width);
        if self.closed || !self.graph.set_node_width(node, width) {
            return false;
        }
        if self.graph.node(node).map(|n| n.width) != before {
            self.commit("Resize node");
        }
        true
    }

    /// Change a node's display name
    pub fn rename_node(&mut self, node: NodeId, name: Option<String>) -> bool {
        if self.closed || !self.graph.set_node_name(node, name) {
            return false;
        }
        self.commit("Rename node");
        true
    }

    /// Replace the graph with the store's current record (after an external change).
    ///
    /// History restarts from the reloaded state. Returns `false` if the store
    /// is empty, holds what this editor last read or wrote (e.g. our own
    /// autosave), or already matches the current graph. Unsaved edits are
    /// never discarded: a changed record is refused with
    /// [`EditorError::UnsavedChanges`] until they are written.
    pub fn reload(&mut self) -> Result<bool, EditorError> {
        if self.closed {
            return Ok(false);
        }
        let Some(record) = self.persistence.load_if_changed()? else {
            return Ok(false);
        };
        if record == self.graph.serialize() {
            self.persistence.mark_synced(record);
            return Ok(false);
        }
        if self.persistence.is_dirty() || self.property_edit_pending {
            tracing::warn!("Not reloading material: unsaved edits");
            return Err(EditorError::UnsavedChanges);
        }
        let mut graph = Graph::deserialize(Arc::clone(self.graph.registry()), &record);
        self.persistence.mark_synced(record);
        if graph.ensure_output_node() {
            self.persistence.schedule_autosave();
        }
        self.history.clear();
        self.history.checkpoint(&graph)?;
        self.graph = graph;
        self.controller.reset();
        self.property_edit_pending = false;
        tracing::info!("Reloaded material graph ({} nodes)", self.graph.node_count());

        self.recompile();
        self.graph_observers.emit(&GraphChange::Loaded);
        self.emit_history();
        Ok(true)
    }

    /// Write immediately
    pub fn save_now(&mut self) -> Result<(), PersistenceError> {
        self.persistence.save_now(&self.graph)
    }

    /// Subscribe to graph changes
    pub fn on_graph_changed(&mut self, callback: impl FnMut(&GraphChange) + 'static) -> SubscriptionId {
        self.graph_observers.subscribe(callback)
    }

    /// Subscribe to history changes
    pub fn on_history_changed(&mut self, callback: impl FnMut(&HistoryStatus) + 'static) -> SubscriptionId {
        self.history_observers.subscribe(callback)
    }

    /// Remove a subscription of either kind
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.graph_observers.unsubscribe(id) || self.history_observers.unsubscribe(id)
    }

    /// End the session: stop input, write unsaved changes, release rendering.
    ///
    /// Calling it again does nothing.
    pub fn close(&mut self) -> Result<(), PersistenceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.controller.detach();
        let result = self.persistence.flush(&self.graph);
        self.render.release();
        self.graph_observers.clear();
        self.history_observers.clear();
        tracing::info!("Closed material graph editor");
        result
    }

    fn commit(&mut self, label: &'static str) {
        tracing::debug!("{label}");
        self.property_edit_pending = false;
        if let Err(err) = self.history.checkpoint(&self.graph) {
            tracing::error!("Failed to record history for {label}: {err}");
        }
        self.persistence.schedule_autosave();
        self.recompile();
        self.graph_observers.emit(&GraphChange::Edited);
        self.emit_history();
    }

    fn emit_history(&mut self) {
        let status = HistoryStatus {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            len: self.history.len(),
        };
        self.history_observers.emit(&status);
    }

    fn recompile(&mut self) {
        let Some(compiler) = &self.compiler else {
            return;
        };
        let ticket = self.preview.request();
        let result = compiler.compile(&self.graph.serialize());
        self.preview.complete(ticket, result);
    }
}

impl std::fmt::Debug for MaterialGraphEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialGraphEditor")
            .field("nodes", &self.graph.node_count())
            .field("connections", &self.graph.connection_count())
            .field("history", &self.history.len())
            .field("persistence", &self.persistence)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::SurfaceCompiler;
    use crate::interaction::{Key, Modifiers, PointerButton};
    use crate::persistence::{LogStatusSink, ManualClock, MemoryMaterialStore};
    use crate::record::{ConnectionRecord, GraphRecord};
    use crate::socket::SocketDirection;
    use egui::Pos2;
    use std::cell::RefCell;

    struct Harness {
        editor: MaterialGraphEditor,
        store: MemoryMaterialStore,
        clock: ManualClock,
        compiles: Rc<RefCell<Vec<GraphRecord>>>,
    }

    fn open_with(store: MemoryMaterialStore) -> Harness {
        let clock = ManualClock::new();
        let compiles = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&compiles);
        let compiler = move |record: &GraphRecord| -> Option<MaterialHandle> {
            seen.borrow_mut().push(record.clone());
            None
        };
        let editor = MaterialGraphEditor::open(
            EditorSettings::default(),
            Arc::new(NodeRegistry::new()),
            Box::new(store.clone()),
            Some(Box::new(compiler)),
            Box::new(LogStatusSink),
            Rc::new(clock.clone()),
        )
        .unwrap();
        Harness {
            editor,
            store,
            clock,
            compiles,
        }
    }

    fn open() -> Harness {
        open_with(MemoryMaterialStore::new())
    }

    fn socket(editor: &MaterialGraphEditor, node: NodeId, direction: SocketDirection, index: usize) -> Pos2 {
        let world = editor.graph().node(node).unwrap().socket_position(direction, index);
        editor.controller().view().world_to_screen(world)
    }

    fn drag(editor: &mut MaterialGraphEditor, from: Pos2, to: Pos2) -> Effect {
        editor.handle_input(&InputEvent::PointerDown {
            pos: from,
            button: PointerButton::Primary,
        });
        editor.handle_input(&InputEvent::PointerMove { pos: to });
        editor.handle_input(&InputEvent::PointerUp {
            pos: to,
            button: PointerButton::Primary,
        })
    }

    fn wire(editor: &mut MaterialGraphEditor, from: NodeId, output: usize, to: NodeId, input: usize) -> Effect {
        let start = socket(editor, from, SocketDirection::Output, output);
        let end = socket(editor, to, SocketDirection::Input, input);
        drag(editor, start, end)
    }

    fn press(editor: &mut MaterialGraphEditor, key: Key) -> Effect {
        editor.handle_input(&InputEvent::Key {
            key,
            modifiers: Modifiers::default(),
        })
    }

    #[test]
    fn test_open_empty_store_inserts_output() {
        let Harness { editor, .. } = open();
        assert_eq!(editor.graph().node_count(), 1);
        assert!(editor.graph().output_node().is_some());
        assert!(!editor.can_undo());
        assert!(editor.has_pending_save());
    }

    #[test]
    fn test_basic_wiring_scenario() {
        let Harness {
            mut editor,
            store,
            clock,
            compiles,
        } = open();
        let output = editor.graph().output_node().unwrap();
        let color = editor.add_node(NodeKind::Color, [0.0, 100.0]).unwrap();

        let effect = wire(&mut editor, color, 0, output, 0);
        assert_eq!(effect, Effect::Commit("Connect"));
        let expected = vec![ConnectionRecord {
            from_node: color.0,
            from_output: 0,
            to_node: output.0,
            to_input: 0,
        }];
        assert_eq!(compiles.borrow().last().unwrap().connections, expected);

        clock.advance(DEFAULT_AUTOSAVE_DELAY);
        assert!(editor.tick());
        let record = store.record().unwrap();
        assert_eq!(record.nodes.len(), 2);
        assert_eq!(record.connections, expected);

        assert!(editor.undo());
        assert_eq!(editor.graph().connection_count(), 0);
        assert!(editor.redo());
        assert_eq!(editor.graph().serialize().connections, expected);
    }

    #[test]
    fn test_replace_connection_scenario() {
        let Harness {
            mut editor, compiles, ..
        } = open();
        let output = editor.graph().output_node().unwrap();
        let first = editor.add_node(NodeKind::Color, [0.0, 0.0]).unwrap();
        let second = editor.add_node(NodeKind::Color, [0.0, 200.0]).unwrap();

        wire(&mut editor, first, 0, output, 0);
        assert_eq!(wire(&mut editor, second, 0, output, 0), Effect::Commit("Connect"));

        let expected = vec![ConnectionRecord {
            from_node: second.0,
            from_output: 0,
            to_node: output.0,
            to_input: 0,
        }];
        assert_eq!(editor.graph().serialize().connections, expected);
        assert_eq!(compiles.borrow().last().unwrap().connections, expected);

        assert!(editor.undo());
        let restored = editor.graph().serialize().connections;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].from_node, first.0);
    }

    #[test]
    fn test_delete_cascade_scenario() {
        let Harness { mut editor, .. } = open();
        let output = editor.graph().output_node().unwrap();
        let color = editor.add_node(NodeKind::Color, [0.0, 400.0]).unwrap();
        let mix = editor.add_node(NodeKind::Mix, [300.0, 400.0]).unwrap();
        assert_eq!(wire(&mut editor, color, 0, mix, 0), Effect::Commit("Connect"));
        assert_eq!(wire(&mut editor, mix, 0, output, 0), Effect::Commit("Connect"));

        let before = editor.graph().serialize();
        assert_eq!(before.connections_for(mix.0).count(), 2);

        let grab = editor
            .controller()
            .view()
            .world_to_screen(Pos2::new(340.0, 410.0));
        assert_eq!(drag(&mut editor, grab, grab), Effect::Redraw);
        assert_eq!(editor.selection(), Some(mix));
        assert_eq!(press(&mut editor, Key::Delete), Effect::Commit("Delete node"));

        let after = editor.graph().serialize();
        assert_eq!(after.connections_for(mix.0).count(), 0);
        assert!(after.connections.is_empty());
        assert_eq!(after.nodes.len(), before.nodes.len() - 1);
        assert!(!after.nodes.contains_key(&mix.to_string()));

        assert!(editor.undo());
        assert_eq!(editor.graph().serialize(), before);
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn test_undo_restores_id_counter() {
        let Harness { mut editor, .. } = open();
        let before = editor.graph().next_id();
        editor.add_node(NodeKind::Float, [0.0, 0.0]);
        assert!(editor.undo());
        assert_eq!(editor.graph().next_id(), before);
    }

    #[test]
    fn test_drag_notifies_moves_then_one_edit() {
        let Harness { mut editor, .. } = open();
        let float = editor.add_node(NodeKind::Float, [0.0, 0.0]).unwrap();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        editor.on_graph_changed(move |change| sink.borrow_mut().push(*change));
        let entries = editor.history.len();

        let grab = Pos2::new(20.0, 10.0);
        drag(&mut editor, grab, grab + Vec2::new(100.0, 50.0));

        assert_eq!(*changes.borrow(), vec![GraphChange::Moved, GraphChange::Edited]);
        assert_eq!(editor.history.len(), entries + 1);
        assert_eq!(editor.graph().node(float).unwrap().position, [100.0, 50.0]);
    }

    #[test]
    fn test_property_edit_settles_once() {
        let Harness { mut editor, .. } = open();
        let float = editor.add_node(NodeKind::Float, [0.0, 0.0]).unwrap();
        let entries = editor.history.len();

        for value in [0.1, 0.2, 0.3] {
            assert!(editor.edit_property(float, "value", PropertyValue::Float(value)));
        }
        assert!(!editor.edit_property(float, "value", PropertyValue::Bool(true)));
        assert_eq!(editor.history.len(), entries);
        assert!(editor.commit_property_edit());
        assert!(!editor.commit_property_edit());
        assert_eq!(editor.history.len(), entries + 1);

        assert!(editor.undo());
        assert_eq!(
            editor.graph().node(float).unwrap().property("value"),
            Some(&PropertyValue::Float(0.0))
        );
    }

    #[test]
    fn test_history_observer_and_unsubscribe() {
        let Harness { mut editor, .. } = open();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = editor.on_history_changed(move |status| sink.borrow_mut().push(*status));

        editor.add_node(NodeKind::Float, [0.0, 0.0]);
        editor.undo();
        assert!(editor.unsubscribe(id));
        editor.redo();

        assert_eq!(
            *seen.borrow(),
            vec![
                HistoryStatus {
                    can_undo: true,
                    can_redo: false,
                    len: 2
                },
                HistoryStatus {
                    can_undo: false,
                    can_redo: true,
                    len: 2
                },
            ]
        );
    }

    #[test]
    fn test_resize_commits_only_on_change() {
        let Harness { mut editor, .. } = open();
        let float = editor.add_node(NodeKind::Float, [0.0, 0.0]).unwrap();
        let entries = editor.history.len();
        assert!(editor.resize_node(float, 240.0));
        assert!(editor.resize_node(float, 240.0));
        assert_eq!(editor.history.len(), entries + 1);
        assert!(!editor.resize_node(NodeId(999), 240.0));
    }

    #[test]
    fn test_close_flushes_and_is_idempotent() {
        let Harness {
            mut editor, store, ..
        } = open();
        editor.add_node(NodeKind::Float, [0.0, 0.0]);
        assert_eq!(store.writes(), 0);

        editor.close().unwrap();
        assert_eq!(store.writes(), 1);
        assert!(editor.is_closed());
        assert!(editor.frame().is_none());

        editor.close().unwrap();
        assert_eq!(store.writes(), 1);
        let effect = editor.handle_input(&InputEvent::PointerDown {
            pos: Pos2::new(0.0, 0.0),
            button: PointerButton::Primary,
        });
        assert_eq!(effect, Effect::None);
        assert!(!editor.undo());
    }

    #[test]
    fn test_open_from_record() {
        let mut graph = Graph::new(Arc::new(NodeRegistry::new()));
        let color = graph.add_node(NodeKind::Color, [0.0, 0.0]);
        let output = graph.add_node(NodeKind::MaterialOutput, [300.0, 0.0]);
        graph.add_connection(color, 0, output, 0);
        let store = MemoryMaterialStore::with_record(graph.serialize());

        let Harness { editor, compiles, .. } = open_with(store);
        assert_eq!(editor.graph().node_count(), 2);
        assert_eq!(editor.graph().connection_count(), 1);
        assert!(!editor.has_pending_save());
        assert_eq!(*compiles.borrow(), vec![graph.serialize()]);
    }

    fn external_write(store: &MemoryMaterialStore, kinds: &[NodeKind]) -> GraphRecord {
        let mut graph = Graph::new(Arc::new(NodeRegistry::new()));
        graph.ensure_output_node();
        for (i, kind) in kinds.iter().enumerate() {
            graph.add_node(*kind, [0.0, 100.0 * (i + 1) as f32]);
        }
        let record = graph.serialize();
        store.clone().write(&record).unwrap();
        record
    }

    #[test]
    fn test_reload_replaces_graph_and_history() {
        let Harness {
            mut editor, store, ..
        } = open();
        editor.add_node(NodeKind::Float, [0.0, 0.0]);
        editor.save_now().unwrap();
        assert!(!editor.reload().unwrap());

        external_write(&store, &[NodeKind::Color, NodeKind::Texture, NodeKind::Int]);
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        editor.on_graph_changed(move |change| sink.borrow_mut().push(*change));

        assert!(editor.reload().unwrap());
        assert_eq!(editor.graph().node_count(), 4);
        assert!(!editor.can_undo());
        assert_eq!(*changes.borrow(), vec![GraphChange::Loaded]);
        assert!(!editor.reload().unwrap());
    }

    #[test]
    fn test_reload_after_own_autosave_keeps_newer_edits() {
        let Harness {
            mut editor,
            store,
            clock,
            ..
        } = open();
        editor.add_node(NodeKind::Float, [0.0, 0.0]);
        clock.advance(DEFAULT_AUTOSAVE_DELAY);
        assert!(editor.tick());
        assert_eq!(store.record().unwrap().nodes.len(), 2);

        editor.add_node(NodeKind::Int, [0.0, 50.0]);
        assert!(!editor.reload().unwrap());
        assert_eq!(editor.graph().node_count(), 3);
        assert!(editor.can_undo());
        assert!(editor.has_pending_save());

        clock.advance(DEFAULT_AUTOSAVE_DELAY);
        assert!(editor.tick());
        assert_eq!(store.record().unwrap().nodes.len(), 3);
    }

    #[test]
    fn test_reload_refuses_to_drop_unsaved_edits() {
        let Harness {
            mut editor,
            store,
            clock,
            ..
        } = open();
        editor.save_now().unwrap();
        let float = editor.add_node(NodeKind::Float, [0.0, 0.0]).unwrap();
        external_write(&store, &[NodeKind::Color]);

        assert!(matches!(editor.reload(), Err(EditorError::UnsavedChanges)));
        assert!(editor.graph().node(float).is_some());
        assert!(editor.can_undo());

        clock.advance(DEFAULT_AUTOSAVE_DELAY);
        assert!(editor.tick());
        assert!(!editor.reload().unwrap());
        assert!(editor.graph().node(float).is_some());
    }

    #[test]
    fn test_reload_refuses_during_live_property_edit() {
        let Harness {
            mut editor, store, ..
        } = open();
        let float = editor.add_node(NodeKind::Float, [0.0, 0.0]).unwrap();
        editor.save_now().unwrap();
        assert!(editor.edit_property(float, "value", PropertyValue::Float(0.5)));
        external_write(&store, &[]);

        assert!(matches!(editor.reload(), Err(EditorError::UnsavedChanges)));
        assert_eq!(
            editor.graph().node(float).unwrap().property("value"),
            Some(&PropertyValue::Float(0.5))
        );
    }

    #[test]
    fn test_surface_compiler_feeds_preview() {
        let registry = Arc::new(NodeRegistry::new());
        let mut editor = MaterialGraphEditor::open(
            EditorSettings::default(),
            Arc::clone(&registry),
            Box::new(MemoryMaterialStore::new()),
            Some(Box::new(SurfaceCompiler::new(registry))),
            Box::new(LogStatusSink),
            Rc::new(ManualClock::new()),
        )
        .unwrap();
        let output = editor.graph().output_node().unwrap();
        assert!(editor.preview().is_some());

        let color = editor.add_node(NodeKind::Color, [0.0, 100.0]).unwrap();
        wire(&mut editor, color, 0, output, 0);
        let description = editor.preview().unwrap().description();
        assert_eq!(description.evaluation_order, vec![color]);
    }
}
