// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background persistence of the graph into the material record.
//!
//! Saves are triggered by a trailing debounce: every structural edit re-arms a
//! single deadline and only the last request before it expires writes.
//! Failed writes are reported through the status sink and are not retried;
//! the next edit re-arms the timer, which is the implicit retry.

use crate::graph::Graph;
use crate::record::{GraphRecord, RecordError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default quiet period before an autosave fires
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(1);

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No material is attached to the editor
    #[error("No material target configured")]
    NoTarget,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record encoding error
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The store refused the write
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Storage for the material record
pub trait MaterialStore {
    /// Read the persisted record, `None` if nothing has been saved yet
    fn load(&mut self) -> Result<Option<GraphRecord>, PersistenceError>;

    /// Persist a record, replacing the previous one
    fn write(&mut self, record: &GraphRecord) -> Result<(), PersistenceError>;
}

/// Receiver of transient, user-visible status messages
pub trait StatusSink {
    /// Report a status message
    fn on_status(&mut self, message: &str, is_error: bool);
}

impl<F: FnMut(&str, bool)> StatusSink for F {
    fn on_status(&mut self, message: &str, is_error: bool) {
        self(message, is_error);
    }
}

/// Status sink that forwards to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn on_status(&mut self, message: &str, is_error: bool) {
        if is_error {
            tracing::warn!("{message}");
        } else {
            tracing::info!("{message}");
        }
    }
}

/// Source of the current time
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock shared between clones (tests, scripted replay)
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    record: Option<GraphRecord>,
    writes: usize,
    fail_writes: bool,
}

/// In-memory store, shared between clones so a caller can inspect what an
/// editor wrote
#[derive(Debug, Clone, Default)]
pub struct MemoryMaterialStore {
    state: Rc<RefCell<MemoryStoreState>>,
}

impl MemoryMaterialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `record`
    pub fn with_record(record: GraphRecord) -> Self {
        let store = Self::new();
        store.state.borrow_mut().record = Some(record);
        store
    }

    /// Last record written (or seeded)
    pub fn record(&self) -> Option<GraphRecord> {
        self.state.borrow().record.clone()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl MaterialStore for MemoryMaterialStore {
    fn load(&mut self) -> Result<Option<GraphRecord>, PersistenceError> {
        Ok(self.state.borrow().record.clone())
    }

    fn write(&mut self, record: &GraphRecord) -> Result<(), PersistenceError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(PersistenceError::Rejected("store is read-only".to_string()));
        }
        state.record = Some(record.clone());
        state.writes += 1;
        Ok(())
    }
}

/// Debounced autosave in front of a [`MaterialStore`]
pub struct PersistenceBridge {
    store: Box<dyn MaterialStore>,
    status: Box<dyn StatusSink>,
    clock: Rc<dyn Clock>,
    delay: Duration,
    /// When the pending autosave fires
    deadline: Option<Instant>,
    /// The in-memory graph has changes the store has not accepted
    dirty: bool,
    /// Record last read from or accepted by the store
    last_synced: Option<GraphRecord>,
}

impl PersistenceBridge {
    /// Create a bridge
    pub fn new(
        store: Box<dyn MaterialStore>,
        status: Box<dyn StatusSink>,
        clock: Rc<dyn Clock>,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            status,
            clock,
            delay,
            deadline: None,
            dirty: false,
            last_synced: None,
        }
    }

    /// Read the persisted record
    pub fn load(&mut self) -> Result<Option<GraphRecord>, PersistenceError> {
        let record = self.store.load()?;
        if record.is_some() {
            self.last_synced.clone_from(&record);
        }
        Ok(record)
    }

    /// Read the persisted record unless it is the one last read or written
    pub fn load_if_changed(&mut self) -> Result<Option<GraphRecord>, PersistenceError> {
        Ok(self.store.load()?.filter(|record| !self.is_in_sync_with(record)))
    }

    /// Remember `record` as the store's current content
    pub fn mark_synced(&mut self, record: GraphRecord) {
        self.last_synced = Some(record);
    }

    /// Whether `record` is what this bridge last read or wrote, i.e. the store
    /// holds nothing new
    pub fn is_in_sync_with(&self, record: &GraphRecord) -> bool {
        self.last_synced.as_ref() == Some(record)
    }

    /// (Re)start the autosave timer
    pub fn schedule_autosave(&mut self) {
        self.deadline = Some(self.clock.now() + self.delay);
        self.dirty = true;
    }

    /// Whether an autosave is waiting for its deadline
    pub fn has_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether there are changes the store has not accepted yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Fire the autosave if its deadline has passed. Returns `true` if a write was attempted.
    pub fn tick(&mut self, graph: &Graph) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                self.status.on_status("Autosaving…", false);
                // Failure is already reported through the status sink
                let _ = self.write(graph);
                true
            }
            _ => false,
        }
    }

    /// Write immediately if anything is unsaved, bypassing the debounce
    pub fn flush(&mut self, graph: &Graph) -> Result<(), PersistenceError> {
        if !self.dirty {
            self.deadline = None;
            return Ok(());
        }
        self.save_now(graph)
    }

    /// Write immediately
    pub fn save_now(&mut self, graph: &Graph) -> Result<(), PersistenceError> {
        self.deadline = None;
        self.write(graph)
    }

    fn write(&mut self, graph: &Graph) -> Result<(), PersistenceError> {
        let record = graph.serialize();
        match self.store.write(&record) {
            Ok(()) => {
                self.dirty = false;
                tracing::debug!("Saved material ({} nodes)", record.nodes.len());
                self.last_synced = Some(record);
                self.status.on_status("Saved", false);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Failed to save material: {err}");
                self.status.on_status(&format!("Error saving: {err}"), true);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("delay", &self.delay)
            .field("deadline", &self.deadline)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::registry::NodeRegistry;
    use std::sync::Arc;

    type StatusLog = Rc<RefCell<Vec<(String, bool)>>>;

    fn bridge(store: &MemoryMaterialStore, clock: &ManualClock) -> (PersistenceBridge, StatusLog) {
        let log: StatusLog = Rc::default();
        let sink = Rc::clone(&log);
        let bridge = PersistenceBridge::new(
            Box::new(store.clone()),
            Box::new(move |message: &str, is_error: bool| {
                sink.borrow_mut().push((message.to_string(), is_error));
            }),
            Rc::new(clock.clone()),
            DEFAULT_AUTOSAVE_DELAY,
        );
        (bridge, log)
    }

    fn graph() -> Graph {
        let mut graph = Graph::new(Arc::new(NodeRegistry::new()));
        graph.ensure_output_node();
        graph
    }

    #[test]
    fn test_trailing_debounce_writes_once() {
        let store = MemoryMaterialStore::new();
        let clock = ManualClock::new();
        let (mut bridge, log) = bridge(&store, &clock);
        let mut graph = graph();

        for _ in 0..5 {
            graph.add_node(NodeKind::Float, [0.0, 0.0]);
            bridge.schedule_autosave();
            clock.advance(Duration::from_millis(400));
            assert!(!bridge.tick(&graph));
        }
        assert_eq!(store.writes(), 0);

        clock.advance(Duration::from_millis(600));
        assert!(bridge.tick(&graph));
        assert!(!bridge.tick(&graph));
        assert_eq!(store.writes(), 1);
        assert_eq!(store.record().unwrap().nodes.len(), 6);
        assert_eq!(
            *log.borrow(),
            vec![("Autosaving…".to_string(), false), ("Saved".to_string(), false)]
        );
    }

    #[test]
    fn test_failed_write_is_reported_not_retried() {
        let store = MemoryMaterialStore::new();
        store.set_fail_writes(true);
        let clock = ManualClock::new();
        let (mut bridge, log) = bridge(&store, &clock);
        let graph = graph();
        let before = graph.snapshot();

        bridge.schedule_autosave();
        clock.advance(DEFAULT_AUTOSAVE_DELAY);
        assert!(bridge.tick(&graph));
        clock.advance(Duration::from_secs(10));
        assert!(!bridge.tick(&graph));

        let errors: Vec<_> = log.borrow().iter().filter(|(_, e)| *e).cloned().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.starts_with("Error saving"));
        assert!(bridge.is_dirty());
        assert_eq!(graph.snapshot(), before);
    }

    #[test]
    fn test_flush_bypasses_debounce() {
        let store = MemoryMaterialStore::new();
        let clock = ManualClock::new();
        let (mut bridge, _log) = bridge(&store, &clock);
        let graph = graph();

        bridge.flush(&graph).unwrap();
        assert_eq!(store.writes(), 0);

        bridge.schedule_autosave();
        bridge.flush(&graph).unwrap();
        assert_eq!(store.writes(), 1);
        assert!(!bridge.has_pending());
        assert!(!bridge.is_dirty());
    }

    #[test]
    fn test_tracks_last_synced_record() {
        let mut graph = graph();
        let seeded = graph.serialize();
        let store = MemoryMaterialStore::with_record(seeded.clone());
        let clock = ManualClock::new();
        let (mut bridge, _log) = bridge(&store, &clock);
        assert!(!bridge.is_in_sync_with(&seeded));

        assert_eq!(bridge.load().unwrap(), Some(seeded.clone()));
        assert!(bridge.is_in_sync_with(&seeded));
        assert_eq!(bridge.load_if_changed().unwrap(), None);

        graph.add_node(NodeKind::Float, [0.0, 0.0]);
        bridge.save_now(&graph).unwrap();
        assert!(bridge.is_in_sync_with(&graph.serialize()));
        assert!(!bridge.is_in_sync_with(&seeded));
        assert_eq!(bridge.load_if_changed().unwrap(), None);

        store.set_fail_writes(true);
        graph.add_node(NodeKind::Int, [0.0, 50.0]);
        assert!(bridge.save_now(&graph).is_err());
        assert!(!bridge.is_in_sync_with(&graph.serialize()));
    }
}
