// SPDX-License-Identifier: MIT OR Apache-2.0
//! Watches the material file for changes made outside the editor.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// Debounce applied to file system events
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(250);

/// Whether `event` creates or modifies the file called `file_name`
fn touches(event: &notify::Event, file_name: Option<&OsStr>) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == file_name)
}

/// Debounced watcher for a single material file.
///
/// The parent directory is watched because atomic saves replace the file.
pub struct MaterialWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: Receiver<()>,
}

impl MaterialWatcher {
    /// Start watching `path`
    pub fn new(path: &Path, debounce: Duration) -> Result<Self, notify::Error> {
        let file_name: Option<OsString> = path.file_name().map(OsStr::to_os_string);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (event_tx, events) = mpsc::channel();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                if events.iter().any(|e| touches(&e.event, file_name.as_deref())) {
                    let _ = event_tx.send(());
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!("Material watcher error: {error}");
                }
            }
        })?;
        debouncer.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching {} for external changes", path.display());

        Ok(Self {
            _debouncer: debouncer,
            events,
        })
    }

    /// Drain pending notifications. Returns `true` if the file changed.
    pub fn poll(&self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(()) => changed = true,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Material watcher channel disconnected");
                    break;
                }
            }
        }
        changed
    }
}

impl std::fmt::Debug for MaterialWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialWatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::path::PathBuf;

    #[test]
    fn test_touches_only_the_material_file() {
        let name = Some(OsStr::new("material.json"));
        let modify = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/materials/material.json"));
        let create_other = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/tmp/materials/other.json"));
        let access = notify::Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/tmp/materials/material.json"));

        assert!(touches(&modify, name));
        assert!(!touches(&create_other, name));
        assert!(!touches(&access, name));
    }
}
