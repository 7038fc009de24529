// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material store backed by a JSON file.

use shadegraph_editor_graph::{GraphRecord, MaterialStore, PersistenceError};
use std::path::{Path, PathBuf};

/// Stores the material record as pretty JSON at a path.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write never leaves a truncated material behind.
#[derive(Debug, Clone)]
pub struct FileMaterialStore {
    path: PathBuf,
}

impl FileMaterialStore {
    /// Create a store for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Material file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MaterialStore for FileMaterialStore {
    fn load(&mut self) -> Result<Option<GraphRecord>, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let record = GraphRecord::from_json(&content)?;
        tracing::info!("Loaded material from {}", self.path.display());
        Ok(Some(record))
    }

    fn write(&mut self, record: &GraphRecord) -> Result<(), PersistenceError> {
        if self.path.file_name().is_none() {
            return Err(PersistenceError::NoTarget);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = record.to_json()?;
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
