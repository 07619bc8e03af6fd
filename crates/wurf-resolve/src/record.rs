//! Persisted resolution records.
//!
//! Every dependency resolved in an active pass leaves a small JSON file
//! `<bundle_config_path>/<name>.resolve.json`:
//!
//! ```json
//! {"sha1": "<fingerprint>", "path": "/abs/bundle_dependencies/alpha-v1.0.0-3f2a1c"}
//! ```
//!
//! `path` is `null` when an optional dependency was unavailable. At the end
//! of the pass the declaration order is written to `resolve.json`.

use crate::fingerprint::Fingerprint;
use crate::graph::ResolvedDependency;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix of per-dependency record files.
pub const RECORD_SUFFIX: &str = ".resolve.json";

/// File holding the ordered list of resolved dependencies.
pub const INDEX_FILE: &str = "resolve.json";

/// Errors reading or writing records.
#[derive(Error, Debug)]
pub enum RecordError {
    /// IO error.
    #[error("IO error on '{}': {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    /// The file does not contain a valid record.
    #[error("invalid resolve record '{}': {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Outcome of resolving one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    /// Fingerprint of the request that produced this record.
    #[serde(rename = "sha1")]
    pub fingerprint: Fingerprint,
    /// Resolved path, `None` for an unavailable optional dependency.
    pub path: Option<PathBuf>,
}

/// One entry of the resolution index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Dependency name.
    pub name: String,
    /// Whether the host recurses into the dependency.
    pub recurse: bool,
}

/// Declaration order of the last active pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionIndex {
    /// Version of the index format.
    pub version: u32,
    /// When the active pass finished (RFC 3339).
    pub resolved_at: String,
    /// Dependencies in declaration order.
    pub dependencies: Vec<IndexEntry>,
}

impl ResolutionIndex {
    /// Current index format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create an index stamped with the current time.
    #[must_use]
    pub fn new(dependencies: Vec<IndexEntry>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            resolved_at: chrono::Utc::now().to_rfc3339(),
            dependencies,
        }
    }
}

/// Reads and writes records below one folder.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The folder holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `name`.
    #[must_use]
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{RECORD_SUFFIX}"))
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Load the record for `name`, if one was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<Option<ResolutionRecord>, RecordError> {
        read_json(&self.record_path(name))
    }

    /// Store the record for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, name: &str, record: &ResolutionRecord) -> Result<(), RecordError> {
        write_json(&self.record_path(name), record)
    }

    /// Load the index of the last active pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_index(&self) -> Result<Option<ResolutionIndex>, RecordError> {
        read_json(&self.index_path())
    }

    /// Store the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_index(&self, index: &ResolutionIndex) -> Result<(), RecordError> {
        write_json(&self.index_path(), index)
    }

    /// Rebuild the resolved dependencies of the last active pass.
    ///
    /// Returns an empty list if no active pass has completed. Dependencies
    /// listed in the index but lacking a record are reported without a path.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub fn restore(&self) -> Result<Vec<ResolvedDependency>, RecordError> {
        let Some(index) = self.load_index()? else {
            return Ok(Vec::new());
        };

        index
            .dependencies
            .into_iter()
            .map(|entry| {
                let path = self.load(&entry.name)?.and_then(|record| record.path);
                Ok(ResolvedDependency {
                    name: entry.name,
                    path,
                    recurse: entry.recurse,
                })
            })
            .collect()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, RecordError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(RecordError::Io {
                path: path.to_path_buf(),
                error,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| RecordError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RecordError> {
    let io_error = |error| RecordError::Io {
        path: path.to_path_buf(),
        error,
    };
    let content = serde_json::to_string(value).map_err(|e| RecordError::Invalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, content).map_err(io_error)
}
