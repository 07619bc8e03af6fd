//! Build graph backed by the manifests of resolved dependencies.

use std::path::{Path, PathBuf};
use wurf_resolve::{BuildGraph, DependencyRequest, GraphError, Manifest};

/// Reads `wurf.toml` in every dependency folder it recurses into.
///
/// Folders without a manifest declare no dependencies.
#[derive(Debug)]
pub struct ManifestGraph {
    command: String,
    visited: Vec<PathBuf>,
}

impl ManifestGraph {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            visited: Vec::new(),
        }
    }

    /// Paths recursed into, in order.
    pub fn visited(&self) -> &[PathBuf] {
        &self.visited
    }
}

impl BuildGraph for ManifestGraph {
    fn command(&self) -> &str {
        &self.command
    }

    fn recurse(&mut self, path: &Path) -> Result<Vec<DependencyRequest>, GraphError> {
        self.visited.push(path.to_path_buf());
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let manifest = Manifest::from_dir(path)?;
        Ok(manifest.map(|m| m.dependencies).unwrap_or_default())
    }
}
