//! The dependency manager.
//!
//! Every declaration goes through [`DependencyManager::add_dependency`]:
//!
//! 1. the request is validated and fingerprinted,
//! 2. it is registered with the session; a redeclaration returns the
//!    memoized result,
//! 3. in an active pass it is resolved (fast cache first, if enabled) and
//!    the outcome is recorded; in a passive pass the record is read back,
//! 4. if it resolved to a path and recursion is enabled, the build graph
//!    processes the path and its declarations are added in turn.

use crate::cache::{FastResolve, FastResolveCache};
use crate::config::{expand_path, ResolveConfig};
use crate::download::Download;
use crate::error::ResolveError;
use crate::fingerprint::Fingerprint;
use crate::graph::BuildGraph;
use crate::manifest::DependencyRequest;
use crate::record::{RecordStore, ResolutionRecord};
use crate::resolver::SourceResolver;
use crate::session::{DependencyState, Registration, ResolutionSession};
use crate::vcs::VersionControl;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Whether sources are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Resolve from sources and record the results.
    Active,
    /// Only read the records of an earlier active pass.
    Passive,
}

/// Resolves dependency declarations for one pass.
pub struct DependencyManager<'a> {
    mode: ResolveMode,
    bundle_path: PathBuf,
    resolver: SourceResolver<'a>,
    cache: FastResolveCache,
    session: ResolutionSession,
}

impl<'a> DependencyManager<'a> {
    /// Create a manager for `config`.
    #[must_use]
    pub fn new(
        config: &ResolveConfig,
        mode: ResolveMode,
        vcs: &'a dyn VersionControl,
        downloader: &'a dyn Download,
    ) -> Self {
        let store = RecordStore::new(&config.bundle_config_path);
        Self {
            mode,
            bundle_path: config.bundle_path.clone(),
            resolver: SourceResolver::from_config(config, vcs, downloader),
            cache: FastResolveCache::new(store.clone(), config.fast_resolve),
            session: ResolutionSession::new(store, config.bootstrap.clone()),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// The session holding the results so far.
    #[must_use]
    pub fn session(&self) -> &ResolutionSession {
        &self.session
    }

    /// Add every request in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`add_dependency`](Self::add_dependency).
    pub fn add_dependencies(
        &mut self,
        requests: &[DependencyRequest],
        graph: &mut dyn BuildGraph,
    ) -> Result<(), ResolveError> {
        for request in requests {
            self.add_dependency(request, graph)?;
        }
        Ok(())
    }

    /// Add one dependency declaration and return its resolved path.
    ///
    /// Returns `None` for an optional dependency that could not be resolved,
    /// for a dependency without a record in a passive pass, and for a
    /// dependency that is redeclared while it is still being resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or conflicts with an
    /// earlier declaration, if a required dependency cannot be resolved, or
    /// if recursing into the resolved path fails.
    pub fn add_dependency(
        &mut self,
        request: &DependencyRequest,
        graph: &mut dyn BuildGraph,
    ) -> Result<Option<PathBuf>, ResolveError> {
        request.validate()?;
        let fingerprint = request.fingerprint();
        let name = request.name.as_str();

        match self.session.registry_mut().register(request, &fingerprint)? {
            Registration::New => {}
            Registration::Existing(state) => {
                debug!(name, ?state, "already declared");
                return match state {
                    DependencyState::Resolved(path) => Ok(Some(path)),
                    DependencyState::Unavailable | DependencyState::Resolving => Ok(None),
                    DependencyState::Failed => Err(ResolveError::Internal {
                        name: name.to_string(),
                        message: "an earlier resolution of this dependency failed".to_string(),
                    }),
                };
            }
        }

        let path = match self.mode {
            ResolveMode::Active => self.resolve_active(request, &fingerprint)?,
            ResolveMode::Passive => self.resolve_passive(name)?,
        };

        if request.recurse {
            if let Some(ref path) = path {
                self.recurse(name, path, graph)?;
            }
        }

        Ok(path)
    }

    /// Store the declaration order of an active pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub fn finish(&self) -> Result<(), ResolveError> {
        if self.mode == ResolveMode::Active {
            self.session.finish()?;
        }
        Ok(())
    }

    fn resolve_active(
        &mut self,
        request: &DependencyRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let name = request.name.as_str();

        if let FastResolve::Hit(path) = self.cache.maybe_resolve(name, fingerprint) {
            info!(name, "fast resolved");
            self.set_path(name, path.clone());
            return Ok(path);
        }

        let path = match self.resolve_sources(request) {
            Ok(path) => Some(path),
            Err(ResolveError::NoSourceResolved { name, attempts }) if request.optional => {
                warn!(
                    name,
                    attempts = attempts.len(),
                    "optional dependency unavailable"
                );
                None
            }
            Err(error) => {
                self.session
                    .registry_mut()
                    .set_state(name, DependencyState::Failed);
                return Err(error);
            }
        };

        self.set_path(name, path.clone());
        self.session.store().save(
            name,
            &ResolutionRecord {
                fingerprint: fingerprint.clone(),
                path: path.clone(),
            },
        )?;
        Ok(path)
    }

    fn resolve_sources(&self, request: &DependencyRequest) -> Result<PathBuf, ResolveError> {
        let cwd = bundle_dir(&self.bundle_path)?;
        self.resolver.resolve(request, &cwd)
    }

    fn resolve_passive(&mut self, name: &str) -> Result<Option<PathBuf>, ResolveError> {
        let path = match self.session.store().load(name)? {
            Some(record) => record.path,
            None => {
                debug!(name, "no resolve record");
                None
            }
        };
        self.set_path(name, path.clone());
        Ok(path)
    }

    fn set_path(&mut self, name: &str, path: Option<PathBuf>) {
        let state = path.map_or(DependencyState::Unavailable, DependencyState::Resolved);
        self.session.registry_mut().set_state(name, state);
    }

    fn recurse(
        &mut self,
        name: &str,
        path: &Path,
        graph: &mut dyn BuildGraph,
    ) -> Result<(), ResolveError> {
        debug!(name, command = graph.command(), path = %path.display(), "recurse");
        let nested = graph.recurse(path).map_err(|error| ResolveError::Recurse {
            name: name.to_string(),
            command: graph.command().to_string(),
            error,
        })?;
        self.add_dependencies(&nested, graph)
    }
}

/// Create the bundle folder and return its absolute path.
///
/// Folder hashes and stored records are derived from this path, so it must
/// not depend on how the bundle path was spelled.
fn bundle_dir(path: &Path) -> Result<PathBuf, ResolveError> {
    let bundle_error = |error| ResolveError::BundlePath {
        path: path.to_path_buf(),
        error,
    };
    let absolute = if path.is_absolute() {
        expand_path(path, Path::new(""))
    } else {
        expand_path(path, &std::env::current_dir().map_err(bundle_error)?)
    };
    fs::create_dir_all(&absolute).map_err(bundle_error)?;
    Ok(absolute)
}

impl std::fmt::Debug for DependencyManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyManager")
            .field("mode", &self.mode)
            .field("bundle_path", &self.bundle_path)
            .field("cache", &self.cache)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeDownload, FakeVcs, RecordingGraph};

    const TOOLS: &str = "https://host/waf-tools.git";

    fn config(dir: &Path) -> ResolveConfig {
        ResolveConfig {
            bundle_path: dir.join("bundle"),
            bundle_config_path: dir.join("config"),
            bootstrap: None,
            ..ResolveConfig::default()
        }
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (vcs, downloader) = (FakeVcs::new(), FakeDownload::new());
        let mut manager = DependencyManager::new(&config(dir.path()), ResolveMode::Active, &vcs, &downloader);
        let mut graph = RecordingGraph::new("resolve");

        let request = DependencyRequest::git("bad/name", [TOOLS]);
        assert!(matches!(
            manager.add_dependency(&request, &mut graph),
            Err(ResolveError::Manifest(_))
        ));
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn test_bundle_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let (vcs, downloader) = (FakeVcs::new(), FakeDownload::new());
        let cfg = config(dir.path());
        let mut manager = DependencyManager::new(&cfg, ResolveMode::Active, &vcs, &downloader);
        let mut graph = RecordingGraph::new("resolve");

        let request = DependencyRequest::git("waf-tools", [TOOLS]);
        let path = manager.add_dependency(&request, &mut graph).unwrap().unwrap();
        assert!(cfg.bundle_path.is_dir());
        assert!(path.starts_with(&cfg.bundle_path));
    }

    #[test]
    fn test_failed_dependency_stays_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (vcs, downloader) = (FakeVcs::new(), FakeDownload::new());
        vcs.fail_clone(TOOLS);
        let mut manager = DependencyManager::new(&config(dir.path()), ResolveMode::Active, &vcs, &downloader);
        let mut graph = RecordingGraph::new("resolve");

        let request = DependencyRequest::git("waf-tools", [TOOLS]);
        assert!(manager.add_dependency(&request, &mut graph).is_err());
        assert_eq!(
            manager.session().registry().state("waf-tools"),
            Some(&DependencyState::Failed)
        );
        assert!(matches!(
            manager.add_dependency(&request, &mut graph),
            Err(ResolveError::Internal { .. })
        ));
        assert_eq!(vcs.clones().len(), 1);
    }

    #[test]
    fn test_passive_finish_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (vcs, downloader) = (FakeVcs::new(), FakeDownload::new());
        let cfg = config(dir.path());
        let manager = DependencyManager::new(&cfg, ResolveMode::Passive, &vcs, &downloader);
        manager.finish().unwrap();
        assert!(!manager.session().store().index_path().exists());
    }
}
