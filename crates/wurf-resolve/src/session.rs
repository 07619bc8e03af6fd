//! State of one resolution pass.

use crate::error::ResolveError;
use crate::fingerprint::Fingerprint;
use crate::graph::{self, BuildGraph, Pass, ResolvedDependency};
use crate::manifest::DependencyRequest;
use crate::record::{IndexEntry, RecordStore, ResolutionIndex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a registered dependency stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyState {
    /// Resolution has started but not finished.
    Resolving,
    /// Resolved to a path.
    Resolved(PathBuf),
    /// Optional and unavailable, or no record in a passive pass.
    Unavailable,
    /// Resolution failed.
    Failed,
}

impl DependencyState {
    /// The resolved path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Resolved(path) => Some(path),
            _ => None,
        }
    }
}

/// Outcome of [`ResolverRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First declaration of the dependency.
    New,
    /// Identical redeclaration; carries the current state.
    Existing(DependencyState),
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    resolver: String,
    fingerprint: Fingerprint,
    recurse: bool,
    state: DependencyState,
}

/// Declared dependencies by name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResolverRegistry {
    entries: HashMap<String, RegistryEntry>,
    order: Vec<String>,
    bootstrap: Option<String>,
}

impl ResolverRegistry {
    /// Create a registry requiring `bootstrap` to be declared first.
    #[must_use]
    pub fn new(bootstrap: Option<String>) -> Self {
        Self {
            bootstrap,
            ..Self::default()
        }
    }

    /// Register a declaration of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BootstrapOrderViolation`] if the first
    /// declaration is not the bootstrap dependency, or a conflict error if
    /// the name was declared before with another resolver or other
    /// parameters.
    pub fn register(
        &mut self,
        request: &DependencyRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Registration, ResolveError> {
        let resolver = resolver_key(request);

        if let Some(entry) = self.entries.get(&request.name) {
            if entry.resolver != resolver {
                return Err(ResolveError::RegistryConflict {
                    name: request.name.clone(),
                    existing: entry.resolver.clone(),
                    requested: resolver,
                });
            }
            if entry.fingerprint != *fingerprint {
                return Err(ResolveError::FingerprintConflict {
                    name: request.name.clone(),
                    existing: entry.fingerprint.clone(),
                    requested: fingerprint.clone(),
                });
            }
            return Ok(Registration::Existing(entry.state.clone()));
        }

        if self.order.is_empty() {
            if let Some(ref bootstrap) = self.bootstrap {
                if *bootstrap != request.name {
                    return Err(ResolveError::BootstrapOrderViolation {
                        expected: bootstrap.clone(),
                        found: request.name.clone(),
                    });
                }
            }
        }

        debug!(name = %request.name, resolver, "registered");
        self.entries.insert(
            request.name.clone(),
            RegistryEntry {
                resolver,
                fingerprint: fingerprint.clone(),
                recurse: request.recurse,
                state: DependencyState::Resolving,
            },
        );
        self.order.push(request.name.clone());
        Ok(Registration::New)
    }

    /// Update the state of a registered dependency.
    pub fn set_state(&mut self, name: &str, state: DependencyState) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.state = state;
        }
    }

    /// Current state of `name`.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<&DependencyState> {
        self.entries.get(name).map(|entry| &entry.state)
    }

    /// Registered names in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Registered dependencies in declaration order.
    #[must_use]
    pub fn resolved(&self) -> Vec<ResolvedDependency> {
        self.order
            .iter()
            .filter_map(|name| {
                self.entries.get(name).map(|entry| ResolvedDependency {
                    name: name.clone(),
                    path: entry.state.path().map(Path::to_path_buf),
                    recurse: entry.recurse,
                })
            })
            .collect()
    }
}

/// Key identifying the resolver of a request, e.g. `git/checkout`.
fn resolver_key(request: &DependencyRequest) -> String {
    match request.effective_method() {
        Some(method) => format!("{}/{method}", request.resolver),
        None => request.resolver.to_string(),
    }
}

/// Registry and record store of one pass.
#[derive(Debug, Clone)]
pub struct ResolutionSession {
    registry: ResolverRegistry,
    store: RecordStore,
}

impl ResolutionSession {
    #[must_use]
    pub fn new(store: RecordStore, bootstrap: Option<String>) -> Self {
        Self {
            registry: ResolverRegistry::new(bootstrap),
            store,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResolverRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Resolved path of `name`.
    #[must_use]
    pub fn dependency_path(&self, name: &str) -> Option<&Path> {
        self.registry.state(name).and_then(DependencyState::path)
    }

    /// True if `name` resolved to a path.
    #[must_use]
    pub fn has_dependency_path(&self, name: &str) -> bool {
        self.dependency_path(name).is_some()
    }

    /// Registered dependencies in declaration order.
    #[must_use]
    pub fn resolved(&self) -> Vec<ResolvedDependency> {
        self.registry.resolved()
    }

    /// Recurse into every resolved dependency in the order of `pass`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of `graph`.
    pub fn recurse_dependencies(
        &self,
        graph: &mut dyn BuildGraph,
        pass: Pass,
    ) -> Result<(), ResolveError> {
        graph::recurse_dependencies(&self.resolved(), graph, pass)
    }

    /// Store the declaration order for later passive passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub fn finish(&self) -> Result<(), ResolveError> {
        let index = ResolutionIndex::new(
            self.resolved()
                .into_iter()
                .map(|dep| IndexEntry {
                    name: dep.name,
                    recurse: dep.recurse,
                })
                .collect(),
        );
        self.store.save_index(&index)?;
        debug!(
            path = %self.store.index_path().display(),
            count = index.dependencies.len(),
            "wrote resolution index"
        );
        Ok(())
    }
}
