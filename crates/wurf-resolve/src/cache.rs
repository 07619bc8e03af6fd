//! Cross-invocation short circuit for unchanged dependencies.

use crate::fingerprint::Fingerprint;
use crate::record::RecordStore;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Result of a fast-resolve lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastResolve {
    /// A stored record matches; its path (possibly none) is used as is.
    Hit(Option<PathBuf>),
    /// No usable record.
    Miss,
}

/// Trusts stored records whose fingerprint matches the current request.
///
/// The stored path is not re-validated. Lookups only hit when fast resolve is
/// enabled.
#[derive(Debug, Clone)]
pub struct FastResolveCache {
    store: RecordStore,
    enabled: bool,
}

impl FastResolveCache {
    /// Create a cache reading from `store`.
    #[must_use]
    pub fn new(store: RecordStore, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Whether lookups can hit.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up the stored resolution of `name`.
    ///
    /// Unreadable records are treated as a miss.
    #[must_use]
    pub fn maybe_resolve(&self, name: &str, fingerprint: &Fingerprint) -> FastResolve {
        if !self.enabled {
            return FastResolve::Miss;
        }

        match self.store.load(name) {
            Ok(Some(record)) if record.fingerprint == *fingerprint => {
                debug!(name, %fingerprint, "fast resolve hit");
                FastResolve::Hit(record.path)
            }
            Ok(Some(record)) => {
                debug!(
                    name,
                    stored = %record.fingerprint,
                    current = %fingerprint,
                    "fast resolve miss: fingerprint changed"
                );
                FastResolve::Miss
            }
            Ok(None) => FastResolve::Miss,
            Err(error) => {
                warn!(name, %error, "ignoring unreadable resolve record");
                FastResolve::Miss
            }
        }
    }
}
