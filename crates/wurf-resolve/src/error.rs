//! Error types shared by the resolvers and the dependency manager.
//!
//! Resolution has two error channels:
//! - [`SourceError`] describes one failed attempt. The source resolver logs
//!   it and moves on to the next declared source.
//! - [`ResolveError`] is fatal for the dependency (or the whole pass). It is
//!   raised once all fallbacks are exhausted, or immediately for
//!   configuration mistakes such as conflicting declarations.

use crate::download::DownloadError;
use crate::fingerprint::Fingerprint;
use crate::graph::GraphError;
use crate::manifest::ManifestError;
use crate::record::RecordError;
use crate::vcs::VcsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single resolution attempt.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A version control command failed.
    #[error("{0}")]
    Vcs(#[from] VcsError),

    /// A download failed.
    #[error("{0}")]
    Download(#[from] DownloadError),

    /// IO error while preparing a working folder.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A downloaded file does not have the declared checksum.
    #[error("checksum verification failed for '{}': expected {expected}, got {actual}", .file.display())]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    /// The request lacks a parameter this resolver needs.
    #[error("dependency '{name}' cannot be resolved: {reason}")]
    InvalidRequest { name: String, reason: String },

    /// No tag of the repository matches the requested major version.
    #[error("no tag with major version {major} in '{}'", .repository.display())]
    NoMatchingTag { major: u64, repository: PathBuf },

    /// An invariant of the resolver itself was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SourceError {
    /// True if the next source may still succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

/// One failed source, kept for the final error report.
#[derive(Debug)]
pub struct SourceFailure {
    /// The source that was tried.
    pub locator: String,
    /// Why it failed.
    pub error: SourceError,
}

/// Errors that end the resolution of a dependency.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Every declared source failed.
    #[error("no sources resolved for dependency '{name}':\n  {}", format_failures(.attempts))]
    NoSourceResolved {
        name: String,
        attempts: Vec<SourceFailure>,
    },

    /// A user override failed.
    #[error("user override for dependency '{name}' failed: {error}")]
    UserOverride {
        name: String,
        #[source]
        error: SourceError,
    },

    /// The same dependency was declared twice with different parameters.
    #[error("dependency '{name}' declared with conflicting parameters (fingerprint {existing} <=> {requested})")]
    FingerprintConflict {
        name: String,
        existing: Fingerprint,
        requested: Fingerprint,
    },

    /// The same dependency was declared twice with different resolvers.
    #[error("incompatible dependency resolvers for '{name}': {existing} <=> {requested}")]
    RegistryConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// The first dependency is not the bootstrap dependency.
    #[error("{expected} should be added before other dependencies (got '{found}')")]
    BootstrapOrderViolation { expected: String, found: String },

    /// The dependency declaration is invalid.
    #[error("{0}")]
    Manifest(#[from] ManifestError),

    /// Resolution records could not be read or written.
    #[error("{0}")]
    Record(#[from] RecordError),

    /// Recursing into a resolved dependency failed.
    #[error("recurse \"{name}\" for \"{command}\" failed with: {error}")]
    Recurse {
        name: String,
        command: String,
        #[source]
        error: GraphError,
    },

    /// The bundle folder could not be prepared.
    #[error("failed to prepare '{}': {error}", .path.display())]
    BundlePath {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// An invariant of the engine was violated.
    #[error("internal error while resolving '{name}': {message}")]
    Internal { name: String, message: String },
}

fn format_failures(attempts: &[SourceFailure]) -> String {
    if attempts.is_empty() {
        return "(no sources tried)".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.locator, a.error))
        .collect::<Vec<_>>()
        .join("\n  ")
}
