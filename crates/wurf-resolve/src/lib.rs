//! Source dependency resolution for the wurf build helper.
//!
//! This crate provides:
//! - Parsing and validation of `wurf.toml` dependency manifests
//! - Fingerprinting of dependency declarations
//! - Git clone, checkout and semver resolution with mirror fallback
//! - HTTP downloads with checksum verification and tarball extraction
//! - Persisted resolution records and a fast-resolve cache
//! - Active and passive resolution passes over a host build graph

mod cache;
mod config;
mod download;
mod error;
mod fingerprint;
mod graph;
mod manager;
mod manifest;
mod record;
pub mod resolver;
mod session;
mod url;
mod vcs;

pub mod testutil;

pub use cache::{FastResolve, FastResolveCache};
pub use config::{
    expand_path, ConfigError, GitProtocol, ResolveConfig, DEFAULT_BOOTSTRAP,
    DEFAULT_BUNDLE_CONFIG_PATH, DEFAULT_BUNDLE_PATH,
};
pub use download::{
    extract_tarball, extraction_dir, file_checksum, file_name_from_url, is_tarball, Download,
    DownloadConfig, DownloadError, HttpDownload,
};
pub use error::{ResolveError, SourceError, SourceFailure};
pub use fingerprint::{
    fingerprint, sha256_hex, short_hash, short_path_hash, Fingerprint, SHORT_HASH_LEN,
};
pub use graph::{recurse_dependencies, BuildGraph, GraphError, Pass, ResolvedDependency};
pub use manager::{DependencyManager, ResolveMode};
pub use manifest::{
    DependencyRequest, Manifest, ManifestError, Method, ResolveTable, ResolverType, MANIFEST_FILE,
};
pub use record::{
    IndexEntry, RecordError, RecordStore, ResolutionIndex, ResolutionRecord, INDEX_FILE,
    RECORD_SUFFIX,
};
pub use session::{DependencyState, Registration, ResolutionSession, ResolverRegistry};
pub use url::GitUrlResolver;
pub use vcs::{Git, VcsError, VersionControl};
