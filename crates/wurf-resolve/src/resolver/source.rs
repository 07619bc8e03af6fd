//! Ordered fallback across the declared sources of a dependency.

use super::checkout::CheckoutResolver;
use super::git::VersionControlResolver;
use super::http::HttpResolver;
use super::method::MethodResolver;
use super::user::{UserCheckoutResolver, UserPathResolver, UserResolver};
use crate::config::ResolveConfig;
use crate::download::Download;
use crate::error::{ResolveError, SourceFailure};
use crate::manifest::{DependencyRequest, ResolverType};
use crate::url::GitUrlResolver;
use crate::vcs::VersionControl;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolves a dependency from the first of its sources that works.
pub struct SourceResolver<'a> {
    user: Vec<Box<dyn UserResolver + 'a>>,
    git: MethodResolver<'a>,
    http: HttpResolver<'a>,
}

impl<'a> SourceResolver<'a> {
    /// Create a resolver without user overrides.
    #[must_use]
    pub fn new(git: MethodResolver<'a>, http: HttpResolver<'a>) -> Self {
        Self {
            user: Vec::new(),
            git,
            http,
        }
    }

    /// Build the full resolver chain for `config`.
    ///
    /// User paths are consulted before any source, user checkouts before the
    /// declared method of each git source.
    #[must_use]
    pub fn from_config(
        config: &ResolveConfig,
        vcs: &'a dyn VersionControl,
        downloader: &'a dyn Download,
    ) -> Self {
        let urls = GitUrlResolver::new(config.git_protocol);
        let checkout = CheckoutResolver::new(VersionControlResolver::new(vcs, urls));

        let mut git = MethodResolver::new(checkout);
        if !config.user_checkouts.is_empty() {
            git = git.with_user_method(Box::new(UserCheckoutResolver::new(
                config.user_checkouts.clone(),
                checkout,
            )));
        }

        let mut resolver = Self::new(git, HttpResolver::new(downloader));
        if !config.user_paths.is_empty() {
            resolver = resolver.with_user(Box::new(UserPathResolver::new(config.user_paths.clone())));
        }
        resolver
    }

    /// Add an override consulted before any source.
    #[must_use]
    pub fn with_user(mut self, resolver: Box<dyn UserResolver + 'a>) -> Self {
        self.user.push(resolver);
        self
    }

    /// Resolve `request` below `cwd`.
    ///
    /// Sources are tried in declaration order. A failing source is logged
    /// and the next one is tried; the first success wins.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UserOverride`] if an applicable override
    /// fails, [`ResolveError::NoSourceResolved`] if every source fails, or
    /// [`ResolveError::Internal`] on an unrecoverable resolver failure.
    pub fn resolve(&self, request: &DependencyRequest, cwd: &Path) -> Result<PathBuf, ResolveError> {
        let name = &request.name;

        for user in &self.user {
            match user.resolve(request) {
                Ok(Some(path)) => return Ok(path),
                Ok(None) => {}
                Err(error) => {
                    return Err(ResolveError::UserOverride {
                        name: name.clone(),
                        error,
                    })
                }
            }
        }

        let mut attempts = Vec::new();
        for source in &request.sources {
            let result = match request.resolver {
                ResolverType::Git => self.git.resolve(request, cwd, source),
                ResolverType::Http => self.http.resolve(request, cwd, source),
            };

            match result {
                Ok(path) => {
                    info!(name, source = %source, path = %path.display(), "resolved");
                    return Ok(path);
                }
                Err(error) if error.is_recoverable() => {
                    warn!(name, source = %source, %error, "source failed, trying next");
                    attempts.push(SourceFailure {
                        locator: source.clone(),
                        error,
                    });
                }
                Err(error) => {
                    return Err(ResolveError::Internal {
                        name: name.clone(),
                        message: error.to_string(),
                    })
                }
            }
        }

        Err(ResolveError::NoSourceResolved {
            name: name.clone(),
            attempts,
        })
    }
}

impl std::fmt::Debug for SourceResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("user", &self.user.len())
            .field("git", &self.git)
            .field("http", &self.http)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeDownload, FakeVcs};
    use std::collections::BTreeMap;

    const S1: &str = "https://mirror1/alpha.git";
    const S2: &str = "https://mirror2/alpha.git";
    const S3: &str = "https://mirror3/alpha.git";

    #[test]
    fn test_sources_tried_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.fail_clone(S1);
        vcs.fail_clone(S2);
        let downloader = FakeDownload::new();
        let resolver = SourceResolver::from_config(&ResolveConfig::default(), &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1, S2, S3]);
        let path = resolver.resolve(&request, dir.path()).unwrap();

        assert_eq!(vcs.clones(), [S1, S2, S3]);
        assert_eq!(std::fs::read_to_string(path.join("README")).unwrap(), S3);
    }

    #[test]
    fn test_first_success_wins() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let downloader = FakeDownload::new();
        let resolver = SourceResolver::from_config(&ResolveConfig::default(), &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1, S2]);
        resolver.resolve(&request, dir.path()).unwrap();
        assert_eq!(vcs.clones(), [S1]);
    }

    #[test]
    fn test_all_sources_fail() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.fail_clone(S1);
        vcs.fail_clone(S2);
        let downloader = FakeDownload::new();
        let resolver = SourceResolver::from_config(&ResolveConfig::default(), &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1, S2]);
        match resolver.resolve(&request, dir.path()).unwrap_err() {
            ResolveError::NoSourceResolved { name, attempts } => {
                assert_eq!(name, "alpha");
                let locators: Vec<_> = attempts.iter().map(|a| a.locator.as_str()).collect();
                assert_eq!(locators, [S1, S2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_internal_error_stops_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.skip_clone_folder();
        let downloader = FakeDownload::new();
        let resolver = SourceResolver::from_config(&ResolveConfig::default(), &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1, S2]);
        let err = resolver.resolve(&request, dir.path()).unwrap_err();
        assert!(matches!(err, ResolveError::Internal { .. }));
        assert_eq!(vcs.clones(), [S1]);
    }

    #[test]
    fn test_user_path_skips_sources() {
        let dir = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let downloader = FakeDownload::new();
        let config = ResolveConfig {
            user_paths: BTreeMap::from([("alpha".to_string(), local.path().to_path_buf())]),
            ..ResolveConfig::default()
        };
        let resolver = SourceResolver::from_config(&config, &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1]);
        assert_eq!(resolver.resolve(&request, dir.path()).unwrap(), local.path());
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn test_failing_user_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let downloader = FakeDownload::new();
        let config = ResolveConfig {
            user_paths: BTreeMap::from([("alpha".to_string(), dir.path().join("missing"))]),
            ..ResolveConfig::default()
        };
        let resolver = SourceResolver::from_config(&config, &vcs, &downloader);

        let request = DependencyRequest::git("alpha", [S1]);
        assert!(matches!(
            resolver.resolve(&request, dir.path()),
            Err(ResolveError::UserOverride { .. })
        ));
    }

    #[test]
    fn test_http_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let downloader = FakeDownload::new();
        downloader.serve("https://b/file.zip", "zip");
        let resolver = SourceResolver::from_config(&ResolveConfig::default(), &vcs, &downloader);

        let request = DependencyRequest::http("file", ["https://a/file.zip", "https://b/file.zip"]);
        let path = resolver.resolve(&request, dir.path()).unwrap();
        assert!(path.ends_with("file.zip"));
        assert_eq!(downloader.downloads(), ["https://a/file.zip", "https://b/file.zip"]);
        assert!(vcs.calls().is_empty());
    }
}
