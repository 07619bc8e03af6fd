//! Operator overrides that take precedence over declared sources.

use super::checkout::CheckoutResolver;
use crate::error::SourceError;
use crate::manifest::DependencyRequest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Override consulted before any source of a dependency is tried.
pub trait UserResolver {
    /// Resolve `request`, or return `None` if this override does not apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the override applies but cannot be honored.
    fn resolve(&self, request: &DependencyRequest) -> Result<Option<PathBuf>, SourceError>;
}

/// Override consulted per source, before the declared method.
pub trait UserMethodResolver {
    /// Resolve `source` of `request` below `cwd`, or return `None` if this
    /// override does not apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the override applies but cannot be honored.
    fn resolve(
        &self,
        request: &DependencyRequest,
        cwd: &Path,
        source: &str,
    ) -> Result<Option<PathBuf>, SourceError>;
}

/// `--path NAME=DIR`: use a local folder instead of any source.
#[derive(Debug, Clone, Default)]
pub struct UserPathResolver {
    paths: BTreeMap<String, PathBuf>,
}

impl UserPathResolver {
    #[must_use]
    pub fn new(paths: BTreeMap<String, PathBuf>) -> Self {
        Self { paths }
    }
}

impl UserResolver for UserPathResolver {
    fn resolve(&self, request: &DependencyRequest) -> Result<Option<PathBuf>, SourceError> {
        let Some(path) = self.paths.get(&request.name) else {
            return Ok(None);
        };

        if !path.is_dir() {
            return Err(SourceError::InvalidRequest {
                name: request.name.clone(),
                reason: format!("user path '{}' is not a directory", path.display()),
            });
        }

        info!(name = %request.name, path = %path.display(), "using user path");
        Ok(Some(path.clone()))
    }
}

/// `--use-checkout NAME=REF`: check out REF instead of the declared method.
#[derive(Debug, Clone)]
pub struct UserCheckoutResolver<'a> {
    checkouts: BTreeMap<String, String>,
    resolver: CheckoutResolver<'a>,
}

impl<'a> UserCheckoutResolver<'a> {
    #[must_use]
    pub fn new(checkouts: BTreeMap<String, String>, resolver: CheckoutResolver<'a>) -> Self {
        Self {
            checkouts,
            resolver,
        }
    }
}

impl UserMethodResolver for UserCheckoutResolver<'_> {
    fn resolve(
        &self,
        request: &DependencyRequest,
        cwd: &Path,
        source: &str,
    ) -> Result<Option<PathBuf>, SourceError> {
        let Some(checkout) = self.checkouts.get(&request.name) else {
            return Ok(None);
        };

        info!(name = %request.name, checkout, "using user checkout");
        self.resolver
            .resolve(&request.name, cwd, source, checkout)
            .map(Some)
    }
}
