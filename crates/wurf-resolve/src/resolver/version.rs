//! Floating checkouts of the newest tag of a major version.

use super::checkout::CheckoutResolver;
use crate::error::SourceError;
use semver::Version;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checks out the highest release tag with a given major version.
#[derive(Debug, Clone, Copy)]
pub struct SemverResolver<'a> {
    checkout: CheckoutResolver<'a>,
}

impl<'a> SemverResolver<'a> {
    #[must_use]
    pub fn new(checkout: CheckoutResolver<'a>) -> Self {
        Self { checkout }
    }

    /// Resolve `source` at the newest tag with major version `major`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoMatchingTag`] if no tag matches, or the error
    /// of the underlying clone or checkout.
    pub fn resolve(
        &self,
        name: &str,
        cwd: &Path,
        source: &str,
        major: u64,
    ) -> Result<PathBuf, SourceError> {
        let base = self.checkout.base();
        let base_path = base.resolve(name, cwd, source)?;
        let tags = base.vcs().tags(&base_path)?;

        let tag = select_tag(&tags, major).ok_or_else(|| SourceError::NoMatchingTag {
            major,
            repository: base_path.clone(),
        })?;
        debug!(name, major, tag, "selected tag");

        self.checkout.checkout_from(name, cwd, &base_path, tag)
    }
}

/// The highest release tag with major version `major`.
///
/// Tags may carry a `v` prefix. Pre-releases and tags that are not semantic
/// versions are ignored.
#[must_use]
pub fn select_tag(tags: &[String], major: u64) -> Option<&str> {
    tags.iter()
        .filter_map(|tag| {
            let version = Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok()?;
            (version.major == major && version.pre.is_empty()).then_some((version, tag))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.as_str())
}
