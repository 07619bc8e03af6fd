//! Base clones of git repositories.

use super::checkout::remove_partial;
use crate::error::SourceError;
use crate::fingerprint::short_hash;
use crate::url::GitUrlResolver;
use crate::vcs::VersionControl;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Clones a repository into `<name>-master-<hash>` or pulls an existing clone.
#[derive(Clone, Copy)]
pub struct VersionControlResolver<'a> {
    vcs: &'a dyn VersionControl,
    urls: GitUrlResolver,
}

impl<'a> VersionControlResolver<'a> {
    /// Create a resolver using `vcs` for all repository operations.
    #[must_use]
    pub fn new(vcs: &'a dyn VersionControl, urls: GitUrlResolver) -> Self {
        Self { vcs, urls }
    }

    /// The version control system used by this resolver.
    #[must_use]
    pub fn vcs(&self) -> &'a dyn VersionControl {
        self.vcs
    }

    /// Name of the base clone folder of `source`.
    #[must_use]
    pub fn folder_name(&self, name: &str, source: &str) -> String {
        let url = self.urls.determine_url(source);
        format!("{name}-master-{}", short_hash(&url))
    }

    /// Make `source` available below `cwd` and return the clone path.
    ///
    /// A failing pull of an existing clone is logged and the clone is used
    /// as is. A failing first clone is returned as an error and whatever it
    /// left in the clone folder is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the clone or the submodule update fails, or
    /// [`SourceError::Internal`] if the clone folder is missing afterwards.
    pub fn resolve(&self, name: &str, cwd: &Path, source: &str) -> Result<PathBuf, SourceError> {
        let url = self.urls.determine_url(source);
        let folder = self.folder_name(name, source);
        let repo_path = cwd.join(&folder);

        if repo_path.is_dir() {
            debug!(name, path = %repo_path.display(), "pulling existing clone");
            if let Err(error) = self.vcs.pull(&repo_path) {
                if !error.is_command_failure() {
                    return Err(error.into());
                }
                warn!(
                    name,
                    path = %repo_path.display(),
                    %error,
                    "pull failed, using existing clone"
                );
            }
        } else {
            info!(name, url = %url, path = %repo_path.display(), "cloning");
            if let Err(error) = self.vcs.clone_repository(&url, &folder, cwd) {
                // An existing clone folder always holds a complete clone.
                remove_partial(&repo_path);
                return Err(error.into());
            }
        }

        if !repo_path.is_dir() {
            return Err(SourceError::Internal(format!(
                "clone of '{url}' did not create '{}'",
                repo_path.display()
            )));
        }

        self.vcs.pull_submodules(&repo_path)?;
        Ok(repo_path)
    }
}

impl std::fmt::Debug for VersionControlResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionControlResolver")
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}
