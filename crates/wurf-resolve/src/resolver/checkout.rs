//! Per-ref working copies made from a base clone.

use super::git::VersionControlResolver;
use crate::error::SourceError;
use crate::fingerprint::short_path_hash;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Materializes a branch, tag or commit in `<name>-<checkout>-<hash>`.
///
/// The base clone is shared by all refs of a repository; every ref gets its
/// own copy of it with the ref checked out.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutResolver<'a> {
    git: VersionControlResolver<'a>,
}

impl<'a> CheckoutResolver<'a> {
    /// Create a resolver on top of a base clone resolver.
    #[must_use]
    pub fn new(git: VersionControlResolver<'a>) -> Self {
        Self { git }
    }

    /// The base clone resolver.
    #[must_use]
    pub fn base(&self) -> VersionControlResolver<'a> {
        self.git
    }

    /// Resolve `source` and check out `checkout` in its own folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the base clone, the copy, the checkout or a pull
    /// of a branch fails.
    pub fn resolve(
        &self,
        name: &str,
        cwd: &Path,
        source: &str,
        checkout: &str,
    ) -> Result<PathBuf, SourceError> {
        let base_path = self.git.resolve(name, cwd, source)?;
        self.checkout_from(name, cwd, &base_path, checkout)
    }

    /// Check out `checkout` in a copy of the clone at `base_path`.
    ///
    /// A new copy is made on first use. An existing copy is pulled only if
    /// it tracks a branch; tags and commits never move.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy, the checkout or a pull fails. A copy
    /// that failed or whose checkout failed is removed again.
    pub fn checkout_from(
        &self,
        name: &str,
        cwd: &Path,
        base_path: &Path,
        checkout: &str,
    ) -> Result<PathBuf, SourceError> {
        let vcs = self.git.vcs();
        let repo_path = cwd.join(format!(
            "{name}-{checkout}-{}",
            short_path_hash(base_path)
        ));

        if repo_path.is_dir() {
            if vcs.is_detached_head(&repo_path)? {
                debug!(name, checkout, "detached head, skipping pull");
            } else {
                debug!(name, checkout, path = %repo_path.display(), "pulling branch");
                vcs.pull(&repo_path)?;
            }
        } else {
            info!(name, checkout, path = %repo_path.display(), "checking out");
            let prepared = copy_tree(base_path, &repo_path)
                .map_err(SourceError::from)
                .and_then(|()| vcs.checkout(checkout, &repo_path).map_err(SourceError::from));
            if let Err(error) = prepared {
                // An existing folder must always hold the requested ref.
                remove_partial(&repo_path);
                return Err(error);
            }
        }

        vcs.pull_submodules(&repo_path)?;
        Ok(repo_path)
    }
}

/// Remove a working folder left behind by a failed resolve.
pub(crate) fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(error) = fs::remove_dir_all(path) {
            warn!(path = %path.display(), %error, "failed to remove partial folder");
        }
    }
}

/// Copy the tree at `from` to `to`, recreating symbolic links as links.
///
/// # Errors
///
/// Returns an error if `to` exists or any entry cannot be copied.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' already exists", to.display()),
        ));
    }

    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let destination = fs::read_link(link)?;
    std::os::unix::fs::symlink(destination, target)
}

#[cfg(windows)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let destination = fs::read_link(link)?;
    let resolved = link.parent().map_or(destination.clone(), |p| p.join(&destination));
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(destination, target)
    } else {
        std::os::windows::fs::symlink_file(destination, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitProtocol;
    use crate::fingerprint::short_hash;
    use crate::testutil::FakeVcs;
    use crate::url::GitUrlResolver;

    const SOURCE: &str = "https://mirror1/alpha.git";

    fn resolver(vcs: &FakeVcs) -> CheckoutResolver<'_> {
        CheckoutResolver::new(VersionControlResolver::new(
            vcs,
            GitUrlResolver::new(GitProtocol::Https),
        ))
    }

    #[test]
    fn test_checkout_folder_name() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let path = resolver(&vcs)
            .resolve("alpha", dir.path(), SOURCE, "v1.0.0")
            .unwrap();

        let base = dir.path().join(format!("alpha-master-{}", short_hash(SOURCE)));
        let expected = dir
            .path()
            .join(format!("alpha-v1.0.0-{}", short_path_hash(&base)));
        assert_eq!(path, expected);
        assert!(path.join("README").is_file());
        assert_eq!(vcs.checkouts_at(&path), 1);
        assert_eq!(vcs.submodule_pulls_at(&path), 1);
    }

    #[test]
    fn test_tag_is_never_pulled() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let r = resolver(&vcs);
        let first = r.resolve("alpha", dir.path(), SOURCE, "v1.2.0").unwrap();
        let second = r.resolve("alpha", dir.path(), SOURCE, "v1.2.0").unwrap();

        assert_eq!(first, second);
        assert_eq!(vcs.pulls_at(&first), 0);
        assert_eq!(vcs.checkouts_at(&first), 1);
    }

    #[test]
    fn test_branch_is_pulled_on_second_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.add_branches(["master"]);
        let r = resolver(&vcs);
        let first = r.resolve("alpha", dir.path(), SOURCE, "master").unwrap();
        assert_eq!(vcs.pulls_at(&first), 0);

        r.resolve("alpha", dir.path(), SOURCE, "master").unwrap();
        assert_eq!(vcs.pulls_at(&first), 1);
        assert_eq!(vcs.submodule_pulls_at(&first), 2);
    }

    #[test]
    fn test_failed_branch_pull_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.add_branches(["master"]);
        let r = resolver(&vcs);
        r.resolve("alpha", dir.path(), SOURCE, "master").unwrap();

        vcs.fail_pulls(true);
        let err = r.resolve("alpha", dir.path(), SOURCE, "master").unwrap_err();
        assert!(matches!(err, SourceError::Vcs(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let r = resolver(&vcs);
        let base = r.base().resolve("alpha", dir.path(), SOURCE).unwrap();

        // Sockets cannot be copied.
        let socket = base.join("agent.sock");
        drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());

        let repo_path = dir
            .path()
            .join(format!("alpha-v1.0.0-{}", short_path_hash(&base)));
        assert!(r.resolve("alpha", dir.path(), SOURCE, "v1.0.0").is_err());
        assert!(!repo_path.exists());

        fs::remove_file(&socket).unwrap();
        let path = r.resolve("alpha", dir.path(), SOURCE, "v1.0.0").unwrap();
        assert_eq!(path, repo_path);
        assert_eq!(vcs.checkouts_at(&path), 1);
        assert!(path.join("README").is_file());
    }

    #[test]
    fn test_failed_checkout_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.fail_checkouts(true);
        let r = resolver(&vcs);
        assert!(r.resolve("alpha", dir.path(), SOURCE, "v1.0.0").is_err());

        vcs.fail_checkouts(false);
        let path = r.resolve("alpha", dir.path(), SOURCE, "v1.0.0").unwrap();
        assert_eq!(vcs.checkouts_at(&path), 2);
        assert_eq!(vcs.pulls_at(&path), 0);
    }

    #[test]
    fn test_refs_share_one_clone() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new();
        let r = resolver(&vcs);
        let a = r.resolve("alpha", dir.path(), SOURCE, "v1.0.0").unwrap();
        let b = r.resolve("alpha", dir.path(), SOURCE, "v2.0.0").unwrap();

        assert_ne!(a, b);
        assert_eq!(vcs.clones().len(), 1);
    }

    #[test]
    fn test_copy_tree() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        fs::create_dir_all(from.join("src/nested")).unwrap();
        fs::write(from.join("src/nested/lib.txt"), "lib").unwrap();
        fs::write(from.join("top.txt"), "top").unwrap();

        let to = dir.path().join("to");
        copy_tree(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(to.join("src/nested/lib.txt")).unwrap(), "lib");
        assert_eq!(fs::read_to_string(to.join("top.txt")).unwrap(), "top");

        assert_eq!(
            copy_tree(&from, &to).unwrap_err().kind(),
            io::ErrorKind::AlreadyExists
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        fs::create_dir_all(&from).unwrap();
        fs::write(from.join("real.txt"), "real").unwrap();
        std::os::unix::fs::symlink("real.txt", from.join("link.txt")).unwrap();

        let to = dir.path().join("to");
        copy_tree(&from, &to).unwrap();
        let link = to.join("link.txt");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("real.txt"));
    }
}
