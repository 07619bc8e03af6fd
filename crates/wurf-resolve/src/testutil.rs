//! Test utilities for wurf-resolve
//!
//! In-memory stand-ins for the collaborators of the resolver: a version
//! control system that creates folders instead of cloning, a downloader that
//! serves fixed content, and a build graph that records what it visited.

use crate::download::{file_name_from_url, Download, DownloadError};
use crate::graph::{BuildGraph, GraphError};
use crate::manifest::DependencyRequest;
use crate::vcs::{VcsError, VersionControl};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// File written by [`FakeVcs`] to remember the checked out ref.
pub const FAKE_HEAD_FILE: &str = ".fake-head";

/// A call made to [`FakeVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Clone { repository: String, path: PathBuf },
    Pull(PathBuf),
    Checkout { branch: String, path: PathBuf },
    IsDetachedHead(PathBuf),
    PullSubmodules(PathBuf),
    Tags(PathBuf),
}

/// [`VersionControl`] that only touches the local filesystem.
///
/// Cloning creates the target folder with a `README`. Checking out writes the
/// ref to [`FAKE_HEAD_FILE`]; a working copy is detached unless that ref was
/// registered as a branch.
#[derive(Debug, Default)]
pub struct FakeVcs {
    calls: RefCell<Vec<VcsCall>>,
    failing_clones: RefCell<HashSet<String>>,
    failing_pulls: Cell<bool>,
    failing_checkouts: Cell<bool>,
    partial_clones: Cell<bool>,
    clone_creates_folder: Cell<bool>,
    branches: RefCell<HashSet<String>>,
    tags: RefCell<Vec<String>>,
}

impl FakeVcs {
    /// A fake where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        let vcs = Self::default();
        vcs.clone_creates_folder.set(true);
        vcs
    }

    /// Make clones of `repository` fail.
    pub fn fail_clone(&self, repository: &str) {
        self.failing_clones.borrow_mut().insert(repository.to_string());
    }

    /// Make every pull fail, as if the remote were unreachable.
    pub fn fail_pulls(&self, fail: bool) {
        self.failing_pulls.set(fail);
    }

    /// Make every checkout fail, as if the ref did not exist.
    pub fn fail_checkouts(&self, fail: bool) {
        self.failing_checkouts.set(fail);
    }

    /// Make failing clones leave a half-written folder behind.
    pub fn leave_partial_clones(&self) {
        self.partial_clones.set(true);
    }

    /// Make clones report success without creating the folder.
    pub fn skip_clone_folder(&self) {
        self.clone_creates_folder.set(false);
    }

    /// Register refs that are branches.
    pub fn add_branches<I, S>(&self, branches: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches
            .borrow_mut()
            .extend(branches.into_iter().map(Into::into));
    }

    /// Set the tags reported for every repository.
    pub fn set_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.tags.borrow_mut() = tags.into_iter().map(Into::into).collect();
    }

    /// All calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.borrow().clone()
    }

    /// Repositories passed to clone, in call order.
    #[must_use]
    pub fn clones(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                VcsCall::Clone { repository, .. } => Some(repository.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of pulls in the working copy at `path`.
    #[must_use]
    pub fn pulls_at(&self, path: &Path) -> usize {
        self.count(|c| matches!(c, VcsCall::Pull(p) if p == path))
    }

    /// Number of checkouts in the working copy at `path`.
    #[must_use]
    pub fn checkouts_at(&self, path: &Path) -> usize {
        self.count(|c| matches!(c, VcsCall::Checkout { path: p, .. } if p == path))
    }

    /// Number of submodule updates in the working copy at `path`.
    #[must_use]
    pub fn submodule_pulls_at(&self, path: &Path) -> usize {
        self.count(|c| matches!(c, VcsCall::PullSubmodules(p) if p == path))
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&VcsCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: VcsCall) {
        self.calls.borrow_mut().push(call);
    }

    fn failed(command: &str) -> VcsError {
        VcsError::CommandFailed {
            command: command.to_string(),
            status: "exit status: 128".to_string(),
            stderr: "fatal: unable to access remote".to_string(),
        }
    }

    fn io_error(command: &str, error: &std::io::Error) -> VcsError {
        VcsError::InvalidOutput {
            command: command.to_string(),
            reason: error.to_string(),
        }
    }
}

impl VersionControl for FakeVcs {
    fn clone_repository(
        &self,
        repository: &str,
        directory: &str,
        cwd: &Path,
    ) -> Result<(), VcsError> {
        let path = cwd.join(directory);
        self.record(VcsCall::Clone {
            repository: repository.to_string(),
            path: path.clone(),
        });
        if self.failing_clones.borrow().contains(repository) {
            if self.partial_clones.get() {
                fs::create_dir_all(path.join(".git"))
                    .map_err(|e| Self::io_error("git clone", &e))?;
            }
            return Err(Self::failed("git clone"));
        }
        if self.clone_creates_folder.get() {
            fs::create_dir_all(&path).map_err(|e| Self::io_error("git clone", &e))?;
            fs::write(path.join("README"), repository)
                .map_err(|e| Self::io_error("git clone", &e))?;
        }
        Ok(())
    }

    fn pull(&self, cwd: &Path) -> Result<(), VcsError> {
        self.record(VcsCall::Pull(cwd.to_path_buf()));
        if self.failing_pulls.get() {
            return Err(Self::failed("git pull"));
        }
        Ok(())
    }

    fn checkout(&self, branch: &str, cwd: &Path) -> Result<(), VcsError> {
        self.record(VcsCall::Checkout {
            branch: branch.to_string(),
            path: cwd.to_path_buf(),
        });
        if self.failing_checkouts.get() {
            return Err(Self::failed("git checkout"));
        }
        fs::write(cwd.join(FAKE_HEAD_FILE), branch)
            .map_err(|e| Self::io_error("git checkout", &e))
    }

    fn is_detached_head(&self, cwd: &Path) -> Result<bool, VcsError> {
        self.record(VcsCall::IsDetachedHead(cwd.to_path_buf()));
        match fs::read_to_string(cwd.join(FAKE_HEAD_FILE)) {
            Ok(head) => Ok(!self.branches.borrow().contains(head.trim())),
            Err(_) => Ok(false),
        }
    }

    fn pull_submodules(&self, cwd: &Path) -> Result<(), VcsError> {
        self.record(VcsCall::PullSubmodules(cwd.to_path_buf()));
        Ok(())
    }

    fn tags(&self, cwd: &Path) -> Result<Vec<String>, VcsError> {
        self.record(VcsCall::Tags(cwd.to_path_buf()));
        Ok(self.tags.borrow().clone())
    }
}

/// [`Download`] serving fixed content by URL.
#[derive(Debug, Default)]
pub struct FakeDownload {
    files: RefCell<HashMap<String, Vec<u8>>>,
    downloads: RefCell<Vec<String>>,
}

impl FakeDownload {
    /// A downloader that knows no URLs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` at `url`.
    pub fn serve(&self, url: &str, content: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.to_string(), content.into());
    }

    /// URLs downloaded so far, in call order.
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl Download for FakeDownload {
    fn download(
        &self,
        cwd: &Path,
        source: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        self.downloads.borrow_mut().push(source.to_string());
        let files = self.files.borrow();
        let content = files.get(source).ok_or_else(|| DownloadError::Status {
            url: source.to_string(),
            status: 404,
        })?;
        let name = match filename {
            Some(name) => name.to_string(),
            None => file_name_from_url(source)
                .ok_or_else(|| DownloadError::InvalidUrl(source.to_string()))?,
        };
        let path = cwd.join(name);
        fs::write(&path, content)?;
        Ok(path)
    }
}

/// [`BuildGraph`] that records visited paths.
///
/// Paths whose folder name starts with a registered prefix report the
/// dependencies registered for that prefix.
#[derive(Debug, Default)]
pub struct RecordingGraph {
    /// Command name reported to the resolver.
    pub command: String,
    /// Paths passed to `recurse`, in call order.
    pub visited: Vec<PathBuf>,
    /// Paths for which `recurse` fails.
    pub fail_on: HashSet<PathBuf>,
    declarations: Vec<(String, Vec<DependencyRequest>)>,
}

impl RecordingGraph {
    /// A graph running `command`.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Self::default()
        }
    }

    /// Report `requests` when recursing into a folder named `<prefix>...`.
    pub fn declare(&mut self, prefix: &str, requests: Vec<DependencyRequest>) {
        self.declarations.push((prefix.to_string(), requests));
    }
}

impl BuildGraph for RecordingGraph {
    fn command(&self) -> &str {
        &self.command
    }

    fn recurse(&mut self, path: &Path) -> Result<Vec<DependencyRequest>, GraphError> {
        self.visited.push(path.to_path_buf());
        if self.fail_on.contains(path) {
            return Err(format!("no build description in {}", path.display()).into());
        }
        let folder = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self
            .declarations
            .iter()
            .find(|(prefix, _)| folder.starts_with(prefix.as_str()))
            .map(|(_, requests)| requests.clone())
            .unwrap_or_default())
    }
}
