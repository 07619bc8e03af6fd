//! Version control commands.
//!
//! The resolvers only talk to a repository through [`VersionControl`], so
//! the shell wrapper can be replaced in tests.

use std::path::Path;
use std::process::{Command, Output};
use thiserror::Error;
use tracing::debug;

/// Errors from version control commands.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The command could not be started.
    #[error("failed to run '{command}': {error}")]
    Spawn {
        command: String,
        #[source]
        error: std::io::Error,
    },

    /// The command ran and reported failure.
    #[error("'{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// An argument would be read as a command line option.
    #[error("refusing to pass '{argument}' to '{command}'")]
    InvalidArgument { command: String, argument: String },

    /// The command succeeded but its output could not be understood.
    #[error("unexpected output from '{command}': {reason}")]
    InvalidOutput { command: String, reason: String },
}

impl VcsError {
    /// True for failures of the command itself (network, credentials,
    /// missing refs, missing binary), as opposed to unexpected results.
    #[must_use]
    pub fn is_command_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::CommandFailed { .. })
    }
}

/// Operations the resolvers need from a version control system.
pub trait VersionControl {
    /// Clone `repository` into `cwd/directory`.
    fn clone_repository(&self, repository: &str, directory: &str, cwd: &Path)
        -> Result<(), VcsError>;

    /// Pull the current branch of the working copy at `cwd`.
    fn pull(&self, cwd: &Path) -> Result<(), VcsError>;

    /// Check out a branch, tag or commit in the working copy at `cwd`.
    fn checkout(&self, branch: &str, cwd: &Path) -> Result<(), VcsError>;

    /// True if the working copy at `cwd` is not on a branch.
    fn is_detached_head(&self, cwd: &Path) -> Result<bool, VcsError>;

    /// Synchronize and update submodules recursively.
    fn pull_submodules(&self, cwd: &Path) -> Result<(), VcsError>;

    /// All tags of the repository at `cwd`.
    fn tags(&self, cwd: &Path) -> Result<Vec<String>, VcsError>;
}

/// [`VersionControl`] backed by the `git` command line client.
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
}

impl Default for Git {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl Git {
    /// Use the `git` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    fn output(&self, args: &[&str], cwd: &Path) -> Result<Output, VcsError> {
        debug!(cwd = %cwd.display(), "{}", self.command_line(args));
        Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|error| VcsError::Spawn {
                command: self.command_line(args),
                error,
            })
    }

    fn run(&self, args: &[&str], cwd: &Path) -> Result<String, VcsError> {
        let output = self.output(args, cwd)?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command: self.command_line(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| VcsError::InvalidOutput {
            command: self.command_line(args),
            reason: e.to_string(),
        })
    }
}

impl VersionControl for Git {
    fn clone_repository(
        &self,
        repository: &str,
        directory: &str,
        cwd: &Path,
    ) -> Result<(), VcsError> {
        self.run(&["clone", "--", repository, directory], cwd).map(drop)
    }

    fn pull(&self, cwd: &Path) -> Result<(), VcsError> {
        self.run(&["pull"], cwd).map(drop)
    }

    fn checkout(&self, branch: &str, cwd: &Path) -> Result<(), VcsError> {
        // `git checkout -- <ref>` would read the ref as a path.
        if branch.starts_with('-') {
            return Err(VcsError::InvalidArgument {
                command: self.command_line(&["checkout"]),
                argument: branch.to_string(),
            });
        }
        self.run(&["checkout", branch], cwd).map(drop)
    }

    fn is_detached_head(&self, cwd: &Path) -> Result<bool, VcsError> {
        // Exit status 1 means HEAD is not a symbolic ref.
        let args = ["symbolic-ref", "-q", "HEAD"];
        let output = self.output(&args, cwd)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VcsError::CommandFailed {
                command: self.command_line(&args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn pull_submodules(&self, cwd: &Path) -> Result<(), VcsError> {
        if !cwd.join(".gitmodules").is_file() {
            return Ok(());
        }
        self.run(&["submodule", "sync", "--recursive"], cwd)?;
        self.run(&["submodule", "update", "--init", "--recursive"], cwd)
            .map(drop)
    }

    fn tags(&self, cwd: &Path) -> Result<Vec<String>, VcsError> {
        let stdout = self.run(&["tag", "-l"], cwd)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_command_failure() {
        let git = Git::with_program("wurf-test-no-such-git-binary");
        let dir = tempfile::tempdir().unwrap();
        let err = git.pull(dir.path()).unwrap_err();
        assert!(matches!(err, VcsError::Spawn { .. }));
        assert!(err.is_command_failure());
    }

    #[test]
    fn test_invalid_output_is_not_command_failure() {
        let err = VcsError::InvalidOutput {
            command: "git tag -l".into(),
            reason: "invalid utf-8".into(),
        };
        assert!(!err.is_command_failure());
    }

    #[test]
    fn test_command_line() {
        let git = Git::new();
        assert_eq!(git.command_line(&["checkout", "v1.0.0"]), "git checkout v1.0.0");
    }

    #[test]
    fn test_option_like_arguments_stay_positional() {
        let git = Git::with_program("wurf-test-no-such-git-binary");
        let dir = tempfile::tempdir().unwrap();

        let err = git
            .clone_repository("--upload-pack=touch pwned", "alpha", dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("clone -- --upload-pack=touch pwned alpha"));

        let err = git.checkout("--orphan", dir.path()).unwrap_err();
        assert!(matches!(err, VcsError::InvalidArgument { .. }));
        assert!(!err.is_command_failure());
    }
}
