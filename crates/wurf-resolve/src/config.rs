//! Resolution settings.
//!
//! Settings are layered: built-in defaults, then the manifest's `[resolve]`
//! table, then environment variables, then whatever the caller sets last
//! (usually the command line).

use crate::manifest::ResolveTable;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default folder for bundled dependencies.
pub const DEFAULT_BUNDLE_PATH: &str = "bundle_dependencies";

/// Default folder for resolution records.
pub const DEFAULT_BUNDLE_CONFIG_PATH: &str = "build/resolve_config";

/// The dependency that must be declared before all others.
pub const DEFAULT_BOOTSTRAP: &str = "waf-tools";

/// Errors in resolution settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown git protocol '{0}', expected one of: https, ssh, git")]
    UnknownProtocol(String),

    #[error("invalid value '{value}' for {key}: expected true or false")]
    InvalidBool { key: &'static str, value: String },

    #[error("failed to determine the current directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol used for git sources that carry no scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitProtocol {
    /// `https://host/path`
    #[default]
    Https,
    /// `git@host:path`
    Ssh,
    /// `git://host/path`
    Git,
}

impl std::str::FromStr for GitProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "https" | "https://" => Ok(Self::Https),
            "ssh" | "git@" => Ok(Self::Ssh),
            "git" | "git://" => Ok(Self::Git),
            _ => Err(ConfigError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Settings for one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Folder where dependencies are cloned, checked out and downloaded.
    pub bundle_path: PathBuf,
    /// Folder holding `<name>.resolve.json` records and `resolve.json`.
    pub bundle_config_path: PathBuf,
    /// Trust stored records whose fingerprint matches.
    pub fast_resolve: bool,
    /// Dependency that must be declared first, if any.
    pub bootstrap: Option<String>,
    /// Protocol for scheme-less git sources.
    pub git_protocol: GitProtocol,
    /// User supplied paths, by dependency name.
    pub user_paths: BTreeMap<String, PathBuf>,
    /// User supplied checkouts, by dependency name.
    pub user_checkouts: BTreeMap<String, String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            bundle_path: PathBuf::from(DEFAULT_BUNDLE_PATH),
            bundle_config_path: PathBuf::from(DEFAULT_BUNDLE_CONFIG_PATH),
            fast_resolve: false,
            bootstrap: Some(DEFAULT_BOOTSTRAP.to_string()),
            git_protocol: GitProtocol::default(),
            user_paths: BTreeMap::new(),
            user_checkouts: BTreeMap::new(),
        }
    }
}

impl ResolveConfig {
    /// Apply the `[resolve]` table of a manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the table names an unknown git protocol.
    pub fn apply_manifest(&mut self, table: &ResolveTable) -> Result<(), ConfigError> {
        if let Some(ref path) = table.bundle_path {
            self.bundle_path = PathBuf::from(path);
        }
        if let Some(ref path) = table.bundle_config_path {
            self.bundle_config_path = PathBuf::from(path);
        }
        if let Some(fast) = table.fast_resolve {
            self.fast_resolve = fast;
        }
        if let Some(ref bootstrap) = table.bootstrap {
            self.bootstrap = (!bootstrap.is_empty()).then(|| bootstrap.clone());
        }
        if let Some(ref protocol) = table.git_protocol {
            self.git_protocol = protocol.parse()?;
        }
        Ok(())
    }

    /// Apply `WURF_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("WURF_BUNDLE_PATH") {
            self.bundle_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("WURF_BUNDLE_CONFIG_PATH") {
            self.bundle_config_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("WURF_FAST_RESOLVE") {
            self.fast_resolve = parse_bool("WURF_FAST_RESOLVE", &value)?;
        }
        if let Some(protocol) = lookup("WURF_GIT_PROTOCOL") {
            self.git_protocol = protocol.parse()?;
        }
        Ok(())
    }

    /// Expand `~` and make every configured path absolute against `base`.
    pub fn absolutize(&mut self, base: &Path) {
        self.bundle_path = expand_path(&self.bundle_path, base);
        self.bundle_config_path = expand_path(&self.bundle_config_path, base);
        for path in self.user_paths.values_mut() {
            *path = expand_path(path, base);
        }
    }

    /// [`absolutize`](Self::absolutize) against the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn absolutize_from_cwd(&mut self) -> Result<(), ConfigError> {
        let cwd = std::env::current_dir()?;
        self.absolutize(&cwd);
        Ok(())
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

/// Expand a leading `~`, resolve relative paths against `base` and drop
/// `.` and `..` components.
#[must_use]
pub fn expand_path(path: &Path, base: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&base.join(expanded))
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
