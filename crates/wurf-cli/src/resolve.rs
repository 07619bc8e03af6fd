//! Implementation of the `wurf resolve` command.

use crate::graph::ManifestGraph;
use crate::settings::{parse_key_value, ConfigArgs, Settings};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use wurf_resolve::{
    DependencyManager, Git, GitProtocol, HttpDownload, ResolveConfig, ResolveMode,
    ResolvedDependency,
};

/// Options for the resolve command.
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Reuse stored results whose fingerprint is unchanged
    #[arg(long)]
    pub fast_resolve: bool,

    /// Use a local folder for a dependency (NAME=DIR)
    #[arg(long = "path", value_name = "NAME=DIR", value_parser = parse_key_value::<PathBuf>)]
    pub paths: Vec<(String, PathBuf)>,

    /// Check out a specific ref of a git dependency (NAME=REF)
    #[arg(long = "use-checkout", value_name = "NAME=REF", value_parser = parse_key_value::<String>)]
    pub checkouts: Vec<(String, String)>,

    /// Protocol for git sources without a scheme (https, ssh, git)
    #[arg(long, value_name = "PROTOCOL")]
    pub git_protocol: Option<String>,
}

impl ResolveArgs {
    fn apply(&self, config: &mut ResolveConfig) -> Result<()> {
        if self.fast_resolve {
            config.fast_resolve = true;
        }
        if let Some(ref protocol) = self.git_protocol {
            config.git_protocol = protocol.parse::<GitProtocol>()?;
        }
        config.user_paths.extend(self.paths.iter().cloned());
        config.user_checkouts.extend(self.checkouts.iter().cloned());
        Ok(())
    }
}

/// Resolve all dependencies of the manifest and record the results.
pub fn resolve_dependencies(args: &ResolveArgs) -> Result<Vec<ResolvedDependency>> {
    let settings = Settings::load(&args.config, |config| args.apply(config))?;
    let manifest = settings.require_manifest()?;

    let git = Git::new();
    let downloader = HttpDownload::new().context("failed to create HTTP client")?;
    let mut manager = DependencyManager::new(&settings.config, ResolveMode::Active, &git, &downloader);
    let mut graph = ManifestGraph::new("resolve");

    manager.add_dependencies(&manifest.dependencies, &mut graph)?;
    manager.finish()?;

    Ok(manager.session().resolved())
}

/// Print one line per dependency.
pub fn print_summary(resolved: &[ResolvedDependency]) {
    for dependency in resolved {
        match dependency.path {
            Some(ref path) => println!("Resolve dependency {}: {}", dependency.name, path.display()),
            None => println!("Resolve dependency {}: Unavailable", dependency.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = ResolveArgs {
            fast_resolve: true,
            paths: vec![("alpha".into(), PathBuf::from("/src/alpha"))],
            checkouts: vec![("beta".into(), "feature".into())],
            git_protocol: Some("ssh".into()),
            ..ResolveArgs::default()
        };
        let mut config = ResolveConfig::default();
        args.apply(&mut config).unwrap();

        assert!(config.fast_resolve);
        assert_eq!(config.git_protocol, GitProtocol::Ssh);
        assert_eq!(config.user_paths["alpha"], PathBuf::from("/src/alpha"));
        assert_eq!(config.user_checkouts["beta"], "feature");
    }

    #[test]
    fn test_unknown_protocol() {
        let args = ResolveArgs {
            git_protocol: Some("ftp".into()),
            ..ResolveArgs::default()
        };
        assert!(args.apply(&mut ResolveConfig::default()).is_err());
    }
}
