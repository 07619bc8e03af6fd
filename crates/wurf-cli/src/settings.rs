//! Resolution settings from manifest, environment and command line.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use wurf_resolve::{Manifest, ResolveConfig, MANIFEST_FILE};

/// Options shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to the manifest (defaults to ./wurf.toml)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Folder where dependencies are placed
    #[arg(long, value_name = "DIR")]
    pub bundle_path: Option<PathBuf>,

    /// Folder where resolution records are stored
    #[arg(long, value_name = "DIR")]
    pub bundle_config_path: Option<PathBuf>,
}

/// Loaded manifest and effective settings.
#[derive(Debug)]
pub struct Settings {
    pub config: ResolveConfig,
    pub manifest: Option<Manifest>,
    pub manifest_path: PathBuf,
}

impl Settings {
    /// Layer defaults, the manifest, `WURF_*` variables, `args` and finally
    /// `overrides`, then make all paths absolute against the manifest folder.
    pub fn load(
        args: &ConfigArgs,
        overrides: impl FnOnce(&mut ResolveConfig) -> Result<()>,
    ) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        let manifest_path = match args.manifest {
            Some(ref path) => wurf_resolve::expand_path(path, &cwd),
            None => cwd.join(MANIFEST_FILE),
        };
        let root = manifest_path
            .parent()
            .map_or_else(|| cwd.clone(), Path::to_path_buf);

        let manifest = if manifest_path.is_file() {
            Some(Manifest::from_path(&manifest_path).with_context(|| {
                format!("failed to load {}", manifest_path.display())
            })?)
        } else if args.manifest.is_some() {
            bail!("manifest {} does not exist", manifest_path.display());
        } else {
            None
        };

        let mut config = ResolveConfig::default();
        if let Some(ref manifest) = manifest {
            config
                .apply_manifest(&manifest.resolve)
                .context("invalid [resolve] table")?;
        }
        config.apply_env().context("invalid WURF_* environment variable")?;
        if let Some(ref path) = args.bundle_path {
            config.bundle_path.clone_from(path);
        }
        if let Some(ref path) = args.bundle_config_path {
            config.bundle_config_path.clone_from(path);
        }
        overrides(&mut config)?;
        config.absolutize(&root);

        tracing::debug!(
            manifest = %manifest_path.display(),
            bundle_path = %config.bundle_path.display(),
            bundle_config_path = %config.bundle_config_path.display(),
            fast_resolve = config.fast_resolve,
            "loaded settings"
        );

        Ok(Self {
            config,
            manifest,
            manifest_path,
        })
    }

    /// The manifest, which the command cannot run without.
    pub fn require_manifest(&self) -> Result<&Manifest> {
        self.manifest.as_ref().with_context(|| {
            format!(
                "no {} found at {}",
                MANIFEST_FILE,
                self.manifest_path.display()
            )
        })
    }
}

/// Parse a `NAME=VALUE` argument.
pub fn parse_key_value<T>(arg: &str) -> Result<(String, T), String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{arg}'"))?;
    if key.is_empty() {
        return Err(format!("missing name in '{arg}'"));
    }
    let value = value
        .parse()
        .map_err(|e| format!("invalid value in '{arg}': {e}"))?;
    Ok((key.to_string(), value))
}
