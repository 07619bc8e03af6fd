//! Implementation of the `wurf configure` and `wurf build` commands.
//!
//! Both replay the results of the last `wurf resolve` without touching any
//! source.

use crate::graph::ManifestGraph;
use crate::settings::{ConfigArgs, Settings};
use anyhow::{bail, Result};
use std::path::PathBuf;
use wurf_resolve::{
    recurse_dependencies, DependencyManager, Git, HttpDownload, Pass, RecordStore, ResolveMode,
};

/// Walk the manifest in declaration order using the stored records.
///
/// Returns the visited dependency folders.
pub fn configure(args: &ConfigArgs) -> Result<Vec<PathBuf>> {
    let settings = Settings::load(args, |_| Ok(()))?;
    let manifest = settings.require_manifest()?;
    ensure_resolved(&RecordStore::new(&settings.config.bundle_config_path))?;

    let git = Git::new();
    let downloader = HttpDownload::new()?;
    let mut manager = DependencyManager::new(&settings.config, ResolveMode::Passive, &git, &downloader);
    let mut graph = ManifestGraph::new("configure");
    manager.add_dependencies(&manifest.dependencies, &mut graph)?;

    Ok(graph.visited().to_vec())
}

/// Visit the stored dependencies in reverse declaration order.
///
/// Returns the visited dependency folders.
pub fn build(args: &ConfigArgs) -> Result<Vec<PathBuf>> {
    let settings = Settings::load(args, |_| Ok(()))?;
    let store = RecordStore::new(&settings.config.bundle_config_path);
    ensure_resolved(&store)?;

    let dependencies = store.restore()?;
    let mut graph = ManifestGraph::new("build");
    recurse_dependencies(&dependencies, &mut graph, Pass::Build)?;

    Ok(graph.visited().to_vec())
}

fn ensure_resolved(store: &RecordStore) -> Result<()> {
    if !store.index_path().is_file() {
        bail!(
            "no resolve results in {}, run `wurf resolve` first",
            store.dir().display()
        );
    }
    Ok(())
}
