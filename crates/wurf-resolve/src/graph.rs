//! The host build system, as seen by the resolver.

use crate::manifest::DependencyRequest;
use std::path::{Path, PathBuf};

/// Error returned by a [`BuildGraph`].
pub type GraphError = Box<dyn std::error::Error + Send + Sync>;

/// The build system that consumes resolved dependencies.
pub trait BuildGraph {
    /// Name of the command being run, used in error messages.
    fn command(&self) -> &str;

    /// Process the build description found at `path`.
    ///
    /// Returns the dependencies that description declares; they are resolved
    /// next, in the returned order. Must tolerate being called more than once
    /// for the same path.
    fn recurse(&mut self, path: &Path) -> Result<Vec<DependencyRequest>, GraphError>;
}

/// Order in which resolved dependencies are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Declaration order.
    Configure,
    /// Reverse declaration order.
    Build,
}

/// A resolved dependency as needed by the consuming passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// Dependency name.
    pub name: String,
    /// Resolved path, `None` if an optional dependency was unavailable.
    pub path: Option<PathBuf>,
    /// Whether the host should recurse into `path`.
    pub recurse: bool,
}

/// Visit resolved dependencies in the order required by `pass`.
///
/// Dependencies without a path or with recursion disabled are skipped.
///
/// # Errors
///
/// Returns the first failure of the build graph, wrapped with the dependency
/// name and the graph's command.
pub fn recurse_dependencies(
    dependencies: &[ResolvedDependency],
    graph: &mut dyn BuildGraph,
    pass: Pass,
) -> Result<(), crate::ResolveError> {
    let ordered: Box<dyn Iterator<Item = &ResolvedDependency>> = match pass {
        Pass::Configure => Box::new(dependencies.iter()),
        Pass::Build => Box::new(dependencies.iter().rev()),
    };

    for dependency in ordered {
        let path = match (&dependency.path, dependency.recurse) {
            (Some(path), true) => path,
            _ => {
                tracing::debug!(
                    name = %dependency.name,
                    command = graph.command(),
                    "skipped recurse"
                );
                continue;
            }
        };

        tracing::debug!(
            name = %dependency.name,
            command = graph.command(),
            path = %path.display(),
            "recurse"
        );

        graph
            .recurse(path)
            .map_err(|error| crate::ResolveError::Recurse {
                name: dependency.name.clone(),
                command: graph.command().to_string(),
                error,
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingGraph;
    use crate::ResolveError;

    fn resolved(name: &str, path: Option<&str>, recurse: bool) -> ResolvedDependency {
        ResolvedDependency {
            name: name.to_string(),
            path: path.map(PathBuf::from),
            recurse,
        }
    }

    fn deps() -> Vec<ResolvedDependency> {
        vec![
            resolved("waf-tools", Some("/b/waf-tools"), true),
            resolved("gtest", Some("/b/gtest"), true),
            resolved("docs", Some("/b/docs"), false),
            resolved("license", None, true),
            resolved("alpha", Some("/b/alpha"), true),
        ]
    }

    #[test]
    fn test_configure_order() {
        let mut graph = RecordingGraph::new("configure");
        recurse_dependencies(&deps(), &mut graph, Pass::Configure).unwrap();
        assert_eq!(
            graph.visited,
            vec![
                PathBuf::from("/b/waf-tools"),
                PathBuf::from("/b/gtest"),
                PathBuf::from("/b/alpha"),
            ]
        );
    }

    #[test]
    fn test_build_order_is_reversed() {
        let mut graph = RecordingGraph::new("build");
        recurse_dependencies(&deps(), &mut graph, Pass::Build).unwrap();
        assert_eq!(
            graph.visited,
            vec![
                PathBuf::from("/b/alpha"),
                PathBuf::from("/b/gtest"),
                PathBuf::from("/b/waf-tools"),
            ]
        );
    }

    #[test]
    fn test_failure_is_wrapped() {
        let mut graph = RecordingGraph::new("build");
        graph.fail_on.insert(PathBuf::from("/b/gtest"));
        let err = recurse_dependencies(&deps(), &mut graph, Pass::Configure).unwrap_err();
        match err {
            ResolveError::Recurse { name, command, .. } => {
                assert_eq!(name, "gtest");
                assert_eq!(command, "build");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
