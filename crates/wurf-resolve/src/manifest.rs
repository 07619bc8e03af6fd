//! Dependency manifest (`wurf.toml`) parsing and validation.
//!
//! ```toml
//! [resolve]
//! bundle_path = "bundle_dependencies"
//!
//! [[dependency]]
//! name = "waf-tools"
//! resolver = "git"
//! method = "checkout"
//! checkout = "4.0.0"
//! sources = ["github.com/steinwurf/waf-tools.git"]
//! ```

use crate::fingerprint::{fingerprint, Fingerprint};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "wurf.toml";

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid dependency name '{0}': {1}")]
    InvalidName(String, &'static str),

    #[error("dependency '{name}' declares no sources")]
    NoSources { name: String },

    #[error("dependency '{name}': {reason}")]
    InvalidField { name: String, reason: String },
}

/// How the sources of a dependency are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverType {
    /// Clone a git repository.
    Git,
    /// Download a file over HTTP(S).
    Http,
}

impl ResolverType {
    /// Returns the resolver type as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for ResolverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which revision of a git dependency is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// An explicit branch, tag or commit given by `checkout`.
    Checkout,
    /// The newest tag within the major version given by `major`.
    Semver,
}

impl Method {
    /// Returns the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Semver => "semver",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared dependency.
///
/// Immutable once handed to the dependency manager. Every field, including
/// unknown keys collected in `extra`, contributes to the fingerprint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DependencyRequest {
    /// Dependency name, unique within one resolution pass.
    pub name: String,

    /// Resolver used for every source.
    pub resolver: ResolverType,

    /// Candidate sources, tried in declared order.
    pub sources: Vec<String>,

    /// Git resolution method.
    #[serde(default)]
    pub method: Option<Method>,

    /// Branch, tag or commit for the checkout method.
    #[serde(default)]
    pub checkout: Option<String>,

    /// Major version for the semver method.
    #[serde(default)]
    pub major: Option<u64>,

    /// Tolerate resolution failure.
    #[serde(default)]
    pub optional: bool,

    /// Recurse into the resolved path.
    #[serde(default = "default_true")]
    pub recurse: bool,

    /// File name for downloaded sources.
    #[serde(default)]
    pub filename: Option<String>,

    /// Unpack downloaded `.tar.gz` archives.
    #[serde(default)]
    pub extract: bool,

    /// Expected SHA-256 of a downloaded file.
    #[serde(default)]
    pub sha256: Option<String>,

    /// Any other parameters.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl DependencyRequest {
    /// A git dependency resolved from `sources`.
    #[must_use]
    pub fn git<S: Into<String>>(name: impl Into<String>, sources: impl IntoIterator<Item = S>) -> Self {
        Self::new(name.into(), ResolverType::Git, sources)
    }

    /// A downloaded dependency resolved from `sources`.
    #[must_use]
    pub fn http<S: Into<String>>(name: impl Into<String>, sources: impl IntoIterator<Item = S>) -> Self {
        Self::new(name.into(), ResolverType::Http, sources)
    }

    fn new<S: Into<String>>(
        name: String,
        resolver: ResolverType,
        sources: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name,
            resolver,
            sources: sources.into_iter().map(Into::into).collect(),
            method: None,
            checkout: None,
            major: None,
            optional: false,
            recurse: true,
            filename: None,
            extract: false,
            sha256: None,
            extra: BTreeMap::new(),
        }
    }

    /// Use the checkout method with the given branch, tag or commit.
    #[must_use]
    pub fn with_checkout(mut self, checkout: impl Into<String>) -> Self {
        self.method = Some(Method::Checkout);
        self.checkout = Some(checkout.into());
        self
    }

    /// Use the semver method for the given major version.
    #[must_use]
    pub fn with_semver(mut self, major: u64) -> Self {
        self.method = Some(Method::Semver);
        self.major = Some(major);
        self
    }

    /// Mark the dependency optional.
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Control recursion into the resolved path.
    #[must_use]
    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    /// The effective git method.
    ///
    /// A request without an explicit method but with a `checkout` uses the
    /// checkout method; one with neither tracks the default branch.
    #[must_use]
    pub fn effective_method(&self) -> Option<Method> {
        self.method
            .or_else(|| self.checkout.as_ref().map(|_| Method::Checkout))
    }

    /// The full parameter mapping of this request.
    #[must_use]
    pub fn params(&self) -> Map<String, Value> {
        let mut params: Map<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        params.insert("name".into(), Value::from(self.name.as_str()));
        params.insert("resolver".into(), Value::from(self.resolver.as_str()));
        params.insert(
            "sources".into(),
            Value::Array(self.sources.iter().map(|s| Value::from(s.as_str())).collect()),
        );
        params.insert("optional".into(), Value::from(self.optional));
        params.insert("recurse".into(), Value::from(self.recurse));
        params.insert("extract".into(), Value::from(self.extract));
        if let Some(method) = self.method {
            params.insert("method".into(), Value::from(method.as_str()));
        }
        if let Some(ref checkout) = self.checkout {
            params.insert("checkout".into(), Value::from(checkout.as_str()));
        }
        if let Some(major) = self.major {
            params.insert("major".into(), Value::from(major));
        }
        if let Some(ref filename) = self.filename {
            params.insert("filename".into(), Value::from(filename.as_str()));
        }
        if let Some(ref sha256) = self.sha256 {
            params.insert("sha256".into(), Value::from(sha256.as_str()));
        }
        params
    }

    /// Fingerprint over all parameters of this request.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.params())
    }

    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name, an empty source list, or
    /// parameters that do not fit the resolver and method.
    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_name(&self.name)?;

        if self.sources.is_empty() {
            return Err(ManifestError::NoSources {
                name: self.name.clone(),
            });
        }

        let invalid = |reason: &str| ManifestError::InvalidField {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        match self.resolver {
            ResolverType::Git => match self.effective_method() {
                Some(Method::Checkout) if self.checkout.as_deref().map_or(true, str::is_empty) => {
                    Err(invalid("method 'checkout' requires a non-empty 'checkout'"))
                }
                Some(Method::Semver) if self.major.is_none() => {
                    Err(invalid("method 'semver' requires 'major'"))
                }
                _ if self.extract || self.sha256.is_some() => {
                    Err(invalid("'extract' and 'sha256' only apply to http dependencies"))
                }
                _ => Ok(()),
            },
            ResolverType::Http => {
                if self.method.is_some() || self.checkout.is_some() || self.major.is_some() {
                    Err(invalid("'method', 'checkout' and 'major' only apply to git dependencies"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Validate a dependency name.
///
/// Names become part of folder and file names, so they are restricted.
fn validate_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot be empty",
        ));
    }

    if name.len() > 64 {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot exceed 64 characters",
        ));
    }

    if !name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name must start with a letter or digit",
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(ManifestError::InvalidName(
                name.to_string(),
                "name can only contain letters, numbers, dots, hyphens, and underscores",
            ));
        }
    }

    Ok(())
}

/// The `[resolve]` table of a manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveTable {
    /// Folder where dependencies are placed.
    #[serde(default)]
    pub bundle_path: Option<String>,

    /// Folder where resolution records are stored.
    #[serde(default)]
    pub bundle_config_path: Option<String>,

    /// Trust stored records with a matching fingerprint.
    #[serde(default)]
    pub fast_resolve: Option<bool>,

    /// Name of the dependency that must be declared first.
    #[serde(default)]
    pub bootstrap: Option<String>,

    /// Protocol for git sources given without a scheme.
    #[serde(default)]
    pub git_protocol: Option<String>,
}

/// The complete wurf.toml manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Resolution settings.
    #[serde(default)]
    pub resolve: ResolveTable,

    /// Declared dependencies, in declaration order.
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyRequest>,
}

impl Manifest {
    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the manifest of a dependency folder, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest exists but cannot be read or parsed.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Option<Self>, ManifestError> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::from_path(path).map(Some)
    }

    /// Parse a manifest from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a dependency fails validation.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        for dep in &manifest.dependencies {
            dep.validate()?;
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_git_checkout_dependency() {
        let toml = r#"
[[dependency]]
name = "waf-tools"
resolver = "git"
method = "checkout"
checkout = "4.0.0"
sources = ["github.com/steinwurf/waf-tools.git"]
"#;
        let manifest = Manifest::parse(toml).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        let dep = &manifest.dependencies[0];
        assert_eq!(dep.name, "waf-tools");
        assert_eq!(dep.resolver, ResolverType::Git);
        assert_eq!(dep.method, Some(Method::Checkout));
        assert_eq!(dep.checkout.as_deref(), Some("4.0.0"));
        assert!(dep.recurse);
        assert!(!dep.optional);
    }

    #[test]
    fn parse_keeps_declaration_order() {
        let toml = r#"
[[dependency]]
name = "waf-tools"
resolver = "git"
checkout = "4.0.0"
sources = ["github.com/steinwurf/waf-tools.git"]

[[dependency]]
name = "zlib"
resolver = "http"
sources = ["https://zlib.net/zlib.tar.gz"]
extract = true

[[dependency]]
name = "alpha"
resolver = "git"
method = "semver"
major = 2
sources = ["https://mirror1/alpha.git", "https://mirror2/alpha.git"]
optional = true
"#;
        let manifest = Manifest::parse(toml).unwrap();
        let names: Vec<_> = manifest.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["waf-tools", "zlib", "alpha"]);
        assert_eq!(manifest.dependencies[0].effective_method(), Some(Method::Checkout));
        assert!(manifest.dependencies[1].extract);
        assert_eq!(manifest.dependencies[2].major, Some(2));
        assert_eq!(manifest.dependencies[2].sources.len(), 2);
    }

    #[test]
    fn parse_resolve_table() {
        let toml = r#"
[resolve]
bundle_path = "deps"
fast_resolve = true
git_protocol = "ssh"
"#;
        let manifest = Manifest::parse(toml).unwrap();
        assert_eq!(manifest.resolve.bundle_path.as_deref(), Some("deps"));
        assert_eq!(manifest.resolve.fast_resolve, Some(true));
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn unknown_keys_are_part_of_the_fingerprint() {
        let toml = r#"
[[dependency]]
name = "foo"
resolver = "git"
checkout = "v1"
sources = ["https://example.com/foo.git"]
post_resolve = "run"
"#;
        let manifest = Manifest::parse(toml).unwrap();
        let dep = &manifest.dependencies[0];
        assert_eq!(dep.extra.get("post_resolve"), Some(&Value::from("run")));

        let plain = DependencyRequest::git("foo", ["https://example.com/foo.git"]).with_checkout("v1");
        assert_ne!(dep.fingerprint(), plain.fingerprint());
    }

    #[test]
    fn builder_matches_parsed_request() {
        let toml = r#"
[[dependency]]
name = "foo"
resolver = "git"
method = "checkout"
checkout = "v1"
sources = ["https://example.com/foo.git"]
"#;
        let manifest = Manifest::parse(toml).unwrap();
        let built = DependencyRequest::git("foo", ["https://example.com/foo.git"]).with_checkout("v1");
        assert_eq!(manifest.dependencies[0], built);
        assert_eq!(manifest.dependencies[0].fingerprint(), built.fingerprint());
    }

    #[test]
    fn checkout_changes_fingerprint() {
        let v1 = DependencyRequest::git("foo", ["https://example.com/foo.git"]).with_checkout("v1");
        let v2 = DependencyRequest::git("foo", ["https://example.com/foo.git"]).with_checkout("v2");
        assert_ne!(v1.fingerprint(), v2.fingerprint());
    }

    #[test]
    fn invalid_name_empty() {
        let dep = DependencyRequest::git("", ["https://example.com/foo.git"]);
        assert!(matches!(dep.validate(), Err(ManifestError::InvalidName(..))));
    }

    #[test]
    fn invalid_name_with_separator() {
        let dep = DependencyRequest::git("../foo", ["https://example.com/foo.git"]);
        assert!(matches!(dep.validate(), Err(ManifestError::InvalidName(..))));
    }

    #[test]
    fn missing_sources() {
        let dep = DependencyRequest::git("foo", Vec::<String>::new());
        assert!(matches!(dep.validate(), Err(ManifestError::NoSources { .. })));
    }

    #[test]
    fn checkout_method_requires_checkout() {
        let mut dep = DependencyRequest::git("foo", ["https://example.com/foo.git"]);
        dep.method = Some(Method::Checkout);
        assert!(matches!(dep.validate(), Err(ManifestError::InvalidField { .. })));
    }

    #[test]
    fn semver_method_requires_major() {
        let mut dep = DependencyRequest::git("foo", ["https://example.com/foo.git"]);
        dep.method = Some(Method::Semver);
        assert!(matches!(dep.validate(), Err(ManifestError::InvalidField { .. })));
    }

    #[test]
    fn http_rejects_git_fields() {
        let toml = r#"
[[dependency]]
name = "zlib"
resolver = "http"
checkout = "v1"
sources = ["https://zlib.net/zlib.tar.gz"]
"#;
        let err = Manifest::parse(toml).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidField { .. }));
    }

    #[test]
    fn unknown_resolver() {
        let toml = r#"
[[dependency]]
name = "foo"
resolver = "svn"
sources = ["svn://example.com/foo"]
"#;
        let err = Manifest::parse(toml).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(..)));
    }
}
