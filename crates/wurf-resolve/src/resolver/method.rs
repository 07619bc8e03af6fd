//! Dispatch of git sources to the declared method.

use super::checkout::CheckoutResolver;
use super::user::UserMethodResolver;
use super::version::SemverResolver;
use crate::error::SourceError;
use crate::manifest::{DependencyRequest, Method};
use std::path::{Path, PathBuf};

/// Resolves one git source with the method of the request.
///
/// User method overrides are tried first, in order; the first one that
/// applies wins. Requests without a method track the default branch of the
/// base clone.
pub struct MethodResolver<'a> {
    checkout: CheckoutResolver<'a>,
    user_methods: Vec<Box<dyn UserMethodResolver + 'a>>,
}

impl<'a> MethodResolver<'a> {
    #[must_use]
    pub fn new(checkout: CheckoutResolver<'a>) -> Self {
        Self {
            checkout,
            user_methods: Vec::new(),
        }
    }

    /// Add an override consulted before the declared method.
    #[must_use]
    pub fn with_user_method(mut self, resolver: Box<dyn UserMethodResolver + 'a>) -> Self {
        self.user_methods.push(resolver);
        self
    }

    /// Resolve `source` of `request` below `cwd`.
    ///
    /// # Errors
    ///
    /// Returns the error of the override or method resolver that ran.
    pub fn resolve(
        &self,
        request: &DependencyRequest,
        cwd: &Path,
        source: &str,
    ) -> Result<PathBuf, SourceError> {
        for user in &self.user_methods {
            if let Some(path) = user.resolve(request, cwd, source)? {
                return Ok(path);
            }
        }

        let name = &request.name;
        match request.effective_method() {
            Some(Method::Checkout) => {
                let checkout = request.checkout.as_deref().ok_or_else(|| {
                    SourceError::InvalidRequest {
                        name: name.clone(),
                        reason: "method 'checkout' without 'checkout'".to_string(),
                    }
                })?;
                self.checkout.resolve(name, cwd, source, checkout)
            }
            Some(Method::Semver) => {
                let major = request.major.ok_or_else(|| SourceError::InvalidRequest {
                    name: name.clone(),
                    reason: "method 'semver' without 'major'".to_string(),
                })?;
                SemverResolver::new(self.checkout).resolve(name, cwd, source, major)
            }
            None => self.checkout.base().resolve(name, cwd, source),
        }
    }
}

impl std::fmt::Debug for MethodResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodResolver")
            .field("checkout", &self.checkout)
            .field("user_methods", &self.user_methods.len())
            .finish()
    }
}
