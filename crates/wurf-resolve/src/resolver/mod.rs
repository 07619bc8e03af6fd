//! The resolver chain.
//!
//! [`SourceResolver`] walks the declared sources of a dependency and hands
//! each to the resolver for its type: [`HttpResolver`] for downloads, or
//! [`MethodResolver`] for git, which picks [`CheckoutResolver`],
//! [`SemverResolver`] or a plain [`VersionControlResolver`] clone.

mod checkout;
mod git;
mod http;
mod method;
mod source;
mod user;
mod version;

pub use checkout::{copy_tree, CheckoutResolver};
pub use git::VersionControlResolver;
pub use http::HttpResolver;
pub use method::MethodResolver;
pub use source::SourceResolver;
pub use user::{UserCheckoutResolver, UserMethodResolver, UserPathResolver, UserResolver};
pub use version::{select_tag, SemverResolver};
