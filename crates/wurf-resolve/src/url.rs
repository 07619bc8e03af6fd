//! Clone URLs for git sources.

use crate::config::GitProtocol;
use std::path::Path;

/// Turns a declared git source into the URL handed to `git clone`.
///
/// Sources such as `github.com/org/repo.git` carry no scheme; they are
/// completed with the configured protocol. Full URLs, scp-style locations and
/// local paths pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitUrlResolver {
    protocol: GitProtocol,
}

impl GitUrlResolver {
    /// Create a resolver for the given protocol.
    #[must_use]
    pub fn new(protocol: GitProtocol) -> Self {
        Self { protocol }
    }

    /// Determine the clone URL for `source`.
    #[must_use]
    pub fn determine_url(&self, source: &str) -> String {
        if has_scheme(source) || is_scp_like(source) || Path::new(source).exists() {
            return source.to_string();
        }

        let (host, path) = match source.split_once('/') {
            Some((host, path)) => (host, path),
            None => return source.to_string(),
        };

        match self.protocol {
            GitProtocol::Https => format!("https://{host}/{path}"),
            GitProtocol::Ssh => format!("git@{host}:{path}"),
            GitProtocol::Git => format!("git://{host}/{path}"),
        }
    }
}

fn has_scheme(source: &str) -> bool {
    source.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    })
}

/// `user@host:path`
fn is_scp_like(source: &str) -> bool {
    match (source.find('@'), source.find(':'), source.find('/')) {
        (Some(at), Some(colon), slash) => at < colon && slash.map_or(true, |s| colon < s),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_completion() {
        let urls = GitUrlResolver::new(GitProtocol::Https);
        assert_eq!(
            urls.determine_url("github.com/steinwurf/waf-tools.git"),
            "https://github.com/steinwurf/waf-tools.git"
        );
    }

    #[test]
    fn test_ssh_completion() {
        let urls = GitUrlResolver::new(GitProtocol::Ssh);
        assert_eq!(
            urls.determine_url("github.com/steinwurf/waf-tools.git"),
            "git@github.com:steinwurf/waf-tools.git"
        );
    }

    #[test]
    fn test_git_completion() {
        let urls = GitUrlResolver::new(GitProtocol::Git);
        assert_eq!(
            urls.determine_url("gitlab.com/group/repo.git"),
            "git://gitlab.com/group/repo.git"
        );
    }

    #[test]
    fn test_full_urls_pass_through() {
        let urls = GitUrlResolver::new(GitProtocol::Ssh);
        for url in [
            "https://mirror1/alpha.git",
            "ssh://git@host/alpha.git",
            "file:///srv/git/alpha.git",
            "git@github.com:org/alpha.git",
        ] {
            assert_eq!(urls.determine_url(url), url);
        }
    }

    #[test]
    fn test_local_path_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("alpha");
        std::fs::create_dir(&repo).unwrap();
        let source = repo.to_string_lossy().to_string();

        let urls = GitUrlResolver::new(GitProtocol::Https);
        assert_eq!(urls.determine_url(&source), source);
    }
}
