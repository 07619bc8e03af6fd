//! File downloads and archive handling.

use crate::fingerprint::sha256_hex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while downloading.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The source is not a usable URL.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// Network error during fetch.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("download of '{url}' failed with status {status}")]
    Status { url: String, status: u16 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Fetches a single file.
pub trait Download {
    /// Download `source` into the folder `cwd` and return the file path.
    ///
    /// `filename` overrides the name derived from the URL.
    fn download(
        &self,
        cwd: &Path,
        source: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError>;
}

/// Configuration for the HTTP download client.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Honor `HTTP_PROXY` and related environment variables.
    pub system_proxy: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("wurf/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(60),
            system_proxy: true,
        }
    }
}

/// [`Download`] over HTTP(S) with a blocking client.
pub struct HttpDownload {
    client: reqwest::blocking::Client,
}

impl HttpDownload {
    /// Create a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_config(&DownloadConfig::default())
    }

    /// Create a client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout);
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Download for HttpDownload {
    fn download(
        &self,
        cwd: &Path,
        source: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let name = match filename {
            Some(name) => name.to_string(),
            None => file_name_from_url(source)
                .ok_or_else(|| DownloadError::InvalidUrl(source.to_string()))?,
        };
        let file_path = cwd.join(name);

        debug!(url = source, path = %file_path.display(), "downloading");

        let mut response = self
            .client
            .get(source)
            .send()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: source.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Only complete downloads may appear under the final name.
        let partial = partial_path(&file_path);
        if let Err(error) = write_response(&mut response, &partial) {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    debug!(path = %partial.display(), error = %cleanup, "cleanup failed");
                }
            }
            return Err(error);
        }
        fs::rename(&partial, &file_path)?;

        Ok(file_path)
    }
}

fn write_response(response: &mut reqwest::blocking::Response, path: &Path) -> Result<(), DownloadError> {
    let mut file = File::create(path)?;
    response
        .copy_to(&mut file)
        .map_err(|e| DownloadError::Network(e.to_string()))?;
    Ok(())
}

/// `<file>.part`, where a download is written before it is complete.
fn partial_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    file_path.with_file_name(name)
}

/// The last non-empty path segment of a URL, without query or fragment.
#[must_use]
pub fn file_name_from_url(source: &str) -> Option<String> {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let (_, path) = after_scheme.split_once('/')?;
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(String::from)
}

/// SHA-256 checksum of a file as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let data = fs::read(path)?;
    Ok(sha256_hex(&data))
}

/// True if `path` names a gzip compressed tarball.
#[must_use]
pub fn is_tarball(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Folder name for the extracted contents of a tarball.
#[must_use]
pub fn extraction_dir(tarball_path: &Path) -> PathBuf {
    let name = tarball_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    let stem = if lower.ends_with(".tar.gz") {
        &name[..name.len() - ".tar.gz".len()]
    } else if lower.ends_with(".tgz") {
        &name[..name.len() - ".tgz".len()]
    } else {
        name.as_str()
    };
    let stem = if stem.is_empty() { "extracted" } else { stem };
    tarball_path.with_file_name(stem)
}

/// Extract a tarball to a directory, replacing any previous extraction.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or unpacked.
pub fn extract_tarball(tarball_path: &Path, dest_dir: &Path) -> io::Result<()> {
    use flate2::read::GzDecoder;

    if dest_dir.exists() {
        fs::remove_dir_all(dest_dir)?;
    }
    fs::create_dir_all(dest_dir)?;

    let file = File::open(tarball_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest_dir)
}
