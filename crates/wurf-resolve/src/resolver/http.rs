//! Dependencies fetched as single files or tarballs.

use crate::download::{
    extract_tarball, extraction_dir, file_checksum, file_name_from_url, is_tarball, Download,
    DownloadError,
};
use crate::error::SourceError;
use crate::fingerprint::short_hash;
use crate::manifest::DependencyRequest;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Downloads a source into `<name>-http-<hash>`.
#[derive(Clone, Copy)]
pub struct HttpResolver<'a> {
    downloader: &'a dyn Download,
}

impl<'a> HttpResolver<'a> {
    #[must_use]
    pub fn new(downloader: &'a dyn Download) -> Self {
        Self { downloader }
    }

    /// Download `source` of `request` below `cwd`.
    ///
    /// A previously downloaded file is reused unless it fails the declared
    /// checksum. With `extract` set, a tarball is unpacked next to it and the
    /// unpacked folder is returned; otherwise the file path is. A reused
    /// tarball is only unpacked again if its folder is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails, the checksum does not match,
    /// or the archive cannot be unpacked.
    pub fn resolve(
        &self,
        request: &DependencyRequest,
        cwd: &Path,
        source: &str,
    ) -> Result<PathBuf, SourceError> {
        let name = &request.name;
        let folder = cwd.join(format!("{name}-http-{}", short_hash(source)));
        fs::create_dir_all(&folder)?;

        let file_name = match request.filename.clone() {
            Some(file_name) => file_name,
            None => file_name_from_url(source)
                .ok_or_else(|| DownloadError::InvalidUrl(source.to_string()))?,
        };
        let existing = folder.join(&file_name);

        let reused = existing.is_file() && verify_checksum(request, &existing).is_ok();
        let file_path = if reused {
            debug!(name, path = %existing.display(), "reusing download");
            existing
        } else {
            info!(name, url = source, "downloading");
            let path = self
                .downloader
                .download(&folder, source, Some(&file_name))?;
            verify_checksum(request, &path)?;
            path
        };

        if request.extract && is_tarball(&file_path) {
            let dest = extraction_dir(&file_path);
            if reused && dest.is_dir() {
                debug!(name, path = %dest.display(), "reusing extracted archive");
            } else {
                debug!(name, path = %dest.display(), "extracting");
                extract_tarball(&file_path, &dest)?;
            }
            return Ok(dest);
        }

        Ok(file_path)
    }
}

fn verify_checksum(request: &DependencyRequest, path: &Path) -> Result<(), SourceError> {
    let Some(ref expected) = request.sha256 else {
        return Ok(());
    };
    let actual = file_checksum(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(SourceError::ChecksumMismatch {
            file: path.to_path_buf(),
            expected: expected.clone(),
            actual,
        })
    }
}

impl std::fmt::Debug for HttpResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::sha256_hex;
    use crate::testutil::FakeDownload;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    const URL: &str = "https://files.example.com/dist/data.bin";

    fn tarball() -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let content = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg/hello.txt", &content[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_download_into_hashed_folder() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownload::new();
        downloader.serve(URL, "payload");
        let request = DependencyRequest::http("data", [URL]);

        let path = HttpResolver::new(&downloader)
            .resolve(&request, dir.path(), URL)
            .unwrap();
        let folder = dir.path().join(format!("data-http-{}", short_hash(URL)));
        assert_eq!(path, folder.join("data.bin"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "payload");
    }

    #[test]
    fn test_existing_download_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownload::new();
        downloader.serve(URL, "payload");
        let request = DependencyRequest::http("data", [URL]);
        let resolver = HttpResolver::new(&downloader);

        resolver.resolve(&request, dir.path(), URL).unwrap();
        resolver.resolve(&request, dir.path(), URL).unwrap();
        assert_eq!(downloader.downloads().len(), 1);
    }

    #[test]
    fn test_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownload::new();
        downloader.serve(URL, "tampered");
        let mut request = DependencyRequest::http("data", [URL]);
        request.sha256 = Some(sha256_hex(b"payload"));

        let err = HttpResolver::new(&downloader)
            .resolve(&request, dir.path(), URL)
            .unwrap_err();
        assert!(matches!(err, SourceError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_stale_file_is_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownload::new();
        downloader.serve(URL, "payload");
        let mut request = DependencyRequest::http("data", [URL]);
        request.sha256 = Some(sha256_hex(b"payload"));

        let folder = dir.path().join(format!("data-http-{}", short_hash(URL)));
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("data.bin"), "old").unwrap();

        let path = HttpResolver::new(&downloader)
            .resolve(&request, dir.path(), URL)
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "payload");
        assert_eq!(downloader.downloads(), [URL]);
    }

    #[test]
    fn test_extract_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://files.example.com/pkg-1.0.tar.gz";
        let downloader = FakeDownload::new();
        downloader.serve(url, tarball());
        let mut request = DependencyRequest::http("pkg", [url]);
        request.extract = true;

        let path = HttpResolver::new(&downloader)
            .resolve(&request, dir.path(), url)
            .unwrap();
        assert!(path.ends_with("pkg-1.0"));
        assert_eq!(
            fs::read_to_string(path.join("pkg/hello.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_reused_tarball_is_not_extracted_again() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://files.example.com/pkg-1.0.tar.gz";
        let downloader = FakeDownload::new();
        downloader.serve(url, tarball());
        let mut request = DependencyRequest::http("pkg", [url]);
        request.extract = true;
        let resolver = HttpResolver::new(&downloader);

        let path = resolver.resolve(&request, dir.path(), url).unwrap();
        fs::write(path.join("configured.txt"), "local").unwrap();

        let again = resolver.resolve(&request, dir.path(), url).unwrap();
        assert_eq!(again, path);
        assert!(again.join("configured.txt").is_file());
        assert_eq!(downloader.downloads().len(), 1);

        fs::remove_dir_all(&path).unwrap();
        resolver.resolve(&request, dir.path(), url).unwrap();
        assert!(path.join("pkg/hello.txt").is_file());
        assert_eq!(downloader.downloads().len(), 1);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownload::new();
        let request = DependencyRequest::http("data", [URL]);
        let err = HttpResolver::new(&downloader)
            .resolve(&request, dir.path(), URL)
            .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Download(DownloadError::Status { status: 404, .. })
        ));
    }
}
