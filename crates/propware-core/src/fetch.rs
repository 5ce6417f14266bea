//! Downloading and unpacking pinned tool archives
//!
//! Archives are cached by file name in the download directory, so a second
//! run reuses the previous download. Extraction recognizes gzip'd tarballs,
//! plain tarballs and zip files by their magic bytes.

use crate::error::Error;
use crate::runtime::PinnedArchive;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;
use zip::ZipArchive;

/// Somewhere archives can be fetched from
#[allow(async_fn_in_trait)]
pub trait ArchiveSource {
    /// Make `archive` available under `cache_dir`, returning the local path
    async fn fetch(&self, archive: &PinnedArchive, cache_dir: &Path) -> Result<PathBuf>;
}

/// HTTP downloader
pub struct ArchiveFetcher {
    client: reqwest::Client,
}

impl ArchiveFetcher {
    /// Create a new fetcher with a custom user agent
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl ArchiveSource for ArchiveFetcher {
    async fn fetch(&self, archive: &PinnedArchive, cache_dir: &Path) -> Result<PathBuf> {
        let dst = cache_dir.join(archive.file_name());

        // Don't re-download
        if tokio::fs::try_exists(&dst).await.unwrap_or(false) {
            return Ok(dst);
        }

        let url = Url::parse(&archive.url)
            .with_context(|| format!("Invalid download URL: {}", archive.url))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download {}: HTTP {}", url, response.status());
        }

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(cache_dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", cache_dir.display()))?;
        let partial = dst.with_extension("part");
        tokio::fs::write(&partial, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &dst)
            .await
            .with_context(|| format!("Failed to write {}", dst.display()))?;

        Ok(dst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Tar,
    Zip,
}

fn sniff(path: &Path) -> Result<Option<ArchiveKind>> {
    let mut header = Vec::with_capacity(512);
    File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .take(512)
        .read_to_end(&mut header)?;

    let kind = if header.starts_with(&[0x1f, 0x8b]) {
        Some(ArchiveKind::TarGz)
    } else if header.starts_with(b"PK\x03\x04") {
        Some(ArchiveKind::Zip)
    } else if header.len() >= 262 && &header[257..262] == b"ustar" {
        Some(ArchiveKind::Tar)
    } else {
        None
    };
    Ok(kind)
}

/// Unpack a tarball or zip into `dst`
pub fn extract(archive: &Path, dst: &Path) -> Result<()> {
    let kind = sniff(archive)?.ok_or_else(|| Error::UnrecognizedArchive(archive.to_path_buf()))?;

    std::fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    let file = File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    let unpacked = match kind {
        ArchiveKind::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(dst),
        ArchiveKind::Tar => tar::Archive::new(file).unpack(dst),
        ArchiveKind::Zip => {
            let mut zip = ZipArchive::new(file)
                .with_context(|| format!("Failed to read zip archive {}", archive.display()))?;
            return zip
                .extract(dst)
                .with_context(|| format!("Failed to extract {}", archive.display()));
        }
    };
    unpacked.with_context(|| format!("Failed to extract {}", archive.display()))
}
