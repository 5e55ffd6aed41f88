//! Optional corpus acquisition: populate the category folders from a remote
//! directory listing when the input directory is absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::CorpusConfig;
use crate::dataset::discover::ExtensionPriority;
use crate::http_client::{self, RetryConfig};

const MAX_LISTING_BYTES: usize = 4 * 1024 * 1024;
const MAX_FILE_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },
    #[error("Invalid listing from {url}: {reason}")]
    Listing { url: String, reason: String },
    #[error("Invalid remote URL {url}: {source}")]
    Url {
        url: String,
        source: url::ParseError,
    },
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One item of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Listing URL of this entry (directories are listed through it).
    pub url: String,
    pub download_url: Option<String>,
}

/// Remote directory listing service.
pub trait RemoteListing {
    fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, CorpusError>;
    fn download(&self, url: &str, writer: &mut dyn Write) -> Result<u64, CorpusError>;
}

/// GitHub repository contents API over the shared HTTP agent.
#[derive(Debug, Clone, Default)]
pub struct GithubContents {
    retry: RetryConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Entries(Vec<RemoteEntry>),
    Message { message: String },
}

impl RemoteListing for GithubContents {
    fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, CorpusError> {
        let http_err = |reason: String| CorpusError::Http {
            url: url.to_string(),
            reason,
        };
        let response = http_client::get_with_retry(url, self.retry).map_err(|err| http_err(err.to_string()))?;
        let bytes = http_client::read_response_bytes(response, MAX_LISTING_BYTES)
            .map_err(|err| http_err(err.to_string()))?;
        match serde_json::from_slice::<ListingBody>(&bytes) {
            Ok(ListingBody::Entries(entries)) => Ok(entries),
            Ok(ListingBody::Message { message }) => Err(CorpusError::Listing {
                url: url.to_string(),
                reason: message,
            }),
            Err(err) => Err(CorpusError::Listing {
                url: url.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    fn download(&self, url: &str, writer: &mut dyn Write) -> Result<u64, CorpusError> {
        let http_err = |reason: String| CorpusError::Http {
            url: url.to_string(),
            reason,
        };
        let response = http_client::get_with_retry(url, self.retry).map_err(|err| http_err(err.to_string()))?;
        http_client::copy_response_to_writer(response, writer, MAX_FILE_BYTES)
            .map_err(|err| http_err(err.to_string()))
    }
}

/// Outcome of [`ensure_corpus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusSummary {
    /// `dest` already existed, nothing was fetched.
    pub already_present: bool,
    pub downloaded: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Populate `dest/<category>/` from every configured remote folder.
///
/// Does nothing when `dest` exists. Remote subfolders are walked recursively and
/// their files land directly in the category folder, since categories are scanned
/// one level deep. Only files with a supported extension that are not present
/// locally are fetched. Listing and download failures are logged and skipped.
pub fn ensure_corpus(
    listing: &dyn RemoteListing,
    config: &CorpusConfig,
    priority: &ExtensionPriority,
    dest: &Path,
) -> Result<CorpusSummary, CorpusError> {
    let mut summary = CorpusSummary::default();
    if dest.exists() {
        info!("Audio folder {} already exists, skipping download", dest.display());
        summary.already_present = true;
        return Ok(summary);
    }
    info!("Fetching audio corpus into {}", dest.display());
    create_dir(dest)?;
    for folder in &config.folders {
        let url = folder_url(config, &folder.remote)?;
        let local = dest.join(&folder.category);
        create_dir(&local)?;
        info!("Fetching {} into {}", folder.remote, local.display());
        fetch_dir(listing, url.as_str(), &local, priority, &mut summary)?;
    }
    info!(
        "Corpus fetch finished: {} downloaded, {} already present, {} failed",
        summary.downloaded, summary.existing, summary.failed
    );
    Ok(summary)
}

fn folder_url(config: &CorpusConfig, remote: &str) -> Result<Url, CorpusError> {
    let mut url = Url::parse(&config.api_url).map_err(|source| CorpusError::Url {
        url: config.api_url.clone(),
        source,
    })?;
    {
        let Ok(mut segments) = url.path_segments_mut() else {
            return Err(CorpusError::Url {
                url: config.api_url.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        };
        segments.pop_if_empty();
        segments.extend(remote.split('/').filter(|s| !s.is_empty()));
    }
    if let Some(reference) = &config.reference {
        url.query_pairs_mut().append_pair("ref", reference);
    }
    Ok(url)
}

fn fetch_dir(
    listing: &dyn RemoteListing,
    url: &str,
    local: &Path,
    priority: &ExtensionPriority,
    summary: &mut CorpusSummary,
) -> Result<(), CorpusError> {
    let entries = match listing.list(url) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Skipping remote folder: {err}");
            summary.failed += 1;
            return Ok(());
        }
    };
    for entry in entries {
        match entry.kind {
            EntryKind::File if priority.is_supported(Path::new(&entry.name)) => {
                fetch_file(listing, &entry, local, summary)?;
            }
            EntryKind::Dir => fetch_dir(listing, &entry.url, local, priority, summary)?,
            _ => {}
        }
    }
    Ok(())
}

fn fetch_file(
    listing: &dyn RemoteListing,
    entry: &RemoteEntry,
    local: &Path,
    summary: &mut CorpusSummary,
) -> Result<(), CorpusError> {
    let target = local.join(&entry.name);
    if target.exists() {
        summary.existing += 1;
        return Ok(());
    }
    let Some(download_url) = entry.download_url.as_deref() else {
        warn!("No download URL for {}", entry.name);
        summary.failed += 1;
        return Ok(());
    };
    let partial = local.join(format!("{}.part", entry.name));
    let mut file = fs::File::create(&partial).map_err(|source| CorpusError::Io {
        path: partial.clone(),
        source,
    })?;
    let result = listing.download(download_url, &mut file);
    drop(file);
    match result {
        Ok(_) => {
            fs::rename(&partial, &target).map_err(|source| CorpusError::Io {
                path: target.clone(),
                source,
            })?;
            summary.downloaded += 1;
        }
        Err(err) => {
            warn!("Failed to download {}: {err}", entry.name);
            let _ = fs::remove_file(&partial);
            summary.failed += 1;
        }
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), CorpusError> {
    fs::create_dir_all(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}
