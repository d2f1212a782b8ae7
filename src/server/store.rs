//! # Content Store
//!
//! Filesystem persistence for uploaded photos. The store owns one flat
//! directory; every accepted upload gets a server-generated name of the form
//! `<epoch-millis>-<random>.<ext>`, so client-chosen names never reach the
//! filesystem. Only the extension is borrowed from the client, and it is
//! sanitized down to lowercase alphanumerics first.

use chrono::Utc;
use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content directory is not usable: {0}")]
    Setup(std::io::Error),
    #[error("could not persist photo: {0}")]
    Write(std::io::Error),
}

/// A photo accepted into the store.
#[derive(Debug, Clone)]
pub struct StoredPhoto {
    /// Server-generated filename inside the content directory
    pub file_name: String,
    /// Server-relative URL the photo is served under
    pub url: String,
}

/// Flat-directory photo store.
pub struct ContentStore {
    root: PathBuf,
    public_prefix: String,
}

impl ContentStore {
    /// Creates a store rooted at `root`, serving files under `public_prefix`.
    /// The directory is created if missing.
    pub async fn new(
        root: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(StoreError::Setup)?;
        Ok(ContentStore {
            root,
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Persist one photo under a fresh server-generated name.
    ///
    /// `client_filename` is only consulted for the extension; the rest of the
    /// name is epoch milliseconds plus a random integer, which keeps
    /// concurrent uploads from colliding without any coordination.
    pub async fn save(
        &self,
        client_filename: Option<&str>,
        data: &[u8],
    ) -> Result<StoredPhoto, StoreError> {
        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>(),
            safe_extension(client_filename)
        );
        let path = self.root.join(&file_name);

        let mut file = fs::File::create(&path).await.map_err(StoreError::Write)?;
        file.write_all(data).await.map_err(StoreError::Write)?;
        file.sync_all().await.map_err(StoreError::Write)?;

        info!("💾 Stored {} ({} bytes)", file_name, data.len());
        Ok(StoredPhoto {
            url: format!("{}/{}", self.public_prefix, file_name),
            file_name,
        })
    }

    /// List every stored photo as a server-relative URL, sorted by name.
    ///
    /// Any enumeration problem degrades to an empty listing; the photo files
    /// themselves are the source of truth and a listing hiccup must not turn
    /// into a client-visible error.
    pub async fn list(&self) -> Vec<String> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    "Could not read content directory {}: {}",
                    self.root.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut urls = Vec::new();
        loop {
            match dir.next_entry().await {
                Ok(Some(entry)) => {
                    let is_file = entry
                        .file_type()
                        .await
                        .map(|t| t.is_file())
                        .unwrap_or(false);
                    if !is_file {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str() {
                        urls.push(format!("{}/{}", self.public_prefix, name));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Could not read content directory {}: {}",
                        self.root.display(),
                        e
                    );
                    return Vec::new();
                }
            }
        }
        urls.sort();
        urls
    }
}

/// Extract a safe extension from an untrusted client filename.
///
/// Keeps lowercase alphanumerics only, capped at 8 characters; anything
/// unusable falls back to `jpg`. The result is always a single clean path
/// segment fragment.
fn safe_extension(client_filename: Option<&str>) -> String {
    const FALLBACK: &str = "jpg";

    let Some(name) = client_filename else {
        return FALLBACK.to_string();
    };
    let Some((_, raw)) = name.rsplit_once('.') else {
        return FALLBACK.to_string();
    };
    let ext: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        FALLBACK.to_string()
    } else {
        ext
    }
}
