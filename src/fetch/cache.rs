//! On-disk response cache.
//!
//! One file per requested URL, named by the hex-encoded SHA-256 of the URL,
//! holding the raw response body. Entries never expire; they go away only
//! when deleted explicitly, which makes reruns deterministic and light on the
//! network until the cache is cleared.
//!
//! Writes go to a uniquely named temporary file in the same directory and are
//! then renamed over the final path, so a concurrent reader never sees a torn
//! body.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, instrument};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable cache key for a URL.
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.html", Self::key(url)))
    }

    /// Cached body for `url`, if present. Invalid UTF-8 is replaced.
    pub async fn read(&self, url: &str) -> Option<String> {
        match fs::read(self.path_for(url)).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => None,
        }
    }

    /// Store `body` for `url` atomically.
    #[instrument(level = "debug", skip(self, body), fields(bytes = body.len()))]
    pub async fn write(&self, url: &str, body: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let target = self.path_for(url);
        let tmp = self.dir.join(format!(
            "{}.{}.{}.tmp",
            Self::key(url),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, body).await?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        debug!(path = %target.display(), "Cached response");
        Ok(())
    }

    /// Delete the entry for `url`. Returns whether an entry existed.
    pub async fn remove(&self, url: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_for(url)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete every cached entry. Returns how many were removed.
    pub async fn clear(&self) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "html") {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
