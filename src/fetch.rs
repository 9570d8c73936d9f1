/// Write-once cache of remote pages and binaries
///
/// Every entry is keyed by a logical name relative to the cache directory.
/// An existing entry is always trusted, so each key costs at most one network
/// round-trip for the lifetime of the cache directory.
use crate::error::{ArchiveError, Result};
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Suffix of in-flight downloads; never treated as an entry
const PARTIAL_SUFFIX: &str = "part";

/// Durable, idempotent retrieval of remote content
pub struct FetchCache {
    client: Client,
    cache_dir: PathBuf,
    network_fetches: AtomicUsize,
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Build the HTTP client shared by every cache area
pub fn build_client(user_agent: &str, timeout_seconds: Option<u64>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(seconds) = timeout_seconds {
        builder = builder.timeout(Duration::from_secs(seconds));
    }
    builder.build().map_err(|e| ArchiveError::Config(format!("cannot build HTTP client: {}", e)))
}

impl FetchCache {
    /// Create a cache rooted at `cache_dir`; the directory is created lazily
    pub fn new(client: Client, cache_dir: PathBuf) -> Self {
        Self {
            client,
            cache_dir,
            network_fetches: AtomicUsize::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Number of network round-trips performed by this instance
    pub fn network_fetches(&self) -> usize {
        self.network_fetches.load(Ordering::Relaxed)
    }

    /// Absolute location of the entry for `cache_key`
    pub fn entry_path(&self, cache_key: &str) -> Result<PathBuf> {
        let key = Path::new(cache_key);
        let is_plain = !cache_key.is_empty()
            && key.components().all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(ArchiveError::Structural(format!("invalid cache key \"{}\"", cache_key)));
        }
        Ok(self.cache_dir.join(key))
    }

    pub fn contains(&self, cache_key: &str) -> bool {
        self.entry_path(cache_key).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Return the cached payload for `cache_key`, fetching `url` only on a miss
    pub async fn fetch_cached(&self, url: &str, cache_key: &str) -> Result<Vec<u8>> {
        let path = self.ensure_entry(url, cache_key).await?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Text variant of [`FetchCache::fetch_cached`]
    pub async fn fetch_text(&self, url: &str, cache_key: &str) -> Result<String> {
        let bytes = self.fetch_cached(url, cache_key).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Ensure the entry exists on disk and return its path without reading it
    pub async fn ensure_entry(&self, url: &str, cache_key: &str) -> Result<PathBuf> {
        let path = self.entry_path(cache_key)?;

        if path.is_file() {
            info!("📚 Using cached content of {} at {}", url, cache_key);
            return Ok(path);
        }

        info!("🌐 Retrieving {} and caching it at {}", url, cache_key);
        let payload = self.download(url).await?;
        self.persist(&path, &payload).await?;
        Ok(path)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);

        let response = self.client.get(url).send().await.map_err(|source| ArchiveError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| ArchiveError::Http {
            url: url.to_string(),
            source,
        })?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    /// Write through a sibling partial file so a crash never leaves a truncated entry
    async fn persist(&self, path: &Path, payload: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(path);
        tokio::fs::write(&partial, payload).await?;
        tokio::fs::rename(&partial, path).await?;
        Ok(())
    }

    /// Count entries and bytes currently held
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.entries() {
            stats.total_files += 1;
            stats.total_bytes += std::fs::metadata(&path)?.len();
        }
        Ok(stats)
    }

    /// Force invalidate a single entry
    pub async fn invalidate(&self, cache_key: &str) -> Result<bool> {
        let path = self.entry_path(cache_key)?;
        if path.is_file() {
            tokio::fs::remove_file(&path).await?;
            info!("🗑️ Invalidated cache entry: {}", cache_key);
            Ok(true)
        } else {
            debug!("Cache entry not found: {}", cache_key);
            Ok(false)
        }
    }

    /// Remove every entry, including abandoned partial downloads
    pub async fn clear(&self) -> Result<usize> {
        let mut cleared_count = 0;
        for path in self.all_files() {
            tokio::fs::remove_file(&path).await?;
            cleared_count += 1;
            debug!("🗑️ Removed cache file: {}", path.display());
        }

        if cleared_count > 0 {
            info!("🧹 Cleared {} files from {}", cleared_count, self.cache_dir.display());
        }
        Ok(cleared_count)
    }

    fn entries(&self) -> Vec<PathBuf> {
        self.all_files()
            .into_iter()
            .filter(|path| path.extension().map_or(true, |ext| ext != PARTIAL_SUFFIX))
            .collect()
    }

    fn all_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.cache_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
