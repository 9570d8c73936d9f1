/// Probed video dimensions with an mtime-checked sidecar cache
use super::executor::{display_command, CommandExecutor};
use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

const SIDECAR_SUFFIX: &str = ".dimensions.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Caches ffprobe readings per mp4 filename.
///
/// A sidecar is trusted only while it is at least as new as its video, so
/// re-encoding a video invalidates the stale reading.
pub struct DimensionCache {
    executor: Arc<dyn CommandExecutor>,
    ffprobe: String,
    cache_dir: PathBuf,
    probes: AtomicUsize,
}

impl DimensionCache {
    pub fn new(executor: Arc<dyn CommandExecutor>, ffprobe: String, cache_dir: PathBuf) -> Self {
        Self {
            executor,
            ffprobe,
            cache_dir,
            probes: AtomicUsize::new(0),
        }
    }

    /// Number of probe processes run by this instance
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }

    /// Sidecar location for a video, keyed by its file name
    pub fn sidecar_path(&self, mp4_path: &Path) -> Result<PathBuf> {
        let name = mp4_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ArchiveError::Probe {
                path: mp4_path.to_path_buf(),
                reason: "path has no file name".to_string(),
            })?;
        Ok(self.cache_dir.join(format!("{}{}", name, SIDECAR_SUFFIX)))
    }

    pub async fn get_dimensions(&self, mp4_path: &Path) -> Result<Dimensions> {
        let sidecar = self.sidecar_path(mp4_path)?;

        if let Some(dimensions) = self.load_valid(&sidecar, mp4_path).await? {
            debug!("Using cached dimensions for {}", mp4_path.display());
            return Ok(dimensions);
        }

        let dimensions = self.probe(mp4_path).await?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(&sidecar, serde_json::to_string(&dimensions)?).await?;
        Ok(dimensions)
    }

    async fn load_valid(&self, sidecar: &Path, mp4_path: &Path) -> Result<Option<Dimensions>> {
        let sidecar_modified = match modified(sidecar).await {
            Some(time) => time,
            None => return Ok(None),
        };
        let video_modified = tokio::fs::metadata(mp4_path).await?.modified()?;
        if sidecar_modified < video_modified {
            debug!("Dimension sidecar for {} is stale", mp4_path.display());
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(sidecar).await?;
        match serde_json::from_str(&content) {
            Ok(dimensions) => Ok(Some(dimensions)),
            Err(e) => {
                debug!("Ignoring unreadable sidecar {}: {}", sidecar.display(), e);
                Ok(None)
            }
        }
    }

    async fn probe(&self, mp4_path: &Path) -> Result<Dimensions> {
        let args = probe_args(mp4_path);
        info!("📐 Getting dimensions of {}", mp4_path.display());
        self.probes.fetch_add(1, Ordering::Relaxed);

        let output = self.executor.run(&self.ffprobe, &args).await?;
        if !output.success {
            return Err(ArchiveError::Probe {
                path: mp4_path.to_path_buf(),
                reason: format!(
                    "{} ({}): {}",
                    display_command(&self.ffprobe, &args),
                    output.status_description(),
                    output.stderr_lossy()
                ),
            });
        }

        parse_probe_output(&output.stdout).map_err(|reason| ArchiveError::Probe {
            path: mp4_path.to_path_buf(),
            reason,
        })
    }

    /// Remove every sidecar
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut cleared_count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.to_string_lossy().ends_with(SIDECAR_SUFFIX) {
                tokio::fs::remove_file(&path).await?;
                cleared_count += 1;
            }
        }

        if cleared_count > 0 {
            info!("🧹 Cleared {} dimension sidecars", cleared_count);
        }
        Ok(cleared_count)
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn probe_args(mp4_path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "json".to_string(),
        mp4_path.to_string_lossy().into_owned(),
    ]
}

/// First video stream's width and height from ffprobe JSON output
fn parse_probe_output(stdout: &[u8]) -> std::result::Result<Dimensions, String> {
    let parsed: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable probe output: {}", e))?;
    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| "no video stream found".to_string())?;
    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Dimensions { width, height }),
        _ => Err("video stream has no width/height".to_string()),
    }
}
