use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the archive pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote site settings
    pub source: SourceConfig,

    /// Local cache and output locations
    pub paths: PathsConfig,

    /// High-resolution master library settings
    pub masters: MastersConfig,

    /// External media tools
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL of the index page listing every chapter
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Optional HTTP request timeout in seconds (none by default)
    pub request_timeout_seconds: Option<u64>,

    /// Extension of the legacy low-resolution animation sources
    pub raw_image_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the page, raw binary and dimension caches
    pub cache_dir: PathBuf,

    /// Root of the generated content consumed by the viewer
    pub content_dir: PathBuf,

    /// Subdirectory of `content_dir` holding `<basename>.mp4` files
    pub video_subdir: String,

    /// Manifest filename inside `content_dir`
    pub manifest_filename: String,

    /// Directory of high-resolution masters; used only when it exists
    pub masters_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MastersConfig {
    /// Extension of master files, without the dot
    pub extension: String,

    /// Only subdirectories starting with this prefix are scanned
    pub subdir_prefix: Option<String>,

    /// Output height when downsampling masters
    pub downsample_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://apocalypseanimated.com/".to_string(),
            user_agent: concat!("animated-archive/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_seconds: None,
            raw_image_extension: "gif".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            content_dir: PathBuf::from("content"),
            video_subdir: "video".to_string(),
            manifest_filename: "chapters.json".to_string(),
            masters_dir: Some(PathBuf::from("4k")),
        }
    }
}

impl Default for MastersConfig {
    fn default() -> Self {
        Self {
            extension: "mov".to_string(),
            subdir_prefix: Some("Rev".to_string()),
            downsample_height: 720,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            paths: PathsConfig::default(),
            masters: MastersConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl PathsConfig {
    pub fn pages_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("pages")
    }

    pub fn raw_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("raw")
    }

    pub fn dimensions_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("dimensions")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.content_dir.join(&self.video_subdir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.content_dir.join(&self.manifest_filename)
    }

    /// The masters directory, if one is configured and present on disk
    pub fn available_masters_dir(&self) -> Option<&Path> {
        self.masters_dir.as_deref().filter(|dir| dir.is_dir())
    }
}

impl Config {
    /// Load configuration from the first readable default location,
    /// falling back to defaults plus environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = ["animated-archive.toml", "config/animated-archive.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&config_str)
            .map_err(|e| ArchiveError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by `ANIMATED_ARCHIVE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("ANIMATED_ARCHIVE_BASE_URL") {
            config.source.base_url = base_url;
        }

        if let Ok(cache_dir) = std::env::var("ANIMATED_ARCHIVE_CACHE_DIR") {
            config.paths.cache_dir = PathBuf::from(cache_dir);
        }

        if let Ok(content_dir) = std::env::var("ANIMATED_ARCHIVE_CONTENT_DIR") {
            config.paths.content_dir = PathBuf::from(content_dir);
        }

        if let Ok(masters_dir) = std::env::var("ANIMATED_ARCHIVE_MASTERS_DIR") {
            config.paths.masters_dir = if masters_dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(masters_dir))
            };
        }

        if let Ok(height) = std::env::var("ANIMATED_ARCHIVE_DOWNSAMPLE_HEIGHT") {
            config.masters.downsample_height = height
                .parse()
                .map_err(|_| ArchiveError::Config(format!("invalid downsample height: {}", height)))?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ArchiveError::Config(e.to_string()))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.base_url)?;

        if self.masters.downsample_height == 0 {
            return Err(ArchiveError::Config("downsample_height must be greater than 0".to_string()));
        }

        if self.tools.ffmpeg.trim().is_empty() || self.tools.ffprobe.trim().is_empty() {
            return Err(ArchiveError::Config("ffmpeg and ffprobe program names must not be empty".to_string()));
        }

        if self.source.raw_image_extension.trim().is_empty() {
            return Err(ArchiveError::Config("raw_image_extension must not be empty".to_string()));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Animated Archive Configuration:\n\
            - Index URL: {}\n\
            - Cache Directory: {}\n\
            - Content Directory: {}\n\
            - Masters Directory: {}\n\
            - Downsample Height: {}",
            self.source.base_url,
            self.paths.cache_dir.display(),
            self.paths.content_dir.display(),
            self.paths
                .masters_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.masters.downsample_height,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.source.base_url = base_url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.paths.cache_dir = dir;
        self
    }

    pub fn with_content_dir(mut self, dir: PathBuf) -> Self {
        self.config.paths.content_dir = dir;
        self
    }

    pub fn with_masters_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.paths.masters_dir = dir;
        self
    }

    pub fn with_masters_subdir_prefix(mut self, prefix: Option<String>) -> Self {
        self.config.masters.subdir_prefix = prefix;
        self
    }

    pub fn with_downsample_height(mut self, height: u32) -> Self {
        self.config.masters.downsample_height = height;
        self
    }

    pub fn with_request_timeout(mut self, seconds: Option<u64>) -> Self {
        self.config.source.request_timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
