/// Idempotent production of normalized mp4 files
///
/// An existing `<stem>.mp4` is never rebuilt. Otherwise the video is derived
/// either from a high-resolution master (downsampled to a fixed height) or from
/// the legacy low-resolution animation fetched through the raw cache (scaled
/// down to even dimensions).
use super::assets::AssetResolver;
use super::executor::{display_command, CommandExecutor};
use crate::error::{ArchiveError, Result};
use crate::fetch::FetchCache;
use crate::scrape::AnimationSource;
use crate::warning::Warning;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Filter rounding both dimensions down to the nearest even integer
const EVEN_DIMENSIONS_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Where a new mp4 is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Master(PathBuf),
    Legacy(PathBuf),
}

/// Result of [`Transcoder::ensure_mp4`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub mp4_path: PathBuf,
    /// False when the mp4 already existed
    pub converted: bool,
    pub warnings: Vec<Warning>,
}

pub struct Transcoder {
    executor: Arc<dyn CommandExecutor>,
    ffmpeg: String,
    video_dir: PathBuf,
    downsample_height: u32,
    masters: Option<AssetResolver>,
    transcodes: usize,
}

impl Transcoder {
    /// `masters` selects the master pipeline; `None` means legacy sources only
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        ffmpeg: String,
        video_dir: PathBuf,
        downsample_height: u32,
        masters: Option<AssetResolver>,
    ) -> Self {
        Self {
            executor,
            ffmpeg,
            video_dir,
            downsample_height,
            masters,
            transcodes: 0,
        }
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    /// Number of conversions run by this instance
    pub fn transcodes(&self) -> usize {
        self.transcodes
    }

    pub fn mp4_path(&self, stem: &str) -> PathBuf {
        self.video_dir.join(format!("{}.mp4", stem))
    }

    pub async fn ensure_mp4(&mut self, source: &AnimationSource, raw_cache: &FetchCache) -> Result<Transcoded> {
        let mp4_path = self.mp4_path(&source.stem);
        if mp4_path.is_file() {
            debug!("{} already exists", mp4_path.display());
            return Ok(Transcoded {
                mp4_path,
                converted: false,
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();
        let input = match self.masters.as_mut() {
            Some(resolver) => {
                let resolution = resolver.resolve(&source.stem)?;
                warnings.extend(resolution.fallback);
                SourceKind::Master(resolution.path)
            }
            None => {
                let raw_path = raw_cache.ensure_entry(source.url.as_str(), &source.filename).await?;
                SourceKind::Legacy(raw_path)
            }
        };

        self.convert(&source.stem, &input, &mp4_path).await?;
        Ok(Transcoded {
            mp4_path,
            converted: true,
            warnings,
        })
    }

    /// Run ffmpeg into a partial file and move it into place on success
    async fn convert(&mut self, stem: &str, input: &SourceKind, mp4_path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.video_dir).await?;
        let partial = self.video_dir.join(format!("{}.partial.mp4", stem));
        let args = ffmpeg_args(input, &partial, self.downsample_height);
        let command = display_command(&self.ffmpeg, &args);

        let input_path = match input {
            SourceKind::Master(path) | SourceKind::Legacy(path) => path,
        };
        info!("🎬 Converting {} -> {}", input_path.display(), mp4_path.display());
        self.transcodes += 1;

        let output = self.executor.run(&self.ffmpeg, &args).await?;
        if !output.success {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(ArchiveError::Transcode {
                stem: stem.to_string(),
                command,
                status: output.status_description(),
            });
        }
        if !partial.is_file() {
            return Err(ArchiveError::Transcode {
                stem: stem.to_string(),
                command,
                status: "no output file produced".to_string(),
            });
        }

        tokio::fs::rename(&partial, mp4_path).await?;
        Ok(())
    }
}

/// ffmpeg arguments for each source kind; both normalize pixel format and
/// move the index to the front for streaming
pub fn ffmpeg_args(input: &SourceKind, output: &Path, downsample_height: u32) -> Vec<String> {
    let (input_path, filter) = match input {
        SourceKind::Master(path) => (path, format!("scale=-2:{}", downsample_height)),
        SourceKind::Legacy(path) => (path, EVEN_DIMENSIONS_FILTER.to_string()),
    };

    vec![
        "-y".to_string(),
        "-i".to_string(),
        input_path.to_string_lossy().into_owned(),
        "-movflags".to_string(),
        "faststart".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-vf".to_string(),
        filter,
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::assets::AssetLibrary;
    use crate::media::executor::{CommandOutput, MockCommandExecutor};
    use reqwest::Client;
    use tempfile::TempDir;
    use url::Url;

    fn source(stem: &str) -> AnimationSource {
        AnimationSource {
            stem: stem.to_string(),
            // Nothing listens on the discard port
            url: Url::parse(&format!("http://127.0.0.1:9/media/{}.gif", stem)).unwrap(),
            filename: format!("{}.gif", stem),
            declared_width: 400,
            declared_height: 300,
        }
    }

    /// Executor that behaves like a successful ffmpeg by writing the output file
    fn writing_executor(expected_calls: usize, expected_filter: &'static str) -> MockCommandExecutor {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(move |program, args| program == "ffmpeg" && args.iter().any(|a| a == expected_filter))
            .times(expected_calls)
            .returning(|_, args| {
                std::fs::write(args.last().unwrap(), b"mp4").unwrap();
                Ok(CommandOutput::success(Vec::new()))
            });
        executor
    }

    #[tokio::test]
    async fn test_existing_mp4_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let video_dir = temp_dir.path().join("video");
        std::fs::create_dir_all(&video_dir).unwrap();
        std::fs::write(video_dir.join("seal1.mp4"), b"done").unwrap();
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().times(0);
        let raw = FetchCache::new(Client::new(), temp_dir.path().join("raw"));
        let mut transcoder = Transcoder::new(Arc::new(executor), "ffmpeg".to_string(), video_dir.clone(), 720, None);

        let result = transcoder.ensure_mp4(&source("seal1"), &raw).await.unwrap();

        assert!(!result.converted);
        assert_eq!(result.mp4_path, video_dir.join("seal1.mp4"));
        assert_eq!(transcoder.transcodes(), 0);
        assert_eq!(raw.network_fetches(), 0);
    }

    #[tokio::test]
    async fn test_legacy_source_uses_even_dimension_filter() {
        let temp_dir = TempDir::new().unwrap();
        let raw_dir = temp_dir.path().join("raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join("seal1.gif"), b"GIF89a").unwrap();
        let raw = FetchCache::new(Client::new(), raw_dir);
        let executor = writing_executor(1, EVEN_DIMENSIONS_FILTER);
        let video_dir = temp_dir.path().join("video");
        let mut transcoder = Transcoder::new(Arc::new(executor), "ffmpeg".to_string(), video_dir.clone(), 720, None);

        let result = transcoder.ensure_mp4(&source("seal1"), &raw).await.unwrap();

        assert!(result.converted);
        assert!(video_dir.join("seal1.mp4").is_file());
        assert!(!video_dir.join("seal1.partial.mp4").exists());
        assert_eq!(raw.network_fetches(), 0);

        // Second call finds the finished file
        let again = transcoder.ensure_mp4(&source("seal1"), &raw).await.unwrap();
        assert!(!again.converted);
        assert_eq!(transcoder.transcodes(), 1);
    }

    #[tokio::test]
    async fn test_master_source_is_downsampled_with_fallback_warning() {
        let temp_dir = TempDir::new().unwrap();
        let library = AssetLibrary::from_entries(vec![
            ("throne2_5".to_string(), temp_dir.path().join("Rev1/throne2_5.mov")),
            ("throne3_1".to_string(), temp_dir.path().join("Rev1/throne3_1.mov")),
        ])
        .unwrap();
        let resolver = AssetResolver::with_library(temp_dir.path().to_path_buf(), library);
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|_, args| {
                args.iter().any(|a| a == "scale=-2:720") && args.iter().any(|a| a.ends_with("throne2_5.mov"))
            })
            .times(1)
            .returning(|_, args| {
                std::fs::write(args.last().unwrap(), b"mp4").unwrap();
                Ok(CommandOutput::success(Vec::new()))
            });
        let raw = FetchCache::new(Client::new(), temp_dir.path().join("raw"));
        let video_dir = temp_dir.path().join("video");
        let mut transcoder =
            Transcoder::new(Arc::new(executor), "ffmpeg".to_string(), video_dir.clone(), 720, Some(resolver));

        let result = transcoder.ensure_mp4(&source("throne2_6"), &raw).await.unwrap();

        assert_eq!(result.mp4_path, video_dir.join("throne2_6.mp4"));
        assert!(matches!(
            result.warnings.as_slice(),
            [Warning::FuzzyAssetMatch { chosen, .. }] if chosen == "throne2_5"
        ));
        assert_eq!(raw.network_fetches(), 0);
    }

    #[tokio::test]
    async fn test_failed_conversion_is_fatal_and_leaves_no_mp4() {
        let temp_dir = TempDir::new().unwrap();
        let raw_dir = temp_dir.path().join("raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join("seal1.gif"), b"GIF89a").unwrap();
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::failure(1, "Invalid data found when processing input")));
        let raw = FetchCache::new(Client::new(), raw_dir);
        let video_dir = temp_dir.path().join("video");
        let mut transcoder = Transcoder::new(Arc::new(executor), "ffmpeg".to_string(), video_dir.clone(), 720, None);

        let result = transcoder.ensure_mp4(&source("seal1"), &raw).await;

        match result {
            Err(ArchiveError::Transcode { stem, command, .. }) => {
                assert_eq!(stem, "seal1");
                assert!(command.starts_with("ffmpeg -y -i"));
            }
            other => panic!("expected transcode error, got {:?}", other),
        }
        assert!(!video_dir.join("seal1.mp4").exists());
    }

    #[tokio::test]
    async fn test_empty_master_library_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = AssetResolver::with_library(temp_dir.path().to_path_buf(), AssetLibrary::default());
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().times(0);
        let raw = FetchCache::new(Client::new(), temp_dir.path().join("raw"));
        let mut transcoder = Transcoder::new(
            Arc::new(executor),
            "ffmpeg".to_string(),
            temp_dir.path().join("video"),
            720,
            Some(resolver),
        );

        let result = transcoder.ensure_mp4(&source("seal1"), &raw).await;

        assert!(matches!(result, Err(ArchiveError::NoAsset { .. })));
    }

    #[test]
    fn test_ffmpeg_args_shape() {
        let args = ffmpeg_args(
            &SourceKind::Master(PathBuf::from("4k/Rev1/a.mov")),
            Path::new("content/video/a.partial.mp4"),
            480,
        );
        assert_eq!(
            args,
            vec![
                "-y", "-i", "4k/Rev1/a.mov", "-movflags", "faststart", "-pix_fmt", "yuv420p", "-vf",
                "scale=-2:480", "content/video/a.partial.mp4",
            ]
        );
    }
}
