/// Whole-site orchestration: index → chapters → items → manifest
///
/// Chapters and items are processed strictly in document order, one fetch,
/// conversion or probe at a time. Any error aborts the run before the manifest
/// is written; warnings are logged and collected in the [`RunSummary`].
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{build_client, FetchCache};
use crate::manifest::{Chapter, ChapterItem, Manifest};
use crate::media::{AssetResolver, CommandExecutor, DimensionCache, SystemExecutor, Transcoder};
use crate::scrape::{
    classify_image, classify_paragraph, parse_chapter, parse_index, ContentNode, IndexEntry, INDEX_CACHE_KEY,
};
use crate::warning::Warning;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Process-scoped state shared by every stage of one run
pub struct PipelineContext {
    pub config: Config,
    pub pages: FetchCache,
    pub raw: FetchCache,
    pub transcoder: Transcoder,
    pub dimensions: DimensionCache,
}

impl PipelineContext {
    /// Context that spawns the real ffmpeg/ffprobe
    pub fn new(config: Config) -> Result<Self> {
        Self::with_executor(config, Arc::new(SystemExecutor))
    }

    pub fn with_executor(config: Config, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        config.validate()?;

        let client = build_client(&config.source.user_agent, config.source.request_timeout_seconds)?;
        let paths = &config.paths;

        let masters = paths.available_masters_dir().map(|dir| {
            info!("🎞️ Using master library at {}", dir.display());
            AssetResolver::new(
                dir.to_path_buf(),
                config.masters.extension.clone(),
                config.masters.subdir_prefix.clone(),
            )
        });

        let transcoder = Transcoder::new(
            Arc::clone(&executor),
            config.tools.ffmpeg.clone(),
            paths.video_dir(),
            config.masters.downsample_height,
            masters,
        );
        let dimensions = DimensionCache::new(executor, config.tools.ffprobe.clone(), paths.dimensions_cache_dir());

        Ok(Self {
            pages: FetchCache::new(client.clone(), paths.pages_cache_dir()),
            raw: FetchCache::new(client, paths.raw_cache_dir()),
            transcoder,
            dimensions,
            config,
        })
    }
}

/// What a completed run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub chapters: usize,
    pub verses: usize,
    pub animations: usize,
    pub warnings: Vec<Warning>,
    pub network_fetches: usize,
    pub transcodes: usize,
    pub probes: usize,
    pub manifest_path: PathBuf,
}

pub struct Pipeline {
    ctx: PipelineContext,
    warnings: Vec<Warning>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::from_context(PipelineContext::new(config)?))
    }

    pub fn with_executor(config: Config, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        Ok(Self::from_context(PipelineContext::with_executor(config, executor)?))
    }

    pub fn from_context(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            warnings: Vec::new(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Scrape every chapter and write the manifest
    pub async fn run(&mut self) -> Result<RunSummary> {
        let start_time = Instant::now();
        self.warnings.clear();

        let manifest = self.build_manifest().await?;
        let manifest_path = self.ctx.config.paths.manifest_path();
        manifest.write(&manifest_path).await?;

        let summary = RunSummary {
            chapters: manifest.chapters.len(),
            verses: manifest.chapters.iter().map(Chapter::verse_count).sum(),
            animations: manifest.chapters.iter().map(Chapter::animation_count).sum(),
            warnings: std::mem::take(&mut self.warnings),
            network_fetches: self.ctx.pages.network_fetches() + self.ctx.raw.network_fetches(),
            transcodes: self.ctx.transcoder.transcodes(),
            probes: self.ctx.dimensions.probes(),
            manifest_path,
        };

        info!(
            "🎉 Archived {} chapters ({} verses, {} animations) in {:.2}s",
            summary.chapters,
            summary.verses,
            summary.animations,
            start_time.elapsed().as_secs_f64()
        );
        info!(
            "📊 {} fetches, {} conversions, {} probes, {} warnings",
            summary.network_fetches,
            summary.transcodes,
            summary.probes,
            summary.warnings.len()
        );
        Ok(summary)
    }

    /// Everything except writing the manifest
    pub async fn build_manifest(&mut self) -> Result<Manifest> {
        let base_url = Url::parse(&self.ctx.config.source.base_url)?;
        let index_html = self.ctx.pages.fetch_text(base_url.as_str(), INDEX_CACHE_KEY).await?;
        let entries = parse_index(&index_html, &base_url)?;
        info!("📚 Found {} chapters on the index page", entries.len());

        let mut chapters = Vec::with_capacity(entries.len());
        for entry in &entries {
            chapters.push(self.scrape_chapter(entry).await?);
        }
        Ok(Manifest::new(chapters))
    }

    async fn scrape_chapter(&mut self, entry: &IndexEntry) -> Result<Chapter> {
        info!("📄 Scraping {}", entry.title);
        let html = self.ctx.pages.fetch_text(&entry.url, &entry.cache_key()).await?;
        let page_url = Url::parse(&entry.url)?;
        let mut chapter = Chapter::new(entry.title.clone(), entry.description.clone());

        for node in parse_chapter(&html)? {
            match node {
                ContentNode::Paragraph(paragraph) => {
                    let classified = classify_paragraph(&paragraph);
                    self.record(classified.warnings);
                    chapter.items.extend(classified.value);
                }
                ContentNode::Image(image) => {
                    let classified = classify_image(&image, &page_url, &self.ctx.config.source.raw_image_extension)?;
                    self.record(classified.warnings);
                    if let Some(source) = classified.value {
                        let transcoded = self.ctx.transcoder.ensure_mp4(&source, &self.ctx.raw).await?;
                        self.record(transcoded.warnings);
                        let dimensions = self.ctx.dimensions.get_dimensions(&transcoded.mp4_path).await?;
                        chapter.items.push(ChapterItem::Animation {
                            basename: source.stem,
                            width: dimensions.width,
                            height: dimensions.height,
                        });
                    }
                }
            }
        }

        info!(
            "✅ {}: {} verses, {} animations",
            chapter.title,
            chapter.verse_count(),
            chapter.animation_count()
        );
        Ok(chapter)
    }

    fn record(&mut self, warnings: Vec<Warning>) {
        for warning in warnings {
            warn!("⚠️ {}", warning);
            self.warnings.push(warning);
        }
    }
}
