use anyhow::{Context, Result};
use animated_archive::{Config, Pipeline, PipelineContext};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "animated-archive")]
#[command(version, author = "TigreRoll")]
#[command(about = "Archive an illustrated chapter site as a manifest plus normalized mp4 animations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to animated-archive.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the index page URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every chapter and write the manifest (default)
    Run,
    /// Inspect or reset the local caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts and sizes per cache area
    Stats,
    /// Remove one cached page or raw animation
    Invalidate {
        /// Cache key, e.g. `index.html` or `chapter-1.html`
        key: String,
    },
    /// Remove every cached page, raw animation and dimension sidecar
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "animated_archive=debug,info"
    } else {
        "animated_archive=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    if let Some(base_url) = cli.base_url {
        config.source.base_url = base_url;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Cache { action } => manage_cache(config, action).await,
    }
}

async fn run(config: Config) -> Result<()> {
    info!("🚀 Animated Archive starting...");
    info!("{}", config.summary());

    let mut pipeline = Pipeline::new(config)?;
    let summary = pipeline.run().await?;

    info!("📝 Manifest: {}", summary.manifest_path.display());
    if !summary.warnings.is_empty() {
        warn!("⚠️ Finished with {} warnings", summary.warnings.len());
    }
    Ok(())
}

async fn manage_cache(config: Config, action: CacheAction) -> Result<()> {
    let ctx = PipelineContext::new(config)?;

    match action {
        CacheAction::Stats => {
            for (area, cache) in [("pages", &ctx.pages), ("raw", &ctx.raw)] {
                let stats = cache.stats()?;
                info!("📊 Cache Statistics ({}):", area);
                info!("  Location: {}", cache.cache_dir().display());
                info!("  Entries: {}", stats.total_files);
                info!("  Size: {:.2} MB", stats.total_bytes as f64 / (1024.0 * 1024.0));
            }
        }
        CacheAction::Invalidate { key } => {
            let removed_page = ctx.pages.invalidate(&key).await?;
            let removed_raw = ctx.raw.invalidate(&key).await?;
            if !removed_page && !removed_raw {
                warn!("❌ No cache entry found for key: {}", key);
            }
        }
        CacheAction::Clear => {
            let cleared = ctx.pages.clear().await? + ctx.raw.clear().await? + ctx.dimensions.clear().await?;
            info!("✅ Cleared {} cached files", cleared);
        }
    }

    Ok(())
}
