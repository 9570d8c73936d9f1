/// Animated Archive
///
/// Scrapes an illustrated, chapter-structured site into a local archive: a
/// `chapters.json` manifest of verses and animations plus one normalized mp4
/// per animation. Every network fetch, conversion and probe is cached, so a
/// repeated run over unchanged inputs does no work and writes an identical
/// manifest.

pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod media;
pub mod pipeline;
pub mod scrape;
pub mod warning;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ArchiveError, Result};
pub use crate::fetch::{CacheStats, FetchCache};
pub use crate::manifest::{Chapter, ChapterItem, Manifest};
pub use crate::media::{CommandExecutor, CommandOutput, DimensionCache, SystemExecutor, Transcoder};
pub use crate::pipeline::{Pipeline, PipelineContext, RunSummary};
pub use crate::warning::Warning;
