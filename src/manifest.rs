/// Manifest data model consumed by the presentation layer
///
/// The JSON shape written here is the only contract the viewer depends on:
/// an ordered array of chapters, each with a list of tagged items.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// A single entry inside a chapter, in document order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChapterItem {
    /// A paragraph of text with an optional informational verse number
    Verse { number: Option<u32>, text: String },
    /// A looping animation backed by `<basename>.mp4` in the video directory
    Animation {
        basename: String,
        width: u32,
        height: u32,
    },
}

impl ChapterItem {
    pub fn is_animation(&self) -> bool {
        matches!(self, ChapterItem::Animation { .. })
    }
}

/// One chapter as listed on the index page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub description: String,
    pub items: Vec<ChapterItem>,
}

impl Chapter {
    pub fn new(title: String, description: String) -> Self {
        Self {
            title,
            description,
            items: Vec::new(),
        }
    }

    /// Number of verse items in this chapter
    pub fn verse_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_animation()).count()
    }

    /// Number of animation items in this chapter
    pub fn animation_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_animation()).count()
    }
}

/// The ordered chapter list produced by a run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Manifest {
    pub chapters: Vec<Chapter>,
}

impl Manifest {
    pub fn new(chapters: Vec<Chapter>) -> Self {
        Self { chapters }
    }

    /// Render the manifest as stable, 4-space indented JSON
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the manifest through a sibling `.part` file, creating parent
    /// directories as needed
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(path);
        tokio::fs::write(&partial, self.to_json()?).await?;
        tokio::fs::rename(&partial, path).await?;
        info!("📝 Wrote {} chapters to {}", self.chapters.len(), path.display());
        Ok(())
    }

    /// Read a previously written manifest
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
