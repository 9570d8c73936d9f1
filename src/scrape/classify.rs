/// Classification of content nodes into manifest items
use super::chapter::{ImageNode, ParagraphNode};
use crate::error::{ArchiveError, Result};
use crate::manifest::ChapterItem;
use crate::warning::Warning;
use std::path::Path;
use url::Url;

/// Outcome of classifying one node: the item, if it survived, plus warnings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<T> {
    pub value: Option<T>,
    pub warnings: Vec<Warning>,
}

impl<T> Classified<T> {
    fn kept(value: T, warnings: Vec<Warning>) -> Self {
        Self {
            value: Some(value),
            warnings,
        }
    }

    fn skipped(warning: Warning) -> Self {
        Self {
            value: None,
            warnings: vec![warning],
        }
    }
}

/// An animation found on a chapter page, before its video exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationSource {
    /// Lowercase, extension-stripped identifier; becomes the manifest basename
    pub stem: String,
    /// Absolute URL of the legacy low-resolution source
    pub url: Url,
    /// Lowercase filename of the legacy source, used as its cache key
    pub filename: String,
    /// Dimensions declared in the markup; replaced by probed values later
    pub declared_width: u32,
    pub declared_height: u32,
}

/// Turn a paragraph into a verse.
///
/// The first marker supplies the verse number; the remaining text, trimmed,
/// is the verse. A paragraph with no text left is dropped with a warning.
pub fn classify_paragraph(paragraph: &ParagraphNode) -> Classified<ChapterItem> {
    let mut warnings = Vec::new();
    let number = verse_number(&paragraph.markers, &mut warnings);

    let text = paragraph.text.trim();
    if text.is_empty() {
        warnings.push(Warning::EmptyParagraph);
        return Classified {
            value: None,
            warnings,
        };
    }

    Classified::kept(
        ChapterItem::Verse {
            number,
            text: text.to_string(),
        },
        warnings,
    )
}

fn verse_number(markers: &[String], warnings: &mut Vec<Warning>) -> Option<u32> {
    let first = markers.first()?;
    if markers.len() > 1 {
        warnings.push(Warning::MultipleVerseMarkers { count: markers.len() });
    }

    let text = first.trim();
    match text.parse::<u32>() {
        Ok(number) if number > 0 => Some(number),
        _ => {
            warnings.push(Warning::InvalidVerseNumber { text: text.to_string() });
            None
        }
    }
}

/// Turn a figure image into an animation source.
///
/// Missing or unparseable dimensions, or a missing `src`, are fatal. A source
/// without the raw animation extension is skipped with a warning.
pub fn classify_image(image: &ImageNode, page_url: &Url, raw_extension: &str) -> Result<Classified<AnimationSource>> {
    let declared_width = dimension(image.width.as_deref(), "width")?;
    let declared_height = dimension(image.height.as_deref(), "height")?;

    let src = image
        .src
        .as_deref()
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .ok_or_else(|| ArchiveError::Structural("found <img> without src".to_string()))?;

    let suffix = format!(".{}", raw_extension.to_lowercase());
    if !src.to_lowercase().ends_with(&suffix) {
        return Ok(Classified::skipped(Warning::UnexpectedImageExtension {
            src: src.to_string(),
            expected: raw_extension.to_string(),
        }));
    }

    let url = page_url.join(src)?;
    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::to_lowercase)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ArchiveError::Structural(format!("cannot derive a filename from {}", src)))?;
    let stem = file_stem(&filename)
        .ok_or_else(|| ArchiveError::Structural(format!("cannot derive a stem from {}", src)))?;

    Ok(Classified::kept(
        AnimationSource {
            stem,
            url,
            filename,
            declared_width,
            declared_height,
        },
        Vec::new(),
    ))
}

fn dimension(value: Option<&str>, name: &str) -> Result<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            ArchiveError::Structural(format!(
                "found <img> with missing or invalid {} ({:?})",
                name, value
            ))
        })
}

/// Lowercase filename without its final extension
pub fn file_stem(filename: &str) -> Option<String> {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_lowercase)
        .filter(|stem| !stem.is_empty())
}
