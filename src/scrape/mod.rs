/// Structural parsing of the remote site
///
/// `index` reads the chapter list, `chapter` reduces a chapter page to its two
/// content node kinds, and `classify` turns those nodes into manifest items.
pub mod chapter;
pub mod classify;
pub mod index;

pub use chapter::{parse_chapter, ContentNode, ImageNode, ParagraphNode};
pub use classify::{classify_image, classify_paragraph, AnimationSource, Classified};
pub use index::{chapter_cache_key, parse_index, IndexEntry, INDEX_CACHE_KEY};

use crate::error::{ArchiveError, Result};
use scraper::node::Element;
use scraper::{ElementRef, Node, Selector};

/// Parse a CSS selector, reporting failures as structural errors
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ArchiveError::Structural(format!("bad selector {}: {:?}", css, e)))
}

/// Concatenated text of `root`, skipping text nested in any excluded element
pub(crate) fn text_without<F>(root: ElementRef<'_>, is_excluded: F) -> String
where
    F: Fn(&Element) -> bool,
{
    let mut text = String::new();
    for node in root.descendants() {
        if let Node::Text(fragment) = node.value() {
            let hidden = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != root.id())
                .any(|ancestor| ancestor.value().as_element().is_some_and(&is_excluded));
            if !hidden {
                text.push_str(fragment);
            }
        }
    }
    text
}
