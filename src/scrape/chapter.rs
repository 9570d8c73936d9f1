/// Chapter page parsing
///
/// A chapter page is reduced to a flat, document-ordered list of two node
/// kinds: paragraphs and images that sit directly inside a `<figure>`.
/// Images anywhere else are ignored. Nothing is interpreted here; attribute
/// values and marker texts are carried raw so that classification can apply
/// its rules in document order.
use super::{selector, text_without};
use crate::error::{ArchiveError, Result};
use scraper::node::Element;
use scraper::{ElementRef, Html};

/// Elements that may carry a verse number inside a paragraph
pub const VERSE_MARKER_TAGS: [&str; 2] = ["sup", "strong"];

const CONTENT_SELECTOR: &str = "figure > img, p";

/// Whether an element plays the verse marker role (superscript or bold)
pub fn is_verse_marker(element: &Element) -> bool {
    VERSE_MARKER_TAGS.contains(&element.name())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphNode {
    /// Text of every marker element, in document order
    pub markers: Vec<String>,
    /// Paragraph text with all marker elements removed, untrimmed
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    pub src: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Paragraph(ParagraphNode),
    Image(ImageNode),
}

impl ContentNode {
    /// Build a node from a matched element; anything but `<p>`/`<img>` is fatal
    pub fn from_element(element: ElementRef<'_>) -> Result<Self> {
        match element.value().name() {
            "p" => Ok(ContentNode::Paragraph(ParagraphNode::from_element(element))),
            "img" => Ok(ContentNode::Image(ImageNode::from_element(element))),
            other => Err(ArchiveError::Structural(format!(
                "unexpected <{}> where only <p> or <img> is allowed",
                other
            ))),
        }
    }
}

impl ParagraphNode {
    fn from_element(paragraph: ElementRef<'_>) -> Self {
        let markers = paragraph
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|element| is_verse_marker(element.value()))
            .map(|marker| marker.text().collect::<String>())
            .collect();

        Self {
            markers,
            text: text_without(paragraph, is_verse_marker),
        }
    }
}

impl ImageNode {
    fn from_element(image: ElementRef<'_>) -> Self {
        let attr = |name: &str| image.value().attr(name).map(str::to_string);
        Self {
            src: attr("src"),
            width: attr("width"),
            height: attr("height"),
        }
    }
}

/// Extract the content nodes of a chapter page in document order
pub fn parse_chapter(html: &str) -> Result<Vec<ContentNode>> {
    let document = Html::parse_document(html);
    let content_selector = selector(CONTENT_SELECTOR)?;

    document
        .select(&content_selector)
        .map(ContentNode::from_element)
        .collect()
}
