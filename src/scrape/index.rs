/// Index page parsing
use super::{selector, text_without};
use crate::error::{ArchiveError, Result};
use scraper::{ElementRef, Html};
use url::Url;

/// Cache key of the index page itself
pub const INDEX_CACHE_KEY: &str = "index.html";

/// Separator between the link and the description in each list item
const DESCRIPTION_SEPARATOR: &str = " – ";

/// One chapter link on the index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub title: String,
    pub url: String,
    pub description: String,
}

impl IndexEntry {
    /// Cache key under which this chapter's page is stored
    pub fn cache_key(&self) -> String {
        chapter_cache_key(&self.title)
    }
}

/// Parse every `ul > li` entry of the index page, in document order.
///
/// Each list item must carry a link with a non-empty href and text; relative
/// hrefs are resolved against `base_url`.
pub fn parse_index(html: &str, base_url: &Url) -> Result<Vec<IndexEntry>> {
    let document = Html::parse_document(html);
    let item_selector = selector("ul > li")?;
    let link_selector = selector("a")?;

    document
        .select(&item_selector)
        .enumerate()
        .map(|(position, item)| parse_entry(item, &link_selector, base_url, position))
        .collect()
}

fn parse_entry(
    item: ElementRef<'_>,
    link_selector: &scraper::Selector,
    base_url: &Url,
    position: usize,
) -> Result<IndexEntry> {
    let link = item.select(link_selector).next().ok_or_else(|| {
        ArchiveError::Structural(format!("index entry {} has no <a>", position + 1))
    })?;

    let href = link
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or_else(|| ArchiveError::Structural(format!("index entry {}: <a> has no href", position + 1)))?;

    let title = link.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        return Err(ArchiveError::Structural(format!(
            "index entry {}: <a href=\"{}\"> has no text",
            position + 1,
            href
        )));
    }

    let url = base_url.join(href)?;
    let description = text_without(item, |element| element.name() == "a")
        .replacen(DESCRIPTION_SEPARATOR, "", 1)
        .trim()
        .to_string();

    Ok(IndexEntry {
        title,
        url: url.to_string(),
        description,
    })
}

/// Derive a chapter page cache key: whitespace and path separators become `-`,
/// the result is lowercased and given an `.html` extension
pub fn chapter_cache_key(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '-' } else { c })
        .collect();
    format!("{}.html", slug.to_lowercase())
}
