//! HTML extractor for quote listing pages
//!
//! This module turns one listing page into:
//! - The quote records it contains, in markup order
//! - The absolute address of the next page, if there is one
//!
//! Extraction never fails as a whole. A malformed quote block is dropped and
//! the remaining blocks are still extracted; malformed pagination simply ends
//! the crawl at this page.

use crate::record::{Record, Tag};
use crate::url::{is_reference_link, resolve_href};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Result of extracting one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Valid records in markup order
    pub records: Vec<Record>,

    /// Absolute address of the next page, None on the last page
    pub next_page: Option<Url>,

    /// Number of quote blocks dropped for missing required fields
    pub dropped: usize,
}

/// Turns page markup into records and a next-page locator
///
/// Alternate site layouts are supported by providing another implementation
/// rather than by configuring this one.
pub trait Extractor: Send + Sync {
    fn extract(&self, markup: &str) -> ExtractedPage;
}

/// Extractor for the quotes.toscrape.com listing layout
///
/// # Markup
///
/// ```html
/// <div class="quote">
///   <span class="text">“The world as we have created it…”</span>
///   <span>by <small class="author">Albert Einstein</small>
///     <a href="/author/Albert-Einstein">(about)</a>
///     <a href="http://goodreads.com/author/show/9810.Albert_Einstein">(Goodreads page)</a>
///   </span>
///   <div class="tags"><a class="tag" href="/tag/change/page/1/">change</a></div>
/// </div>
/// <ul class="pager"><li class="next"><a href="/page/2/">Next</a></li></ul>
/// ```
#[derive(Debug, Clone)]
pub struct QuoteExtractor {
    base_url: Url,
    reference_domains: Vec<String>,
}

impl QuoteExtractor {
    /// # Arguments
    ///
    /// * `base_url` - Address every relative href is resolved against
    /// * `reference_domains` - Domain patterns for `external_reference_url`
    pub fn new(base_url: Url, reference_domains: Vec<String>) -> Self {
        Self {
            base_url,
            reference_domains,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Extracts a single quote block, validating the result
    fn extract_record(&self, block: ElementRef<'_>) -> Result<Record, crate::HarvestError> {
        let text = select_first(block, "span.text")
            .map(|el| trim_quotation(&element_text(el)))
            .unwrap_or_default();

        let author = select_first(block, "small.author")
            .map(|el| element_text(el).trim().to_string())
            .unwrap_or_default();

        let author_url = self.author_url(block).unwrap_or_default();

        let record = Record {
            text,
            author,
            author_url,
            external_reference_url: self.external_reference(block),
            tags: self.tags(block),
        };

        record.validate()?;
        Ok(record)
    }

    /// Link following the author name, falling back to any author page link
    ///
    /// Reference-domain links are never taken as the author page.
    fn author_url(&self, block: ElementRef<'_>) -> Option<String> {
        let sibling = Selector::parse("small.author ~ a[href]").ok()?;
        block
            .select(&sibling)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve_href(&self.base_url, href))
            .find(|url| !is_reference_link(url, &self.reference_domains))
            .or_else(|| {
                select_first(block, "a[href^=\"/author/\"]")
                    .and_then(|el| el.value().attr("href"))
                    .and_then(|href| resolve_href(&self.base_url, href))
            })
            .map(|url| url.to_string())
    }

    /// Every tag in markup order, skipping ones without a name or target
    fn tags(&self, block: ElementRef<'_>) -> Vec<Tag> {
        let Ok(selector) = Selector::parse("a.tag") else {
            return Vec::new();
        };

        block
            .select(&selector)
            .filter_map(|el| {
                let name = element_text(el).trim().to_string();
                if name.is_empty() {
                    tracing::debug!("Skipping tag without a name");
                    return None;
                }

                let url = el
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_href(&self.base_url, href))?;

                Some(Tag {
                    name,
                    url: url.to_string(),
                })
            })
            .collect()
    }

    /// First link whose host is one of the reference domains
    fn external_reference(&self, block: ElementRef<'_>) -> Option<String> {
        let selector = Selector::parse("a[href]").ok()?;

        block
            .select(&selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve_href(&self.base_url, href))
            .find(|url| is_reference_link(url, &self.reference_domains))
            .map(|url| url.to_string())
    }

    /// Target of the "next" pager link
    fn next_page(&self, document: &Html) -> Option<Url> {
        let selector = Selector::parse("li.next a").ok()?;
        let link = document.select(&selector).next()?;

        match link.value().attr("href") {
            Some(href) => resolve_href(&self.base_url, href),
            None => {
                tracing::warn!("Next page link has no href, treating page as the last");
                None
            }
        }
    }
}

impl Extractor for QuoteExtractor {
    fn extract(&self, markup: &str) -> ExtractedPage {
        let document = Html::parse_document(markup);
        let mut page = ExtractedPage::default();

        if let Ok(selector) = Selector::parse("div.quote") {
            for (index, block) in document.select(&selector).enumerate() {
                match self.extract_record(block) {
                    Ok(record) => page.records.push(record),
                    Err(e) => {
                        tracing::warn!("Dropping quote block {}: {}", index, e);
                        page.dropped += 1;
                    }
                }
            }
        }

        page.next_page = self.next_page(&document);
        page
    }
}

/// Returns the first descendant matching `css`
fn select_first<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Strips surrounding whitespace and straight or curly quotation marks
fn trim_quotation(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\u{201C}' || c == '\u{201D}' || c.is_whitespace())
        .to_string()
}
