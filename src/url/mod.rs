//! URL handling for Quote-Harvester
//!
//! Resolves hrefs found in scraped markup against the site's base address and
//! decides whether a link points at one of the configured third-party
//! reference domains.

mod matcher;

pub use matcher::matches_domain_pattern;

use url::Url;

/// Resolves an href to an absolute HTTP(S) URL
///
/// Returns None if the href should be ignored:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - hrefs that fail to resolve or resolve to a non-HTTP(S) scheme
///
/// # Examples
///
/// ```
/// use quote_harvester::url::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://quotes.toscrape.com").unwrap();
/// let next = resolve_href(&base, "/page/2/").unwrap();
/// assert_eq!(next.as_str(), "https://quotes.toscrape.com/page/2/");
/// ```
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute)
        }
        _ => None,
    }
}

/// Returns true if the URL's host matches any of the given domain patterns
pub fn is_reference_link(url: &Url, patterns: &[String]) -> bool {
    match url.host_str() {
        Some(host) => patterns
            .iter()
            .any(|pattern| matches_domain_pattern(pattern, host)),
        None => false,
    }
}

/// Joins a site path onto the base address
///
/// Unlike `resolve_href` this is used for configured paths, so a failure is
/// surfaced instead of silently ignored.
pub fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    base.join(path)
}
