/// Checks if a host matches a domain pattern
///
/// Two pattern forms are supported:
/// 1. Exact: "goodreads.com" matches only "goodreads.com"
/// 2. Wildcard: "*.goodreads.com" matches "goodreads.com" and any subdomain
///    such as "www.goodreads.com"
///
/// Comparison is ASCII case-insensitive since hosts in scraped markup are not
/// guaranteed to be lowercase.
///
/// # Examples
///
/// ```
/// use quote_harvester::url::matches_domain_pattern;
///
/// assert!(matches_domain_pattern("*.goodreads.com", "www.goodreads.com"));
/// assert!(matches_domain_pattern("*.goodreads.com", "goodreads.com"));
/// assert!(!matches_domain_pattern("goodreads.com", "www.goodreads.com"));
/// ```
pub fn matches_domain_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}
