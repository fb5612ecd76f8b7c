//! HTML link extraction

use scraper::{Html, Selector};
use url::Url;

/// Extracts all followable links from an HTML document
///
/// Relative hrefs are resolved against `base_url` (the final URL after
/// redirects). Links that cannot be crawled are dropped:
/// - `javascript:`, `mailto:`, `tel:`, `data:` schemes
/// - fragment-only links (same page anchors)
/// - anything that does not resolve to an http(s) URL
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves an href to an absolute URL, or None if it should be skipped
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Fragment-only links point back at the same page
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
