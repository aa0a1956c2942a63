// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Schemes that never point at a crawlable page.
const IGNORED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

/// Resolve a hyperlink against the page it was found on.
///
/// Returns `None` for empty hrefs, `mailto:`/`tel:`/`javascript:` links and
/// anything that does not resolve. The fragment is always stripped.
///
/// # Examples
/// ```
/// use foodspider::utils::url::normalize;
///
/// assert_eq!(
///     normalize("https://example.com/path/", "page.html#top"),
///     Some("https://example.com/path/page.html".to_string())
/// );
/// ```
pub fn normalize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    let mut resolved = Url::parse(base).ok()?.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Whether `url` lives on the same host[:port] as `seed`.
///
/// Any parse failure counts as a different site.
pub fn same_site(seed: &str, url: &str) -> bool {
    match (Url::parse(seed), Url::parse(url)) {
        (Ok(a), Ok(b)) => {
            a.host_str().is_some() && a.host_str() == b.host_str() && a.port() == b.port()
        }
        _ => false,
    }
}

/// Whether `url` is an absolute http(s) URL usable as a crawl seed.
pub fn is_crawlable(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
