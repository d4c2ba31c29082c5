//! Utility functions and helpers.

pub mod text;

use url::Url;

/// Resolve a potentially relative listing URL against the listing site.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href.trim_start_matches('/'))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> String {
    match Url::parse(base_url) {
        Ok(base) => resolve_url(&base, href),
        Err(_) => href.to_string(),
    }
}

/// Percent-encode tildes, which some chat platforms reject in image URLs.
pub fn escape_image_url(url: &str) -> String {
    url.replace('~', "%7E")
}
