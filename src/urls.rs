//! Hyperlink extraction from normalized text

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// `http://` or `https://` followed by letters, digits, the `$`..`_` ASCII
/// range (which covers `@ . & + / : ? = %` and friends), `! * \ ( ) ,`, or
/// percent-encoded octets. Lowercase-only punctuation such as `{ | } ~` and
/// `#` ends a match, as does whitespace.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*\\(),]|%[0-9a-fA-F]{2})+")
        .expect("URL pattern is a valid regex")
});

/// Extract the distinct URLs appearing in `text`
pub fn extract_urls(text: &str) -> BTreeSet<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Authority component of a URL exactly as written: the text between `://`
/// and the next `/`, `?` or `#`, userinfo and port included
///
/// Hosts are not case-folded and default ports are kept, so
/// `https://Example.com` and `https://example.com:443` stay distinct domains.
pub fn url_domain(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    if authority.is_empty() {
        None
    } else {
        Some(authority.to_string())
    }
}
