//! Body payload normalization: base64url decode, HTML to visible text, whitespace collapse

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use once_cell::sync::Lazy;
use scraper::Html;
use tracing::trace;

/// Gmail emits padded and unpadded base64url; accept both
static URL_SAFE_LENIENT: Lazy<GeneralPurpose> = Lazy::new(|| {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true),
    )
});

/// Elements whose children never count as visible text
const HIDDEN_ELEMENTS: &[&str] = &["script", "style"];

/// Line boundaries recognized when collapsing text (the Unicode line breaks
/// plus the ASCII separators mail bodies occasionally carry)
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Normalize a raw body payload into a single line of visible text
///
/// Never fails: undecodable payloads are treated as already-decoded text and
/// an empty payload yields an empty string.
pub fn normalize_content(payload: &str) -> String {
    if payload.is_empty() {
        return String::new();
    }

    let decoded = decode_payload(payload);
    let text = visible_text(&decoded);
    collapse_whitespace(&text)
}

/// Decode a base64url payload to UTF-8 text, or return the input unchanged
pub fn decode_payload(payload: &str) -> String {
    match URL_SAFE_LENIENT.decode(payload.trim()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                trace!("Payload decoded as base64 but is not UTF-8; using it verbatim");
                payload.to_string()
            }
        },
        Err(_) => payload.to_string(),
    }
}

/// Parse text as HTML and return its visible text, with script/style content removed
///
/// The tree is walked with an explicit stack, so nesting depth is bounded by
/// the heap rather than the call stack.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len());

    let mut pending: Vec<_> = document.root_element().children().rev().collect();
    while let Some(node) = pending.pop() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(element) = node.value().as_element() {
            if !HIDDEN_ELEMENTS.contains(&element.name()) {
                pending.extend(node.children().rev());
            }
        }
    }

    out
}

/// Split on line breaks and double spaces, trim fragments, drop empty ones,
/// and join the rest with single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split(is_line_break)
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
