//! Line classification shared by the comparison and sentence scanners.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator glyphs accepted between a comparison title and its phrase.
pub const ARROWS: &[&str] = &["→", "-->", "->", "=>", "⟶", "➔"];

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d{1,3}[.)])\s+(.*)$").unwrap());

static EMPHASIS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+|_{2,}").unwrap());
// Single-underscore emphasis only at word edges, so snake_case survives.
static UNDERSCORE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(^|[\s(\["“'])_+([^\s_])"#).unwrap());
static UNDERSCORE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([^\s_])_+($|[\s)\],.;:!?"”'])"#).unwrap());
static LEADING_BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:#{1,6}|>)\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Content of a list-style line (bullet or numbered), without the marker.
pub fn list_item(line: &str) -> Option<&str> {
    LIST_ITEM
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn is_list_item(line: &str) -> bool {
    list_item(line).is_some()
}

pub fn contains_arrow(line: &str) -> bool {
    ARROWS.iter().any(|a| line.contains(a))
}

/// Earliest arrow in `s` as (byte offset, glyph length).
pub fn first_arrow(s: &str) -> Option<(usize, usize)> {
    ARROWS
        .iter()
        .filter_map(|a| s.find(a).map(|pos| (pos, a.len())))
        .min_by_key(|(pos, _)| *pos)
}

/// Trim surrounding emphasis markers (`*`, `_`) and whitespace.
pub fn strip_emphasis(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '*' || c == '_').trim()
}

/// Normalise a prose line for grammar matching.
///
/// Drops heading/quote markers, wrapping emphasis and quotes, turns inner
/// emphasis runs into spaces and collapses whitespace.
pub fn clean_prose(line: &str) -> String {
    let mut s = line.trim();
    while let Some(m) = LEADING_BLOCK_MARKER.find(s) {
        if m.as_str().is_empty() {
            break;
        }
        s = &s[m.end()..];
    }
    let s = s
        .trim()
        .trim_matches(|c| matches!(c, '*' | '_' | '"' | '“' | '”'))
        .trim();

    let spaced = EMPHASIS_RUN.replace_all(s, " ");
    let spaced = UNDERSCORE_OPEN.replace_all(&spaced, "${1}${2}");
    let spaced = UNDERSCORE_CLOSE.replace_all(&spaced, "${1}${2}");
    let collapsed = WHITESPACE.replace_all(&spaced, " ");
    collapsed
        .trim()
        .replace(" ,", ",")
        .replace(" .", ".")
}
