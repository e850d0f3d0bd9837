//! Comparison list parsing: `- <title> → <phrase>` lines.

use calibra_core::RawComparison;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::lines::{first_arrow, list_item, strip_emphasis};

static YEAR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<title>.*?)\s*\((?P<year>\d{4})\)\s*$").unwrap());

/// Parse every comparison entry in document order. Duplicates are kept.
pub fn parse_comparisons(text: &str) -> Vec<RawComparison> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<RawComparison> {
    let content = list_item(line)?;
    let (pos, len) = first_arrow(content)?;

    let (title, year_hint) = split_title(&content[..pos]);
    let phrase = strip_emphasis(&content[pos + len..]);

    if title.is_empty() || phrase.is_empty() {
        return None;
    }

    Some(RawComparison {
        title,
        phrase: phrase.to_string(),
        year_hint,
    })
}

/// Strip emphasis and a trailing `(YYYY)` from a title, keeping the year.
fn split_title(raw: &str) -> (String, Option<i32>) {
    let title = strip_emphasis(raw).trim_end_matches(':').trim();
    match YEAR_SUFFIX.captures(title) {
        Some(caps) => {
            let year = caps["year"].parse().ok();
            (strip_emphasis(&caps["title"]).to_string(), year)
        }
        None => (title.to_string(), None),
    }
}
