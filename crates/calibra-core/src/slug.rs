//! URL-safe slugs derived from (title, year).
//!
//! Slugs double as stable lookup keys, so this must stay a pure function.

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Build the slug for a title and optional release year.
pub fn slugify(title: &str, year: Option<i32>) -> String {
    let lower = title.to_lowercase();
    let stripped = DISALLOWED.replace_all(&lower, "");
    let hyphenated = WHITESPACE.replace_all(stripped.trim(), "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");
    let base = collapsed.trim_matches('-');

    match year {
        Some(y) if base.is_empty() => y.to_string(),
        Some(y) => format!("{}-{}", base, y),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_slug_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn test_basic_slug() {
        assert_eq!(slugify("Inception", Some(2010)), "inception-2010");
        assert_eq!(slugify("The Dark Knight", None), "the-dark-knight");
    }

    #[test]
    fn test_punctuation_and_hyphen_runs() {
        assert_eq!(
            slugify("Spider-Man: Into the Spider-Verse", Some(2018)),
            "spider-man-into-the-spider-verse-2018"
        );
        assert_eq!(slugify("  -- Mad   Max -- ", None), "mad-max");
        assert_eq!(slugify("Mission: Impossible - Fallout", Some(2018)), "mission-impossible-fallout-2018");
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(slugify("Amélie", Some(2001)), "amlie-2001");
    }

    #[test]
    fn test_empty_title_falls_back_to_year() {
        assert_eq!(slugify("???", Some(1999)), "1999");
        assert_eq!(slugify("", None), "");
    }

    #[test]
    fn test_slug_is_pure_and_safe() {
        let samples = [
            ("Heat", Some(1995)),
            ("WALL·E", Some(2008)),
            ("Se7en", Some(1995)),
            ("  Tabs\tand\nnewlines  ", None),
            ("Crouching Tiger, Hidden Dragon", Some(2000)),
            ("東京物語", Some(1953)),
        ];
        for (title, year) in samples {
            let first = slugify(title, year);
            let second = slugify(title, year);
            assert_eq!(first, second);
            assert!(is_slug_safe(&first), "unsafe slug: {first:?}");
            assert!(!first.starts_with('-') && !first.ends_with('-'));
            assert!(!first.contains("--"));
        }
    }
}
