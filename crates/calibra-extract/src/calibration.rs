//! Calibration sentence extraction.
//!
//! A calibration sentence reads "If X felt Y, this feels Z." Generators phrase
//! it inconsistently, so each accepted shape is a separate grammar tried in
//! order. Every grammar normalises its match to the same canonical wording.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use crate::lines::{clean_prose, contains_arrow, is_list_item};

/// One accepted sentence shape and how to rewrite it canonically.
pub struct Grammar {
    pub name: &'static str,
    pattern: Regex,
    normalize: fn(&Captures<'_>) -> String,
}

impl Grammar {
    pub fn apply(&self, line: &str) -> Option<String> {
        self.pattern.captures(line).map(|caps| (self.normalize)(&caps))
    }
}

/// Grammars in priority order.
pub static GRAMMARS: Lazy<Vec<Grammar>> = Lazy::new(|| {
    vec![
        Grammar {
            name: "this-subject",
            pattern: Regex::new(
                r"(?i)^if\s+(?P<subject>.+?)\s+felt\s+(?P<felt>.+?),\s*this\s+(?P<result>(?:may\s+)?feels?\b.*?)\s*[.!]?$",
            )
            .unwrap(),
            normalize: canonical,
        },
        Grammar {
            name: "named-subject",
            pattern: Regex::new(
                r"(?i)^if\s+(?P<subject>.+?)\s+felt\s+(?P<felt>.+?),\s*(?P<named>[^,.;:]{1,80}?)\s+(?P<result>(?:may\s+)?feels?\b.*?)\s*[.!]?$",
            )
            .unwrap(),
            // The named subject is the card's own title; display always says "this".
            normalize: canonical,
        },
    ]
});

fn canonical(caps: &Captures<'_>) -> String {
    format!(
        "If {} felt {}, this {}.",
        caps["subject"].trim(),
        caps["felt"].trim(),
        caps["result"].trim()
    )
}

/// First calibration sentence in the document, canonicalised.
///
/// List lines and lines containing a comparison arrow are never candidates.
/// `None` is a normal outcome: not every document carries a usable hook.
pub fn extract_calibration_sentence(text: &str) -> Option<String> {
    text.lines()
        .filter(|line| !is_list_item(line) && !contains_arrow(line))
        .find_map(|line| {
            let cleaned = clean_prose(line);
            if cleaned.is_empty() {
                return None;
            }
            GRAMMARS.iter().find_map(|g| {
                let hit = g.apply(&cleaned)?;
                trace!("calibration sentence matched grammar {}", g.name);
                Some(hit)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sentence_round_trips() {
        let line = "If Inception felt intellectually challenging, this may feel emotionally exhausting.";
        assert_eq!(extract_calibration_sentence(line).as_deref(), Some(line));
    }

    #[test]
    fn test_like_and_missing_period() {
        let got = extract_calibration_sentence("If Heat felt like a chess match, this feels like a siege");
        assert_eq!(
            got.as_deref(),
            Some("If Heat felt like a chess match, this feels like a siege.")
        );
    }

    #[test]
    fn test_named_subject_is_normalised_to_this() {
        let text = "If Alien felt claustrophobic, Prometheus may feel cold and vast.";
        assert_eq!(
            extract_calibration_sentence(text).as_deref(),
            Some("If Alien felt claustrophobic, this may feel cold and vast.")
        );
    }

    #[test]
    fn test_emphasis_noise_is_removed() {
        let text = "**If *Up* felt tender, this feels ****devastating****.**";
        assert_eq!(
            extract_calibration_sentence(text).as_deref(),
            Some("If Up felt tender, this feels devastating.")
        );
    }

    #[test]
    fn test_underscore_emphasis_is_removed() {
        assert_eq!(
            extract_calibration_sentence("If _Up_ felt tender, this feels devastating.").as_deref(),
            Some("If Up felt tender, this feels devastating.")
        );
    }

    #[test]
    fn test_list_arrow_line_is_never_selected() {
        let text = "\
## Comparisons
- Heat → If Heat felt like a professional rivalry, this feels personal.
";
        assert_eq!(extract_calibration_sentence(text), None);
    }

    #[test]
    fn test_arrow_in_prose_excludes_line() {
        let text = "If Heat felt cold → this feels warm.";
        assert_eq!(extract_calibration_sentence(text), None);
    }

    #[test]
    fn test_first_matching_line_wins() {
        let text = "\
Opening paragraph with no hook.
If Jaws felt tense, this feels tenser.
If Alien felt bleak, this feels bleaker.
";
        assert_eq!(
            extract_calibration_sentence(text).as_deref(),
            Some("If Jaws felt tense, this feels tenser.")
        );
    }

    #[test]
    fn test_no_match_is_none() {
        let text = "\
A quiet, patient film.
It felt long.
If you liked it, watch it again.
";
        assert_eq!(extract_calibration_sentence(text), None);
        assert_eq!(extract_calibration_sentence(""), None);
    }

    #[test]
    fn test_grammars_are_ordered() {
        let names: Vec<&str> = GRAMMARS.iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["this-subject", "named-subject"]);
        // A "this" sentence also fits the named grammar, but the first grammar claims it.
        let line = "If A felt B, this feels C.";
        assert!(GRAMMARS[0].apply(line).is_some());
        assert!(GRAMMARS[1].apply(line).is_some());
    }
}
