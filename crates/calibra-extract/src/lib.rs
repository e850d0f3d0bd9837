//! Structured extraction over generated card text.
//!
//! Pure and deterministic: the same body always yields the same comparisons
//! and calibration sentence, so regeneration and re-extraction agree.

pub mod calibration;
pub mod comparisons;
pub mod lines;

use calibra_core::RawComparison;
use serde::Serialize;

pub use calibration::extract_calibration_sentence;
pub use comparisons::parse_comparisons;

/// Everything extracted from one generated body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub comparisons: Vec<RawComparison>,
    pub calibration_sentence: Option<String>,
}

/// Run both scanners over the full body text.
pub fn extract(body_text: &str) -> Extraction {
    Extraction {
        comparisons: parse_comparisons(body_text),
        calibration_sentence: extract_calibration_sentence(body_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "\
# Heat (1995)

A slow-burn duel between two professionals who respect each other.

**If The Godfather felt operatic, this may feel colder and more procedural.**

## Emotional neighbours
- **Thief** (1981) → the same loner-craftsman melancholy
- Collateral → one night, one city, two men
- Heat → If Heat felt like a professional rivalry, this feels personal.
";

    #[test]
    fn test_extract_full_document() {
        let result = extract(BODY);
        assert_eq!(result.comparisons.len(), 3);
        assert_eq!(result.comparisons[0].title, "Thief");
        assert_eq!(result.comparisons[0].year_hint, Some(1981));
        assert_eq!(
            result.calibration_sentence.as_deref(),
            Some("If The Godfather felt operatic, this may feel colder and more procedural.")
        );
    }

    #[test]
    fn test_extract_is_deterministic() {
        assert_eq!(extract(BODY), extract(BODY));
    }

    #[test]
    fn test_comparisons_without_sentence() {
        let result = extract("Some prose.\n- Heat → If Heat felt like a professional rivalry...");
        assert_eq!(result.comparisons.len(), 1);
        assert!(result.calibration_sentence.is_none());
    }
}
