//! Neutral prompt builder.
//!
//! Asks for the two shapes the extractor understands: arrow comparison lines
//! and one "If X felt Y, this feels Z." sentence.

use crate::types::Prompt;
use calibra_core::MediaType;

const SYSTEM: &str = "You write short emotional previews of films and series. \
Write plain text with light markdown. Include a list of comparison lines, each formatted as \
`- <Title> (<year>) → <how it compares>`, and exactly one sentence of the form \
`If <another title> felt <feeling>, this feels <feeling>.` on its own line.";

/// What the prompt is about.
#[derive(Debug, Clone, Default)]
pub struct PromptSubject<'a> {
    pub title: &'a str,
    pub year: Option<i32>,
    pub media_type: Option<MediaType>,
    pub genres: &'a [String],
}

pub fn build_prompt(subject: &PromptSubject<'_>) -> Prompt {
    let mut user = match subject.media_type {
        Some(MediaType::Series) => format!("Series: {}", subject.title),
        Some(MediaType::Film) => format!("Film: {}", subject.title),
        None => format!("Title: {}", subject.title),
    };
    if let Some(year) = subject.year {
        user.push_str(&format!(" ({})", year));
    }
    if !subject.genres.is_empty() {
        user.push_str(&format!("\nGenres: {}", subject.genres.join(", ")));
    }

    Prompt {
        system: SYSTEM.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_subject() {
        let genres = vec!["Crime".to_string(), "Drama".to_string()];
        let prompt = build_prompt(&PromptSubject {
            title: "Heat",
            year: Some(1995),
            media_type: Some(MediaType::Film),
            genres: &genres,
        });
        assert_eq!(prompt.user, "Film: Heat (1995)\nGenres: Crime, Drama");
        assert!(prompt.system.contains("→"));
    }

    #[test]
    fn test_title_only_prompt() {
        let prompt = build_prompt(&PromptSubject {
            title: "Severance",
            ..Default::default()
        });
        assert_eq!(prompt.user, "Title: Severance");
    }
}
