//! Domain types shared across the pipeline: cards, comparisons, identities.

use serde::{Deserialize, Serialize};

/// Kind of title a card describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Film,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Film => "film",
            MediaType::Series => "series",
        }
    }

    /// Parse the stored or user-supplied name. Accepts catalog spellings too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "film" | "movie" => Some(MediaType::Film),
            "series" | "tv" | "show" => Some(MediaType::Series),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity of a title as reported by the metadata catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIdentity {
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub poster_ref: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// A comparison entry as it appears in generated text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComparison {
    pub title: String,
    pub phrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_hint: Option<i32>,
}

/// A comparison resolved against the catalog. Only resolved entries are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComparison {
    /// Canonical catalog title.
    pub display_title: String,
    /// Title exactly as the generator wrote it.
    pub source_title: String,
    pub external_id: String,
    pub media_type: MediaType,
    pub year: Option<i32>,
    pub slug: String,
    pub phrase: String,
}

/// Card contents ready to be written. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub poster_ref: Option<String>,
    pub genres: Vec<String>,
    pub slug: String,
    pub body_text: String,
    pub calibration_sentence: Option<String>,
    pub comparisons: Vec<ResolvedComparison>,
    pub provider: String,
}

/// A persisted calibration card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub poster_ref: Option<String>,
    pub genres: Vec<String>,
    pub slug: String,
    pub body_text: String,
    pub calibration_sentence: Option<String>,
    pub comparisons: Vec<ResolvedComparison>,
    pub provider: String,
    /// Unix millis.
    pub created_at: i64,
    pub updated_at: i64,
    /// Channel name → unix millis of the last post on that channel.
    #[serde(default)]
    pub last_posted_at: std::collections::BTreeMap<String, i64>,
}

/// Inbound generation request. At least one of `title` or `external_id` is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub title: Option<String>,
    pub external_id: Option<String>,
    pub media_type: Option<MediaType>,
    pub preferred_provider: Option<String>,
}

impl GenerationRequest {
    pub fn validate(&self) -> crate::Result<()> {
        let has_title = self.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_id = self
            .external_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if has_title || has_id {
            Ok(())
        } else {
            Err(crate::Error::InvalidRequest(
                "either title or externalId is required".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parse_accepts_catalog_names() {
        assert_eq!(MediaType::parse("movie"), Some(MediaType::Film));
        assert_eq!(MediaType::parse("TV"), Some(MediaType::Series));
        assert_eq!(MediaType::parse("series"), Some(MediaType::Series));
        assert_eq!(MediaType::parse("person"), None);
    }

    #[test]
    fn test_request_requires_title_or_id() {
        assert!(GenerationRequest::default().validate().is_err());

        let blank = GenerationRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let by_id = GenerationRequest {
            external_id: Some("movie:27205".into()),
            ..Default::default()
        };
        assert!(by_id.validate().is_ok());
    }

    #[test]
    fn test_request_wire_names() {
        let req: GenerationRequest = serde_json::from_value(serde_json::json!({
            "title": "Heat",
            "mediaType": "film",
            "preferredProvider": "groq",
        }))
        .unwrap();
        assert_eq!(req.media_type, Some(MediaType::Film));
        assert_eq!(req.preferred_provider.as_deref(), Some("groq"));
    }
}
