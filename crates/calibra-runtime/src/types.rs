//! Runtime types.

use std::pin::Pin;

use futures::Stream;
use serde::Serialize;

use calibra_core::{Card, CanonicalIdentity, MediaType, ResolvedComparison};

/// Header sent before any generated text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    /// Committed backend, or the stored provider for a cached card.
    pub provider: String,
    pub external_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: Option<MediaType>,
    pub poster_ref: Option<String>,
    pub genres: Vec<String>,
    pub slug: String,
    pub cached: bool,
}

impl GenerationMeta {
    pub fn from_card(card: &Card) -> Self {
        Self {
            provider: card.provider.clone(),
            external_id: Some(card.external_id.clone()),
            title: card.title.clone(),
            year: card.year,
            media_type: Some(card.media_type),
            poster_ref: card.poster_ref.clone(),
            genres: card.genres.clone(),
            slug: card.slug.clone(),
            cached: true,
        }
    }

    pub(crate) fn live(provider: &str, subject: &Subject) -> Self {
        match subject {
            Subject::Identified(identity) => Self {
                provider: provider.to_string(),
                external_id: Some(identity.external_id.clone()),
                title: identity.title.clone(),
                year: identity.year,
                media_type: Some(identity.media_type),
                poster_ref: identity.poster_ref.clone(),
                genres: identity.genres.clone(),
                slug: subject.slug(),
                cached: false,
            },
            Subject::TitleOnly { title, media_type } => Self {
                provider: provider.to_string(),
                external_id: None,
                title: title.clone(),
                year: None,
                media_type: *media_type,
                poster_ref: None,
                genres: Vec::new(),
                slug: subject.slug(),
                cached: false,
            },
        }
    }
}

/// Summary sent after the generated text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub card_id: Option<i64>,
    pub external_id: Option<String>,
    pub slug: String,
    pub provider: String,
    pub calibration_sentence: Option<String>,
    pub comparisons: Vec<ResolvedComparison>,
    /// False for title-only generations and failed writes.
    pub persisted: bool,
    pub cached: bool,
}

impl GenerationResult {
    pub fn from_card(card: &Card, cached: bool) -> Self {
        Self {
            card_id: Some(card.id),
            external_id: Some(card.external_id.clone()),
            slug: card.slug.clone(),
            provider: card.provider.clone(),
            calibration_sentence: card.calibration_sentence.clone(),
            comparisons: card.comparisons.clone(),
            persisted: true,
            cached,
        }
    }
}

/// One item of a live generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Generated text, already appended to the body.
    Fragment(String),
    /// The backend finished and post-processing ran.
    Completed(GenerationResult),
    /// The committed backend stalled or failed after output began.
    Failed(String),
}

pub type EventStream = Pin<Box<dyn Stream<Item = GenerationEvent> + Send>>;

/// A generation that committed to a backend and is streaming.
pub struct LiveGeneration {
    pub meta: GenerationMeta,
    pub events: EventStream,
}

/// Outcome of starting a generation.
pub enum Generation {
    Cached(Card),
    Live(LiveGeneration),
}

/// What is being generated for.
#[derive(Debug, Clone)]
pub(crate) enum Subject {
    Identified(CanonicalIdentity),
    /// Catalog lookup failed; nothing can be cached or persisted.
    TitleOnly {
        title: String,
        media_type: Option<MediaType>,
    },
}

impl Subject {
    pub(crate) fn slug(&self) -> String {
        match self {
            Subject::Identified(identity) => calibra_core::slugify(&identity.title, identity.year),
            Subject::TitleOnly { title, .. } => calibra_core::slugify(title, None),
        }
    }
}
