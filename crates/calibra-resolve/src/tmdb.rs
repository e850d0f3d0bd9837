//! TMDB API client.
//!
//! External ids are namespaced by TMDB media kind (`movie:603`, `tv:1396`)
//! because TMDB reuses numeric ids across films and series.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::MetadataCatalog;
use calibra_core::{CanonicalIdentity, Error, MediaType, Result};

const TMDB_API_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
    #[serde(default)]
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Details {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

pub struct TmdbCatalog {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbCatalog {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("calibra/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: TMDB_API_URL.to_string(),
        })
    }

    /// Point the client at a different API root (staging, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| Error::MetadataLookup(format!("TMDB request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::MetadataLookup(format!(
                "TMDB returned status {}",
                response.status()
            )));
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| Error::MetadataLookup(format!("TMDB response unreadable: {}", e)))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl MetadataCatalog for TmdbCatalog {
    async fn search(&self, title: &str, year_hint: Option<i32>) -> Result<Option<CanonicalIdentity>> {
        debug!("TMDB search: {:?} (year hint {:?})", title, year_hint);
        let response: Option<SearchResponse> = self
            .get_json("/search/multi", &[("query", title), ("include_adult", "false")])
            .await?;
        Ok(response.and_then(|r| pick_search_hit(r.results, year_hint)))
    }

    async fn get_by_id(
        &self,
        external_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Option<CanonicalIdentity>> {
        let (kind, id) = split_external_id(external_id, media_type)?;
        debug!("TMDB details: {}/{}", kind.path(), id);
        let details: Option<Details> = self.get_json(&format!("/{}/{}", kind.path(), id), &[]).await?;
        Ok(details.map(|d| details_to_identity(d, kind)))
    }
}

/// Which TMDB endpoint family an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TmdbKind {
    Movie,
    Tv,
}

impl TmdbKind {
    fn path(self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie",
            TmdbKind::Tv => "tv",
        }
    }

    fn media_type(self) -> MediaType {
        match self {
            TmdbKind::Movie => MediaType::Film,
            TmdbKind::Tv => MediaType::Series,
        }
    }

    fn from_media_type(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Film => TmdbKind::Movie,
            MediaType::Series => TmdbKind::Tv,
        }
    }
}

fn external_id(kind: TmdbKind, id: u64) -> String {
    format!("{}:{}", kind.path(), id)
}

/// Accepts `movie:603`, `tv:1396`, or a bare id plus media type (film by default).
fn split_external_id(external_id: &str, media_type: Option<MediaType>) -> Result<(TmdbKind, u64)> {
    let (kind, raw) = match external_id.split_once(':') {
        Some(("movie", raw)) => (TmdbKind::Movie, raw),
        Some(("tv", raw)) => (TmdbKind::Tv, raw),
        Some((prefix, _)) => {
            return Err(Error::MetadataLookup(format!("unknown catalog namespace {:?}", prefix)))
        }
        None => (
            TmdbKind::from_media_type(media_type.unwrap_or(MediaType::Film)),
            external_id,
        ),
    };
    let id = raw
        .trim()
        .parse()
        .map_err(|_| Error::MetadataLookup(format!("invalid catalog id {:?}", external_id)))?;
    Ok((kind, id))
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

/// First film/series hit, preferring one whose year matches the hint.
fn pick_search_hit(hits: Vec<SearchHit>, year_hint: Option<i32>) -> Option<CanonicalIdentity> {
    let mut usable: Vec<CanonicalIdentity> = hits
        .into_iter()
        .filter_map(|hit| {
            let kind = match hit.media_type.as_deref() {
                Some("movie") => TmdbKind::Movie,
                Some("tv") => TmdbKind::Tv,
                _ => return None,
            };
            let (title, date) = match kind {
                TmdbKind::Movie => (hit.title, hit.release_date),
                TmdbKind::Tv => (hit.name, hit.first_air_date),
            };
            Some(CanonicalIdentity {
                external_id: external_id(kind, hit.id),
                title: title.filter(|t| !t.is_empty())?,
                year: year_of(date.as_deref()),
                media_type: kind.media_type(),
                poster_ref: hit.poster_path,
                genres: Vec::new(),
            })
        })
        .collect();

    if let Some(year) = year_hint {
        if let Some(pos) = usable.iter().position(|c| c.year == Some(year)) {
            return Some(usable.swap_remove(pos));
        }
    }
    usable.into_iter().next()
}

fn details_to_identity(details: Details, kind: TmdbKind) -> CanonicalIdentity {
    let (title, date) = match kind {
        TmdbKind::Movie => (details.title, details.release_date),
        TmdbKind::Tv => (details.name, details.first_air_date),
    };
    CanonicalIdentity {
        external_id: external_id(kind, details.id),
        title: title.unwrap_or_default(),
        year: year_of(date.as_deref()),
        media_type: kind.media_type(),
        poster_ref: details.poster_path,
        genres: details.genres.into_iter().map(|g| g.name).collect(),
    }
}
