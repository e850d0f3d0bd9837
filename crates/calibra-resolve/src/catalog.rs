//! Metadata catalog abstraction.
//!
//! The `MetadataCatalog` trait is the only way the pipeline learns canonical
//! identities. `TmdbCatalog` talks to TMDB; `NoopCatalog` is used when no
//! catalog is configured, so every lookup degrades instead of panicking.

use std::sync::Arc;

use async_trait::async_trait;
use calibra_core::{CanonicalIdentity, Error, MediaType, Result};

use crate::tmdb::TmdbCatalog;

/// Title search and details lookup against an external catalog.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    /// Best film or series match for a title. `Ok(None)` when nothing usable matched.
    async fn search(&self, title: &str, year_hint: Option<i32>) -> Result<Option<CanonicalIdentity>>;

    /// Full details (including genres) for a catalog id.
    async fn get_by_id(
        &self,
        external_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Option<CanonicalIdentity>>;
}

/// Catalog used when no API key is configured. Every lookup fails.
pub struct NoopCatalog;

#[async_trait]
impl MetadataCatalog for NoopCatalog {
    async fn search(&self, _title: &str, _year_hint: Option<i32>) -> Result<Option<CanonicalIdentity>> {
        Err(Error::MetadataLookup("no metadata catalog configured".into()))
    }

    async fn get_by_id(
        &self,
        _external_id: &str,
        _media_type: Option<MediaType>,
    ) -> Result<Option<CanonicalIdentity>> {
        Err(Error::MetadataLookup("no metadata catalog configured".into()))
    }
}

/// Create the best available catalog for the given API key.
pub fn create_catalog(api_key: Option<&str>) -> Arc<dyn MetadataCatalog> {
    if let Some(key) = api_key {
        match TmdbCatalog::new(key) {
            Ok(catalog) => {
                tracing::info!("Using TMDB metadata catalog");
                return Arc::new(catalog);
            }
            Err(e) => {
                tracing::warn!("TMDB catalog unavailable: {}. Lookups will degrade.", e);
            }
        }
    } else {
        tracing::warn!("TMDB_API_KEY not set. Cards will be generated without canonical identity.");
    }
    Arc::new(NoopCatalog)
}
