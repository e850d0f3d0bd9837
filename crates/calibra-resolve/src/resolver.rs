//! Entity resolver — raw comparison titles → canonical, slugged references.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::catalog::MetadataCatalog;
use calibra_core::{slugify, RawComparison, ResolvedComparison};

/// Resolves comparison titles against the catalog with bounded fan-out.
pub struct EntityResolver {
    catalog: Arc<dyn MetadataCatalog>,
    concurrency: usize,
}

impl EntityResolver {
    pub fn new(catalog: Arc<dyn MetadataCatalog>, concurrency: usize) -> Self {
        Self {
            catalog,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve every entry concurrently, keeping input order.
    ///
    /// Entries that fail or find no film/series match are dropped; one failure
    /// never affects the others.
    pub async fn resolve(&self, raw: &[RawComparison]) -> Vec<ResolvedComparison> {
        // Materialised so the returned future stays Send.
        let lookups: Vec<_> = raw.iter().map(|r| self.resolve_one(r)).collect();
        let resolved: Vec<ResolvedComparison> = stream::iter(lookups)
            .buffered(self.concurrency)
            .filter_map(|r| async move { r })
            .collect()
            .await;

        debug!("Resolved {}/{} comparisons", resolved.len(), raw.len());
        resolved
    }

    async fn resolve_one(&self, raw: &RawComparison) -> Option<ResolvedComparison> {
        match self.catalog.search(&raw.title, raw.year_hint).await {
            Ok(Some(identity)) => Some(ResolvedComparison {
                slug: slugify(&identity.title, identity.year),
                display_title: identity.title,
                source_title: raw.title.clone(),
                external_id: identity.external_id,
                media_type: identity.media_type,
                year: identity.year,
                phrase: raw.phrase.clone(),
            }),
            Ok(None) => {
                debug!("Dropping unresolved comparison {:?}", raw.title);
                None
            }
            Err(e) => {
                warn!("Comparison lookup for {:?} failed, dropping: {}", raw.title, e);
                None
            }
        }
    }
}
