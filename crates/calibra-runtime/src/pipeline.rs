//! Generation pipeline — identity → cache gate → stream → extract → resolve → persist.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use calibra_core::{CanonicalIdentity, Card, Error, GenerationRequest, NewCard, Result};
use calibra_generate::{build_prompt, CommittedStream, PromptSubject, ProviderOrchestrator};
use calibra_resolve::{EntityResolver, MetadataCatalog};
use calibra_store::SqliteStore;

use crate::inflight::{InFlightGuard, InFlightLocks};
use crate::types::*;

/// Coordinates one card generation end to end.
pub struct Pipeline {
    store: Arc<SqliteStore>,
    catalog: Arc<dyn MetadataCatalog>,
    resolver: Arc<EntityResolver>,
    orchestrator: RwLock<Arc<ProviderOrchestrator>>,
    in_flight: InFlightLocks,
}

impl Pipeline {
    pub fn new(
        store: Arc<SqliteStore>,
        catalog: Arc<dyn MetadataCatalog>,
        orchestrator: ProviderOrchestrator,
        resolve_concurrency: usize,
    ) -> Self {
        let resolver = Arc::new(EntityResolver::new(catalog.clone(), resolve_concurrency));
        Self {
            store,
            catalog,
            resolver,
            orchestrator: RwLock::new(Arc::new(orchestrator)),
            in_flight: InFlightLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Current orchestrator. Requests already streaming keep the one they started with.
    pub fn orchestrator(&self) -> Arc<ProviderOrchestrator> {
        self.orchestrator.read().clone()
    }

    /// Swap in a rebuilt orchestrator after a provider config change.
    pub fn set_orchestrator(&self, orchestrator: ProviderOrchestrator) {
        info!("Provider order is now {:?}", orchestrator.provider_ids());
        *self.orchestrator.write() = Arc::new(orchestrator);
    }

    /// Cache gate: the stored card for a canonical id, if any.
    pub fn lookup(&self, external_id: &str) -> Result<Option<Card>> {
        self.store.get_by_external_id(external_id)
    }

    /// Start a generation.
    ///
    /// Returns the stored card on a cache hit unless `regenerate` is set.
    /// Otherwise commits to a backend before returning, so provider exhaustion
    /// surfaces here and never after output has begun.
    pub async fn begin(
        &self,
        request: &GenerationRequest,
        regenerate: bool,
        cancel: CancellationToken,
    ) -> Result<Generation> {
        request.validate()?;

        let subject = self.identify(request).await?;

        let guard = match &subject {
            Subject::Identified(identity) => {
                let guard = self.in_flight.acquire(&identity.external_id).await;
                if !regenerate {
                    if let Some(card) = self.lookup(&identity.external_id)? {
                        debug!("Cache hit for {}", identity.external_id);
                        return Ok(Generation::Cached(card));
                    }
                }
                Some(guard)
            }
            Subject::TitleOnly { .. } => None,
        };

        let prompt = match &subject {
            Subject::Identified(identity) => build_prompt(&PromptSubject {
                title: &identity.title,
                year: identity.year,
                media_type: Some(identity.media_type),
                genres: &identity.genres,
            }),
            Subject::TitleOnly { title, media_type } => build_prompt(&PromptSubject {
                title,
                year: None,
                media_type: *media_type,
                genres: &[],
            }),
        };

        let orchestrator = self.orchestrator();
        let committed = orchestrator
            .open(&prompt, request.preferred_provider.as_deref())
            .await?;

        let meta = GenerationMeta::live(committed.provider(), &subject);
        info!(
            "Generating '{}' with {} (regenerate={})",
            meta.title,
            committed.provider(),
            regenerate
        );

        let events = self.drive(committed, subject, guard, cancel);
        Ok(Generation::Live(LiveGeneration { meta, events }))
    }

    /// Regenerate a stored card, bypassing the cache gate.
    pub async fn regenerate(
        &self,
        external_id: &str,
        preferred_provider: Option<String>,
        cancel: CancellationToken,
    ) -> Result<Generation> {
        let request = GenerationRequest {
            external_id: Some(external_id.to_string()),
            preferred_provider,
            ..Default::default()
        };
        self.begin(&request, true, cancel).await
    }

    /// Resolve the canonical identity, degrading to title-only when the
    /// catalog cannot answer and a title is available.
    async fn identify(&self, request: &GenerationRequest) -> Result<Subject> {
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let lookup = match request.external_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self.identity_by_id(id, request).await,
            None => match title {
                Some(t) => self.catalog.search(t, None).await.and_then(|hit| match hit {
                    Some(identity) => Ok(Some(identity)),
                    None => Err(Error::MetadataLookup(format!("no film or series matches '{}'", t))),
                }),
                None => Err(Error::InvalidRequest("either title or externalId is required".into())),
            },
        };

        let lookup = match lookup {
            // Search hits lack details such as genres.
            Ok(Some(identity)) if identity.genres.is_empty() => Ok(Some(self.with_details(identity).await)),
            other => other,
        };

        match (lookup, title) {
            (Ok(Some(identity)), _) => Ok(Subject::Identified(identity)),
            (Ok(None), Some(t)) | (Err(Error::MetadataLookup(_)), Some(t)) => {
                warn!("No canonical identity for '{}', generating title-only", t);
                Ok(Subject::TitleOnly {
                    title: t.to_string(),
                    media_type: request.media_type,
                })
            }
            (Ok(None), None) => Err(Error::MetadataLookup(format!(
                "unknown externalId '{}'",
                request.external_id.as_deref().unwrap_or_default()
            ))),
            (Err(e), _) => Err(e),
        }
    }

    async fn identity_by_id(&self, id: &str, request: &GenerationRequest) -> Result<Option<CanonicalIdentity>> {
        // A stored card already carries its canonical identity.
        if let Some(card) = self.store.get_by_external_id(id)? {
            return Ok(Some(CanonicalIdentity {
                external_id: card.external_id,
                title: card.title,
                year: card.year,
                media_type: card.media_type,
                poster_ref: card.poster_ref,
                genres: card.genres,
            }));
        }
        self.catalog.get_by_id(id, request.media_type).await
    }

    async fn with_details(&self, identity: CanonicalIdentity) -> CanonicalIdentity {
        let details = self
            .catalog
            .get_by_id(&identity.external_id, Some(identity.media_type))
            .await;
        match details {
            Ok(Some(detailed)) => detailed,
            Ok(None) => identity,
            Err(e) => {
                debug!("Details for {} unavailable: {}", identity.external_id, e);
                identity
            }
        }
    }

    fn drive(
        &self,
        mut committed: CommittedStream,
        subject: Subject,
        guard: Option<InFlightGuard>,
        cancel: CancellationToken,
    ) -> EventStream {
        let store = self.store.clone();
        let resolver = self.resolver.clone();

        Box::pin(async_stream::stream! {
            let _guard = guard;
            let provider = committed.provider().to_string();
            let mut body = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Generation with {} cancelled after {} bytes", provider, body.len());
                        return;
                    }
                    next = committed.next_fragment() => next,
                };

                match next {
                    Ok(Some(fragment)) => {
                        body.push_str(&fragment);
                        yield GenerationEvent::Fragment(fragment);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Generation aborted mid-stream: {}", e);
                        yield GenerationEvent::Failed(e.to_string());
                        return;
                    }
                }
            }

            if cancel.is_cancelled() {
                return;
            }

            let extraction = calibra_extract::extract(&body);
            debug!(
                "Extracted {} comparisons, sentence={}",
                extraction.comparisons.len(),
                extraction.calibration_sentence.is_some()
            );

            let comparisons = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                resolved = resolver.resolve(&extraction.comparisons) => resolved,
            };

            let result = match subject {
                Subject::Identified(identity) => {
                    let card = NewCard {
                        slug: calibra_core::slugify(&identity.title, identity.year),
                        external_id: identity.external_id,
                        title: identity.title,
                        year: identity.year,
                        media_type: identity.media_type,
                        poster_ref: identity.poster_ref,
                        genres: identity.genres,
                        body_text: body,
                        calibration_sentence: extraction.calibration_sentence,
                        comparisons,
                        provider: provider.clone(),
                    };
                    persist(&store, card)
                }
                Subject::TitleOnly { title, .. } => GenerationResult {
                    card_id: None,
                    external_id: None,
                    slug: calibra_core::slugify(&title, None),
                    provider: provider.clone(),
                    calibration_sentence: extraction.calibration_sentence,
                    comparisons,
                    persisted: false,
                    cached: false,
                },
            };

            yield GenerationEvent::Completed(result);
        })
    }
}

/// Persistence writer. Failures are logged and reported, never raised.
fn persist(store: &SqliteStore, card: NewCard) -> GenerationResult {
    match store.upsert_card(&card) {
        Ok(stored) => {
            info!("Persisted card {} ({})", stored.id, stored.slug);
            GenerationResult::from_card(&stored, false)
        }
        Err(e) => {
            error!("Failed to persist card {}: {}", card.external_id, e);
            GenerationResult {
                card_id: None,
                external_id: Some(card.external_id),
                slug: card.slug,
                provider: card.provider,
                calibration_sentence: card.calibration_sentence,
                comparisons: card.comparisons,
                persisted: false,
                cached: false,
            }
        }
    }
}
