//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use calibra_core::CalibraConfig;
use calibra_generate::{ProviderConfig, ProviderOrchestrator};
use calibra_resolve::MetadataCatalog;
use calibra_runtime::Pipeline;
use calibra_store::SqliteStore;
use parking_lot::RwLock;
use tracing::info;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: CalibraConfig,
    pub store: Arc<SqliteStore>,
    pub pipeline: Pipeline,
    pub provider_config: RwLock<ProviderConfig>,
    pub http: reqwest::Client,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: CalibraConfig, store: Arc<SqliteStore>, catalog: Arc<dyn MetadataCatalog>) -> Self {
        let provider_config = ProviderConfig::load(&config.data_paths.provider_config_file);
        let http = reqwest::Client::new();
        let orchestrator = ProviderOrchestrator::from_config(&http, &provider_config, config.fragment_timeout());

        info!(
            "Providers: {:?}, fragment timeout {}ms",
            orchestrator.provider_ids(),
            config.fragment_timeout_ms
        );

        let pipeline = Pipeline::new(store.clone(), catalog, orchestrator, config.resolve_concurrency);

        Self {
            config,
            store,
            pipeline,
            provider_config: RwLock::new(provider_config),
            http,
            started_at: Instant::now(),
        }
    }

    /// Rebuild backends from the current provider config.
    pub fn rebuild_orchestrator(&self) {
        let orchestrator = {
            let config = self.provider_config.read();
            ProviderOrchestrator::from_config(&self.http, &config, self.config.fragment_timeout())
        };
        self.pipeline.set_orchestrator(orchestrator);
    }
}

/// State over a temp directory with one scripted backend and no catalog.
#[cfg(test)]
pub fn test_state(
    dir: &tempfile::TempDir,
    script: calibra_generate::testing::Script,
) -> (Arc<AppState>, Arc<calibra_generate::testing::ScriptedBackend>) {
    use calibra_generate::testing::ScriptedBackend;
    use calibra_generate::GenerationBackend;

    let config = CalibraConfig {
        port: 0,
        data_paths: calibra_core::DataPaths::new(dir.path()).unwrap(),
        fragment_timeout_ms: 100,
        resolve_concurrency: 2,
        catalog_api_key: None,
    };
    let store = Arc::new(SqliteStore::open(&config.data_paths.db).unwrap());
    let backend = Arc::new(ScriptedBackend::new("groq", script));
    let orchestrator = ProviderOrchestrator::new(
        vec![backend.clone() as Arc<dyn GenerationBackend>],
        config.fragment_timeout(),
    );
    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(calibra_resolve::NoopCatalog),
        orchestrator,
        config.resolve_concurrency,
    );

    let state = AppState {
        provider_config: RwLock::new(ProviderConfig {
            config_path: config.data_paths.provider_config_file.clone(),
            ..Default::default()
        }),
        config,
        store,
        pipeline,
        http: reqwest::Client::new(),
        started_at: Instant::now(),
    };
    (Arc::new(state), backend)
}
