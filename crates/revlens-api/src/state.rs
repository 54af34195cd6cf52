//! Application state wiring all services together.
//!
//! The core services are generic over their ports; AppState pins them to
//! the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use revlens_core::ai::{AiOrchestrationService, GenerationSettings};
use revlens_core::cache::ReviewCacheService;
use revlens_core::credential::CredentialChain;
use revlens_core::review::ReviewWorkflow;
use revlens_infra::config::{load_global_config, resolve_data_dir};
use revlens_infra::filesystem::SnapshotDirHost;
use revlens_infra::keychain::KeyringCredentialStore;
use revlens_infra::llm::ConfiguredClientFactory;
use revlens_infra::secret::build_credential_chain;
use revlens_infra::sqlite::kv::SqliteKvStore;
use revlens_infra::sqlite::pool::DatabasePool;
use revlens_types::config::GlobalConfig;

pub type ConcreteCache = ReviewCacheService<SqliteKvStore>;

pub type ConcreteWorkflow = ReviewWorkflow<SqliteKvStore, SnapshotDirHost, ConfiguredClientFactory>;

/// Shared application state used by every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ConcreteWorkflow>,
    pub cache: Arc<ConcreteCache>,
    pub store: Arc<SqliteKvStore>,
    pub credentials: CredentialChain,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open the database and wire the services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;

        let db_pool = DatabasePool::open_in(&data_dir)
            .await
            .context("failed to open the session cache database")?;
        let store = Arc::new(SqliteKvStore::new(db_pool));
        let cache = Arc::new(ReviewCacheService::new(Arc::clone(&store), config.cache));

        let credentials = build_credential_chain(Some(KeyringCredentialStore::new()), true);
        let factory = ConfiguredClientFactory::new(config.model.clone(), credentials.clone());
        let ai = AiOrchestrationService::new(
            Arc::new(factory),
            GenerationSettings::from(&config.model),
        );

        let workflow = ReviewWorkflow::new(
            Arc::clone(&cache),
            Arc::new(SnapshotDirHost::in_data_dir(&data_dir)),
            Arc::new(ai),
        );

        tracing::debug!(
            data_dir = %data_dir.display(),
            cache_cap = config.cache.cache_cap,
            recency_cap = config.cache.recency_cap,
            "application state ready"
        );

        Ok(Self {
            workflow: Arc::new(workflow),
            cache,
            store,
            credentials,
            config,
            data_dir,
        })
    }
}
