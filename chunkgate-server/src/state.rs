//! Shared gateway state built from configuration

use chrono::{DateTime, Utc};
use chunkgate_client::{HttpPathResolver, HttpSourceFetcher};
use chunkgate_core::*;
use chunkgate_engine::{
    spawn_idle_sweeper, DirectUploader, FjallObjectStorage, InMemorySessionStore, StorageEngine,
    SweepConfig, UploadOrchestrator,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything a request handler needs
pub struct AppState {
    pub orchestrator: Arc<UploadOrchestrator>,
    pub direct: DirectUploader,
    pub objects: FjallObjectStorage,
    pub max_body_bytes: usize,
    pub started_at: DateTime<Utc>,
    sweep: SweepConfig,
}

impl AppState {
    /// Open storage and wire the upload pipeline described by `config`
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)?;
        let engine = StorageEngine::new(&config.data_dir)?;
        info!("Storage engine opened at {}", config.data_dir.display());

        let objects = FjallObjectStorage::new(engine, config.public_base_url.clone());
        let storage = Arc::new(objects.clone());
        let bucket = config.bucket_id()?;

        let mut orchestrator = UploadOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            storage.clone(),
            bucket.clone(),
            &config.temp_root,
        )?;
        let mut direct = DirectUploader::new(storage, bucket, &config.temp_root)?
            .with_source_fetcher(Arc::new(
                HttpSourceFetcher::new().with_timeout(config.download_timeout()),
            ));

        if let Some(url) = &config.path_service_url {
            let resolver: Arc<dyn PathResolver> = Arc::new(
                HttpPathResolver::new(url)?.with_timeout(config.path_service_timeout()),
            );
            orchestrator = orchestrator.with_path_resolver(resolver.clone());
            direct = direct.with_path_resolver(resolver);
            info!("Path service configured at {}", url);
        } else {
            info!("No path service configured, path payloads will be rejected");
        }

        Ok(AppState {
            orchestrator: Arc::new(orchestrator),
            direct,
            objects,
            max_body_bytes: config.max_body_bytes,
            started_at: Utc::now(),
            sweep: SweepConfig {
                interval: config.sweep_interval(),
                max_idle: config.session_idle_timeout(),
            },
        })
    }

    /// Start expiring abandoned sessions in the background
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        spawn_idle_sweeper(self.orchestrator.clone(), self.sweep.clone())
    }
}
