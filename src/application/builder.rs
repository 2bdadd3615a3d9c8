use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api::router::AppState;
use crate::application::{
    engine::{DeduplicationEngine, EngineConfig, RetryPolicy},
    gc::{OrphanSweeper, SweepConfig},
    ports::{BlobStore, DedupRepository, UploadValidator},
    use_cases::{DownloadFileUseCase, GetFileUseCase, ListFilesUseCase},
    validation::UploadPolicy,
};
use crate::config::{Config, MetadataBackend};
use crate::infrastructure::{
    persistence::{InMemoryDedupRepository, PostgresDedupRepository},
    storage::LocalFilesystemStore,
};

/// Application builder for clean dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    pool: Option<sqlx::PgPool>,
    repository: Option<Arc<dyn DedupRepository>>,
    blob_store: Option<Arc<dyn BlobStore>>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pool: None,
            repository: None,
            blob_store: None,
        }
    }

    /// Connect to Postgres (with retries) and run migrations.
    ///
    /// Does nothing when the in-memory metadata backend is configured.
    pub async fn with_database(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        if self.config.metadata_backend == MetadataBackend::Memory {
            info!("Using in-memory metadata backend; state is lost on restart");
            return Ok(self);
        }

        info!("Connecting to database");

        // Retry connection with exponential backoff
        let mut retries = 3;
        let mut delay = Duration::from_secs(1);
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(self.config.db_max_connections)
                .min_connections(self.config.db_min_connections)
                .acquire_timeout(Duration::from_secs(self.config.db_acquire_timeout_secs))
                .idle_timeout(Some(Duration::from_secs(self.config.db_idle_timeout_secs)))
                .max_lifetime(Some(Duration::from_secs(self.config.db_max_lifetime_secs)))
                .connect(&self.config.database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        "Database connection failed, retrying in {:?} ({} retries left): {}",
                        delay,
                        retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!("Failed to connect to database after retries: {}", e);
                    return Err(Box::new(e));
                }
            }
        };

        info!(
            "Database pool configured: max={}, min={}, acquire_timeout={}s, idle_timeout={}s, max_lifetime={}s",
            self.config.db_max_connections,
            self.config.db_min_connections,
            self.config.db_acquire_timeout_secs,
            self.config.db_idle_timeout_secs,
            self.config.db_max_lifetime_secs
        );

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;

        self.pool = Some(pool);
        Ok(self)
    }

    /// Initialize infrastructure layer (metadata repository and byte storage)
    pub async fn with_infrastructure(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        let repository: Arc<dyn DedupRepository> = match self.config.metadata_backend {
            MetadataBackend::Memory => Arc::new(InMemoryDedupRepository::new()),
            MetadataBackend::Postgres => {
                let pool = self.pool.as_ref().ok_or("Database pool not initialized")?;
                Arc::new(PostgresDedupRepository::with_lock_timeout(
                    pool.clone(),
                    Duration::from_millis(self.config.lock_timeout_ms),
                ))
            }
        };

        let blob_store = LocalFilesystemStore::with_durability(
            self.config.storage_root.clone(),
            self.config.durable_writes,
        );
        blob_store.init().await?;
        info!(root = ?self.config.storage_root, "Blob storage initialized");

        self.repository = Some(repository);
        self.blob_store = Some(Arc::new(blob_store));

        info!("Infrastructure layer initialized");
        Ok(self)
    }

    /// Use an already constructed repository and store (tests, tools)
    pub fn with_components(
        mut self,
        repository: Arc<dyn DedupRepository>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        self.repository = Some(repository);
        self.blob_store = Some(blob_store);
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_upload_bytes: self.config.max_upload_bytes,
            retry: RetryPolicy::new(
                self.config.max_transaction_attempts,
                Duration::from_millis(self.config.retry_base_delay_ms),
            ),
        }
    }

    /// Build application state with the engine and all use cases
    pub fn build(&self) -> Result<AppState, Box<dyn std::error::Error>> {
        let repository = self
            .repository
            .as_ref()
            .ok_or("Repository not initialized")?;
        let blob_store = self
            .blob_store
            .as_ref()
            .ok_or("Blob store not initialized")?;

        let validator: Arc<dyn UploadValidator> =
            Arc::new(UploadPolicy::new(self.config.allowed_extensions.clone()));

        let engine = Arc::new(DeduplicationEngine::new(
            Arc::clone(repository),
            Arc::clone(blob_store),
            validator,
            self.engine_config(),
        ));

        let list_use_case = Arc::new(ListFilesUseCase::new(Arc::clone(repository)));
        let get_use_case = Arc::new(GetFileUseCase::new(Arc::clone(repository)));
        let download_use_case = Arc::new(DownloadFileUseCase::new(
            Arc::clone(repository),
            Arc::clone(blob_store),
        ));

        info!("Application layer initialized");

        Ok(AppState {
            engine,
            list_use_case,
            get_use_case,
            download_use_case,
            repository: Arc::clone(repository),
            config: self.config.clone(),
        })
    }

    /// Get orphan sweeper instance
    pub fn build_sweeper(&self) -> Result<Arc<OrphanSweeper>, Box<dyn std::error::Error>> {
        let repository = self
            .repository
            .as_ref()
            .ok_or("Repository not initialized")?;
        let blob_store = self
            .blob_store
            .as_ref()
            .ok_or("Blob store not initialized")?;

        Ok(Arc::new(OrphanSweeper::new(
            Arc::clone(repository),
            Arc::clone(blob_store),
            SweepConfig::new(
                Duration::from_secs(self.config.sweep_interval_secs),
                Duration::from_secs(self.config.sweep_grace_secs),
                self.config.sweep_batch_size,
            ),
        )))
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
