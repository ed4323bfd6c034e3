use log::{error, info};
use std::sync::Arc;

use common::config::{AgentConfig, StorageConfig};
use storage::{BackupDescriptor, BackupStorage, LocalStorage, PostgresBackupStorage, StorageProviderType};

use crate::app::{PgApp, SystemPgApp};
use crate::common::Restore;
use crate::operating_system::{HostOs, OperatingSystem};
use crate::restore::{
    BackupChain, ChainResolver, RestoreOptions, RestoreRunner, RestoreStrategy,
    RestoreStrategyFactory, StrategyKind,
};
use crate::{RestoreError, Result};

/// Opens the backup storage described by `config`.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn BackupStorage>> {
    let provider_type: StorageProviderType = config.provider.parse()?;
    match provider_type {
        StorageProviderType::Local => {
            let root = config.root.clone().ok_or_else(|| {
                RestoreError::Config("storage.root is required for local storage".to_string())
            })?;
            info!("Using local backup storage at {}", root.display());
            Ok(Arc::new(LocalStorage::new(root)))
        }
        StorageProviderType::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                RestoreError::Config("storage.bucket is required for s3 storage".to_string())
            })?;
            info!("Using S3 backup storage in bucket {bucket}");
            let storage = PostgresBackupStorage::new(
                provider_type,
                bucket,
                config.prefix.clone(),
                config.region.clone(),
                config.endpoint.clone(),
                config.access_key.clone(),
                config.secret_key.clone(),
            )
            .await?;
            Ok(Arc::new(storage))
        }
    }
}

/// Entry point for restores on the local node.
pub struct PostgresRestoreManager {
    storage: Arc<dyn BackupStorage>,
    app: Arc<dyn PgApp>,
    os: Arc<dyn OperatingSystem>,
    options: RestoreOptions,
}

impl PostgresRestoreManager {
    pub fn new(
        storage: Arc<dyn BackupStorage>,
        app: Arc<dyn PgApp>,
        os: Arc<dyn OperatingSystem>,
        options: RestoreOptions,
    ) -> Self {
        Self {
            storage,
            app,
            os,
            options,
        }
    }

    /// Wires the configured storage backend, host and PostgreSQL service.
    pub async fn from_config(config: &AgentConfig) -> Result<Self> {
        let storage = build_storage(&config.storage).await?;
        let os: Arc<dyn OperatingSystem> = Arc::new(HostOs::new(config.restore.use_sudo));
        let app: Arc<dyn PgApp> = Arc::new(SystemPgApp::new(&config.postgresql, os.clone()));
        Ok(Self::new(storage, app, os, RestoreOptions::from(&config.restore)))
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    /// Restores `backup` with the strategy `kind`.
    ///
    /// The returned record is also logged as JSON, whether the restore
    /// succeeded or not.
    pub async fn restore(&self, kind: StrategyKind, backup: BackupDescriptor) -> Result<Restore> {
        info!("Starting {kind} restore of {backup}");
        let mut record = Restore::new(kind.name(), backup.clone());

        match self.run(kind, backup).await {
            Ok(bytes) => {
                record.complete(bytes);
                log_record(&record);
                info!("Restore {} completed: {bytes} bytes", record.id);
                Ok(record)
            }
            Err(e) => {
                record.fail(e.to_string());
                log_record(&record);
                error!("Restore {} failed: {e}", record.id);
                Err(e)
            }
        }
    }

    async fn run(&self, kind: StrategyKind, backup: BackupDescriptor) -> Result<u64> {
        let runner = RestoreRunner::new(self.storage.clone(), backup, self.options.clone())?;
        let strategy =
            RestoreStrategyFactory::create(kind, runner, self.app.clone(), self.os.clone());
        strategy.restore().await
    }

    /// Resolves the chain `backup` belongs to without touching the host.
    pub async fn show_chain(&self, backup: &BackupDescriptor) -> Result<BackupChain> {
        ChainResolver::new(self.storage.as_ref())
            .resolve(backup)
            .await
    }
}

fn log_record(record: &Restore) {
    match serde_json::to_string(record) {
        Ok(json) => info!("{json}"),
        Err(e) => error!("Failed to serialize restore record {}: {e}", record.id),
    }
}
