//! PostgreSQL service lifecycle as seen by the restore strategies.

use async_trait::async_trait;
use common::config::PostgresqlConfig;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use crate::operating_system::OperatingSystem;
use crate::{RestoreError, Result};

#[async_trait]
pub trait PgApp: Send + Sync {
    fn data_dir(&self) -> &Path;

    /// Directory the server's `restore_command` copies archived WAL from.
    fn wal_archive_dir(&self) -> &Path;

    /// Service account owning the data directory.
    fn owner(&self) -> &str;

    async fn stop_db(&self) -> Result<()>;

    /// Empties the WAL archive directory, recreating it owned by [`PgApp::owner`].
    async fn recreate_wal_archive_dir(&self) -> Result<()>;
}

/// Controls the local PostgreSQL service through a configured shell command.
pub struct SystemPgApp {
    data_dir: PathBuf,
    wal_archive_dir: PathBuf,
    owner: String,
    stop_command: String,
    os: Arc<dyn OperatingSystem>,
}

impl SystemPgApp {
    pub fn new(config: &PostgresqlConfig, os: Arc<dyn OperatingSystem>) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            wal_archive_dir: config.wal_archive_dir.clone(),
            owner: config.owner.clone(),
            stop_command: config.stop_command.clone(),
            os,
        }
    }
}

#[async_trait]
impl PgApp for SystemPgApp {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn wal_archive_dir(&self) -> &Path {
        &self.wal_archive_dir
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn stop_db(&self) -> Result<()> {
        info!("Stopping PostgreSQL: {}", self.stop_command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.stop_command)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Failed to stop PostgreSQL: {}", stderr.trim());
            return Err(RestoreError::CommandFailed(format!(
                "{} ({}): {}",
                self.stop_command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn recreate_wal_archive_dir(&self) -> Result<()> {
        self.os.remove(&self.wal_archive_dir).await?;
        self.os
            .create_directory(&self.wal_archive_dir, &self.owner)
            .await
    }
}
