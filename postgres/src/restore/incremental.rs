use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::PgApp;
use crate::operating_system::OperatingSystem;
use crate::restore::chain::{ChainLayer, ChainResolver};
use crate::restore::command::{as_owner, quote_path};
use crate::restore::pg_basebackup::PgBaseBackup;
use crate::restore::{RestoreCommand, RestoreRunner, RestoreStrategy, StrategyKind};
use crate::Result;

/// State of one incremental restore.
#[derive(Debug, Clone)]
pub struct RestoreContext {
    pub data_dir: PathBuf,
    pub wal_archive_dir: PathBuf,
    pub owner: String,
    pub full_restore_cmd: RestoreCommand,
    pub incr_restore_cmd: RestoreCommand,
    /// Bytes streamed so far over all applied layers
    pub content_length: u64,
}

/// Restores a chain of backups: the full base backup into the data directory,
/// then every later layer's WAL archive into the WAL archive directory.
pub struct PgBaseBackupIncremental {
    base: PgBaseBackup,
    incr_restore_cmd: RestoreCommand,
}

impl PgBaseBackupIncremental {
    pub fn new(runner: RestoreRunner, app: Arc<dyn PgApp>, os: Arc<dyn OperatingSystem>) -> Self {
        let base_incr_cmd = as_owner(
            app.owner(),
            runner.options().use_sudo,
            &format!("tar -xf - -C {}", quote_path(app.wal_archive_dir())),
        );
        let incr_restore_cmd = runner.command(base_incr_cmd);
        Self {
            base: PgBaseBackup::new(runner, app, os),
            incr_restore_cmd,
        }
    }

    /// Extracts an incremental layer into the WAL archive directory.
    pub fn incremental_restore_command(&self) -> &RestoreCommand {
        &self.incr_restore_cmd
    }

    pub fn base(&self) -> &PgBaseBackup {
        &self.base
    }

    fn context(&self) -> RestoreContext {
        RestoreContext {
            data_dir: self.base.app.data_dir().to_path_buf(),
            wal_archive_dir: self.base.app.wal_archive_dir().to_path_buf(),
            owner: self.base.app.owner().to_string(),
            full_restore_cmd: self.base.restore_command().clone(),
            incr_restore_cmd: self.incr_restore_cmd.clone(),
            content_length: 0,
        }
    }

    async fn restore_full_layer(&self, layer: &ChainLayer, ctx: &mut RestoreContext) -> Result<()> {
        info!(
            "Restoring full backup {} ({}) into {}",
            layer.backup.location,
            layer.metadata.label,
            ctx.data_dir.display()
        );
        let location = &layer.backup.location;
        self.base
            .pre_restore()
            .await
            .map_err(|e| e.in_layer(location))?;
        ctx.content_length += self
            .base
            .runner
            .unpack(&layer.backup, &ctx.full_restore_cmd)
            .await
            .map_err(|e| e.in_layer(location))?;
        self.base
            .post_restore()
            .await
            .map_err(|e| e.in_layer(location))
    }

    async fn restore_incremental_layer(
        &self,
        layer: &ChainLayer,
        ctx: &mut RestoreContext,
    ) -> Result<()> {
        info!(
            "Applying incremental backup {} ({}) into {}",
            layer.backup.location,
            layer.metadata.label,
            ctx.wal_archive_dir.display()
        );
        ctx.content_length += self
            .base
            .runner
            .unpack(&layer.backup, &ctx.incr_restore_cmd)
            .await
            .map_err(|e| e.in_layer(&layer.backup.location))?;
        Ok(())
    }
}

#[async_trait]
impl RestoreStrategy for PgBaseBackupIncremental {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PgBaseBackupIncremental
    }

    /// Only stops the server; the data directory is prepared when the full
    /// backup at the root of the chain is restored.
    async fn pre_restore(&self) -> Result<()> {
        self.base.app.stop_db().await
    }

    async fn run_restore(&self) -> Result<u64> {
        let runner = &self.base.runner;
        let chain = ChainResolver::new(runner.storage())
            .resolve(runner.backup())
            .await?;

        let mut ctx = self.context();
        for layer in chain.layers() {
            if layer.metadata.is_full() {
                self.restore_full_layer(layer, &mut ctx).await?;
            } else {
                self.restore_incremental_layer(layer, &mut ctx).await?;
            }
        }

        info!(
            "Restored {} layer(s), {} bytes in total",
            chain.len(),
            ctx.content_length
        );
        Ok(ctx.content_length)
    }

    async fn post_restore(&self) -> Result<()> {
        self.base.write_recovery_file(true).await?;
        Ok(())
    }
}
