use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::PgApp;
use crate::operating_system::{FileMode, OperatingSystem};
use crate::restore::command::{as_owner, quote_path};
use crate::restore::recovery::{RecoveryConfig, RecoveryConfigWriter};
use crate::restore::{RestoreCommand, RestoreRunner, RestoreStrategy, StrategyKind};
use crate::Result;

/// Restores a `pg_basebackup` tar archive over an emptied data directory.
pub struct PgBaseBackup {
    pub(crate) runner: RestoreRunner,
    pub(crate) app: Arc<dyn PgApp>,
    pub(crate) os: Arc<dyn OperatingSystem>,
    restore_cmd: RestoreCommand,
}

impl PgBaseBackup {
    pub fn new(runner: RestoreRunner, app: Arc<dyn PgApp>, os: Arc<dyn OperatingSystem>) -> Self {
        let base_restore_cmd = as_owner(
            app.owner(),
            runner.options().use_sudo,
            &format!("tar xCf {} -", quote_path(app.data_dir())),
        );
        let restore_cmd = runner.command(base_restore_cmd);
        Self {
            runner,
            app,
            os,
            restore_cmd,
        }
    }

    /// Extracts a full archive into the data directory.
    pub fn restore_command(&self) -> &RestoreCommand {
        &self.restore_cmd
    }

    pub fn runner(&self) -> &RestoreRunner {
        &self.runner
    }

    /// Writes `recovery.conf` for the target backup's label. With `restore`
    /// set, the server fetches archived WAL from the WAL archive directory.
    pub async fn write_recovery_file(&self, restore: bool) -> Result<PathBuf> {
        let metadata = self.runner.metadata(self.runner.backup()).await?;
        let mut config = RecoveryConfig::new(metadata.label);
        if restore {
            config = config.with_wal_archive(self.app.wal_archive_dir());
        }

        RecoveryConfigWriter::new(self.os.as_ref())
            .write(&config, self.app.data_dir(), self.app.owner())
            .await
    }
}

#[async_trait]
impl RestoreStrategy for PgBaseBackup {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PgBaseBackup
    }

    async fn pre_restore(&self) -> Result<()> {
        self.app.stop_db().await?;
        info!("Preparing WAL archive dir");
        self.app.recreate_wal_archive_dir().await?;

        let data_dir = self.app.data_dir();
        info!("Recreating data directory {}", data_dir.display());
        self.os.remove(data_dir).await?;
        self.os.create_directory(data_dir, self.app.owner()).await
    }

    async fn run_restore(&self) -> Result<u64> {
        self.runner
            .unpack(self.runner.backup(), &self.restore_cmd)
            .await
    }

    async fn post_restore(&self) -> Result<()> {
        self.os
            .chmod(self.app.data_dir(), FileMode::SET_USR_RWX, true)
            .await
    }
}
