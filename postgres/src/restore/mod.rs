pub mod chain;
pub mod classifier;
pub mod command;
pub mod executor;
pub mod incremental;
pub mod pg_basebackup;
pub mod pg_dump;
pub mod recovery;

use async_trait::async_trait;
use common::config::{RestoreConfig, DEFAULT_IGNORED_ERROR_PATTERN};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use storage::{BackupDescriptor, BackupMetadata, BackupStorage};

use crate::app::PgApp;
use crate::operating_system::OperatingSystem;
use crate::{RestoreError, Result};

pub use chain::{BackupChain, ChainLayer, ChainResolver};
pub use classifier::ErrorClassifier;
pub use command::RestoreCommand;
pub use executor::StreamingRestoreExecutor;
pub use incremental::{PgBaseBackupIncremental, RestoreContext};
pub use pg_basebackup::PgBaseBackup;
pub use pg_dump::PgDump;
pub use recovery::{RecoveryConfig, RecoveryConfigWriter};

/// Knobs shared by every restore strategy.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Archives are gzip compressed
    pub compressed: bool,
    /// Key for `openssl enc -d -aes-256-cbc`
    pub encryption_key: Option<String>,
    /// Extract as the PostgreSQL owner through `sudo -u`
    pub use_sudo: bool,
    /// Client that replays logical dumps from stdin
    pub psql_command: String,
    pub ignored_error_patterns: Vec<String>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            compressed: true,
            encryption_key: None,
            use_sudo: true,
            psql_command: "psql -U os_admin".to_string(),
            ignored_error_patterns: vec![DEFAULT_IGNORED_ERROR_PATTERN.to_string()],
        }
    }
}

impl From<&RestoreConfig> for RestoreOptions {
    fn from(config: &RestoreConfig) -> Self {
        Self {
            compressed: config.compressed,
            encryption_key: config.encryption_key.clone(),
            use_sudo: config.use_sudo,
            psql_command: config.psql_command.clone(),
            ignored_error_patterns: config.ignored_error_patterns.clone(),
        }
    }
}

/// Restore strategy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Logical dump replayed through `psql`
    PgDump,
    /// `pg_basebackup` tar archive of the data directory
    PgBaseBackup,
    /// Base backup plus a chain of WAL archives
    PgBaseBackupIncremental,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::PgDump => "pg_dump",
            StrategyKind::PgBaseBackup => "pg_basebackup",
            StrategyKind::PgBaseBackupIncremental => "pg_basebackup_incremental",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pg_dump" | "PgDump" => Ok(StrategyKind::PgDump),
            "pg_basebackup" | "PgBaseBackup" => Ok(StrategyKind::PgBaseBackup),
            "pg_basebackup_incremental" | "PgBaseBackupIncremental" => {
                Ok(StrategyKind::PgBaseBackupIncremental)
            }
            other => Err(RestoreError::UnknownStrategy(other.to_string())),
        }
    }
}

/// A way of restoring one backup onto the local node.
#[async_trait]
pub trait RestoreStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn pre_restore(&self) -> Result<()> {
        Ok(())
    }

    /// Streams the backup into the restore command(s); returns bytes transferred.
    async fn run_restore(&self) -> Result<u64>;

    async fn post_restore(&self) -> Result<()> {
        Ok(())
    }

    async fn restore(&self) -> Result<u64> {
        self.pre_restore().await?;
        let content_length = self.run_restore().await?;
        self.post_restore().await?;
        Ok(content_length)
    }
}

/// Storage access and process execution for one restore request.
pub struct RestoreRunner {
    storage: Arc<dyn BackupStorage>,
    backup: BackupDescriptor,
    options: RestoreOptions,
    executor: StreamingRestoreExecutor,
}

impl RestoreRunner {
    pub fn new(
        storage: Arc<dyn BackupStorage>,
        backup: BackupDescriptor,
        options: RestoreOptions,
    ) -> Result<Self> {
        let classifier = ErrorClassifier::new(&options.ignored_error_patterns)?;
        Ok(Self {
            storage,
            backup,
            options,
            executor: StreamingRestoreExecutor::new(classifier),
        })
    }

    /// The backup this restore targets.
    pub fn backup(&self) -> &BackupDescriptor {
        &self.backup
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    pub fn storage(&self) -> &dyn BackupStorage {
        self.storage.as_ref()
    }

    /// Wraps `base` with the decryption and decompression stages.
    pub fn command(&self, base: impl Into<String>) -> RestoreCommand {
        RestoreCommand::from_options(base, &self.options)
    }

    pub async fn metadata(&self, backup: &BackupDescriptor) -> Result<BackupMetadata> {
        chain::fetch_metadata(self.storage.as_ref(), backup).await
    }

    /// Streams `backup` from storage through `command`.
    pub async fn unpack(&self, backup: &BackupDescriptor, command: &RestoreCommand) -> Result<u64> {
        let stream = self.storage.load(backup).await?;
        self.executor.execute(stream, command).await
    }
}

/// Factory for creating restore strategies
pub struct RestoreStrategyFactory;

impl RestoreStrategyFactory {
    pub fn create_pg_dump(runner: RestoreRunner) -> PgDump {
        PgDump::new(runner)
    }

    pub fn create_pg_basebackup(
        runner: RestoreRunner,
        app: Arc<dyn PgApp>,
        os: Arc<dyn OperatingSystem>,
    ) -> PgBaseBackup {
        PgBaseBackup::new(runner, app, os)
    }

    pub fn create_pg_basebackup_incremental(
        runner: RestoreRunner,
        app: Arc<dyn PgApp>,
        os: Arc<dyn OperatingSystem>,
    ) -> PgBaseBackupIncremental {
        PgBaseBackupIncremental::new(runner, app, os)
    }

    /// Creates the strategy registered under `kind`.
    pub fn create(
        kind: StrategyKind,
        runner: RestoreRunner,
        app: Arc<dyn PgApp>,
        os: Arc<dyn OperatingSystem>,
    ) -> Box<dyn RestoreStrategy> {
        match kind {
            StrategyKind::PgDump => Box::new(Self::create_pg_dump(runner)),
            StrategyKind::PgBaseBackup => Box::new(Self::create_pg_basebackup(runner, app, os)),
            StrategyKind::PgBaseBackupIncremental => {
                Box::new(Self::create_pg_basebackup_incremental(runner, app, os))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for kind in [
            StrategyKind::PgDump,
            StrategyKind::PgBaseBackup,
            StrategyKind::PgBaseBackupIncremental,
        ] {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(
            "PgBaseBackupIncremental".parse::<StrategyKind>().unwrap(),
            StrategyKind::PgBaseBackupIncremental
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = "mysqldump".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, RestoreError::UnknownStrategy(name) if name == "mysqldump"));
    }
}
