use log::info;
use std::path::{Path, PathBuf};

use crate::operating_system::{FileMode, OperatingSystem};
use crate::Result;

pub const RECOVERY_FILE_NAME: &str = "recovery.conf";

/// Restored backups always continue the timeline they were taken on.
pub const RECOVERY_TARGET_TIMELINE: u32 = 1;

/// Contents of `recovery.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    pub target_name: String,
    pub target_timeline: u32,
    /// Command the server runs to fetch an archived WAL segment
    pub restore_command: Option<String>,
}

/// Escapes a value for a single-quoted PostgreSQL configuration string.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl RecoveryConfig {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            target_timeline: RECOVERY_TARGET_TIMELINE,
            restore_command: None,
        }
    }

    /// Replays WAL segments copied out of `wal_archive_dir`.
    pub fn with_wal_archive(mut self, wal_archive_dir: &Path) -> Self {
        self.restore_command = Some(format!(
            "cp {} \"%p\"",
            wal_archive_dir.join("%f").display()
        ));
        self
    }

    pub fn render(&self) -> String {
        let mut conf = format!("recovery_target_name = {}\n", quote(&self.target_name));
        conf.push_str(&format!(
            "recovery_target_timeline = {}\n",
            quote(&self.target_timeline.to_string())
        ));
        if let Some(command) = &self.restore_command {
            conf.push_str(&format!("restore_command = {}\n", quote(command)));
        }
        conf
    }
}

/// Persists a [`RecoveryConfig`] into a data directory.
pub struct RecoveryConfigWriter<'a> {
    os: &'a dyn OperatingSystem,
}

impl<'a> RecoveryConfigWriter<'a> {
    pub fn new(os: &'a dyn OperatingSystem) -> Self {
        Self { os }
    }

    /// Writes `<data_dir>/recovery.conf` readable by `owner` only.
    pub async fn write(
        &self,
        config: &RecoveryConfig,
        data_dir: &Path,
        owner: &str,
    ) -> Result<PathBuf> {
        let recovery_file = data_dir.join(RECOVERY_FILE_NAME);
        self.os
            .write_file(&recovery_file, config.render().as_bytes())
            .await?;
        self.os
            .chmod(&recovery_file, FileMode::SET_USR_RW, false)
            .await?;
        self.os.chown(&recovery_file, owner, false).await?;

        info!(
            "Wrote {} targeting restore point {}",
            recovery_file.display(),
            config.target_name
        );
        Ok(recovery_file)
    }
}
