use async_trait::async_trait;
use log::info;

use crate::restore::{RestoreCommand, RestoreRunner, RestoreStrategy, StrategyKind};
use crate::Result;

/// Replays a `pg_dump` script through `psql`.
///
/// `psql` reports benign errors on stderr when the dump recreates objects that
/// already exist on an initialized cluster; the runner's ignored patterns
/// decide which of those are acceptable.
pub struct PgDump {
    runner: RestoreRunner,
    restore_cmd: RestoreCommand,
}

impl PgDump {
    pub fn new(runner: RestoreRunner) -> Self {
        let restore_cmd = runner.command(runner.options().psql_command.clone());
        Self {
            runner,
            restore_cmd,
        }
    }

    pub fn restore_command(&self) -> &RestoreCommand {
        &self.restore_cmd
    }
}

#[async_trait]
impl RestoreStrategy for PgDump {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PgDump
    }

    async fn run_restore(&self) -> Result<u64> {
        info!("Replaying dump {}", self.runner.backup().location);
        self.runner
            .unpack(self.runner.backup(), &self.restore_cmd)
            .await
    }
}
