use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::PathBuf;

use common::config::{load_config, render_config, AgentConfig};
use storage::BackupDescriptor;

use crate::manager::PostgresRestoreManager;
use crate::restore::StrategyKind;

fn agent_config(path: Option<PathBuf>) -> Result<AgentConfig> {
    load_config(path.as_deref()).context("Failed to load configuration")
}

pub async fn restore(
    strategy: String,
    location: String,
    checksum: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let kind: StrategyKind = strategy.parse()?;
    let config = agent_config(config)?;
    let manager = PostgresRestoreManager::from_config(&config).await?;

    let record = manager
        .restore(kind, BackupDescriptor::new(location, checksum))
        .await
        .map_err(|e| anyhow!("Restore failed: {e}"))?;

    info!(
        "Restore {} finished, {} bytes restored",
        record.id,
        record.bytes_restored.unwrap_or_default()
    );
    Ok(())
}

pub async fn show_chain(location: String, checksum: String, config: Option<PathBuf>) -> Result<()> {
    let config = agent_config(config)?;
    let manager = PostgresRestoreManager::from_config(&config).await?;
    let chain = manager
        .show_chain(&BackupDescriptor::new(location, checksum))
        .await?;

    for (depth, layer) in chain.layers().iter().enumerate() {
        let kind = if layer.metadata.is_full() {
            "full"
        } else {
            "incremental"
        };
        println!(
            "{depth}\t{kind}\t{}\t{}\t{}",
            layer.metadata.label, layer.backup.location, layer.backup.checksum
        );
    }
    Ok(())
}

pub async fn show_config(config: Option<PathBuf>) -> Result<()> {
    let config = agent_config(config)?;
    print!("{}", render_config(&config)?);
    Ok(())
}
