//! Ancestry resolution for incremental backups.
//!
//! Every incremental backup records the `(location, checksum)` of the backup
//! it was taken on top of. Following those references from the target ends at
//! a full backup, the root of the chain. Restores apply the chain in the
//! opposite direction, root first.

use log::{debug, info};
use std::collections::HashSet;
use storage::{BackupDescriptor, BackupMetadata, BackupStorage, StorageError};

use crate::{RestoreError, Result};

/// One backup of a chain together with its parsed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLayer {
    pub backup: BackupDescriptor,
    pub metadata: BackupMetadata,
}

/// A resolved chain, ordered oldest (the full backup) to newest (the target).
#[derive(Debug, Clone)]
pub struct BackupChain {
    layers: Vec<ChainLayer>,
}

impl BackupChain {
    pub fn layers(&self) -> &[ChainLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Never true for a resolved chain.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The full backup the chain starts from.
    pub fn root(&self) -> Option<&ChainLayer> {
        self.layers.first()
    }

    /// Layers applied on top of the root, oldest first.
    pub fn increments(&self) -> &[ChainLayer] {
        self.layers.get(1..).unwrap_or_default()
    }

    pub fn target(&self) -> Option<&ChainLayer> {
        self.layers.last()
    }
}

/// Loads and parses the metadata of `backup`.
///
/// A backup without metadata is reported as a metadata error: it is either a
/// dangling parent reference or not a backup at all.
pub async fn fetch_metadata(
    storage: &dyn BackupStorage,
    backup: &BackupDescriptor,
) -> Result<BackupMetadata> {
    let raw = storage.load_metadata(backup).await.map_err(|e| match e {
        StorageError::NotFound(_) => {
            RestoreError::Metadata(format!("no backup found at {}", backup.location))
        }
        StorageError::InvalidMetadata(msg) | StorageError::Serialization(msg) => {
            RestoreError::Metadata(format!("unreadable metadata for {}: {msg}", backup.location))
        }
        other => RestoreError::Storage(other),
    })?;

    BackupMetadata::parse(&backup.location, &raw).map_err(|e| match e {
        StorageError::InvalidMetadata(msg) => RestoreError::Metadata(msg),
        other => RestoreError::Storage(other),
    })
}

pub struct ChainResolver<'a> {
    storage: &'a dyn BackupStorage,
}

impl<'a> ChainResolver<'a> {
    pub fn new(storage: &'a dyn BackupStorage) -> Self {
        Self { storage }
    }

    /// Walks parent references from `target` down to its full backup.
    ///
    /// Fails with [`RestoreError::Metadata`] if a reference is dangling or the
    /// walk revisits a location.
    pub async fn resolve(&self, target: &BackupDescriptor) -> Result<BackupChain> {
        let mut newest_first: Vec<ChainLayer> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(target.clone());

        while let Some(backup) = next.take() {
            if !visited.insert(backup.location.clone()) {
                return Err(RestoreError::Metadata(format!(
                    "backup chain of {} loops back to {}",
                    target.location, backup.location
                )));
            }

            let metadata = fetch_metadata(self.storage, &backup).await?;
            match &metadata.parent {
                Some(parent) => {
                    info!("Found parent at {}", parent.location);
                    next = Some(parent.clone());
                }
                None => debug!("{} is a full backup", backup.location),
            }
            newest_first.push(ChainLayer { backup, metadata });
        }

        newest_first.reverse();
        info!(
            "Resolved backup chain of {} with {} layer(s)",
            target.location,
            newest_first.len()
        );
        Ok(BackupChain {
            layers: newest_first,
        })
    }
}
