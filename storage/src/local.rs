use async_trait::async_trait;
use log::{debug, error, info};
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::checksum::verify_md5;
use crate::{BackupDescriptor, BackupStorage, ByteStream, Metadata, StorageError};

const READ_CHUNK_SIZE: usize = 64 * 1024;
const METADATA_SUFFIX: &str = ".metadata.json";

/// Backups kept in a local directory tree.
///
/// Each archive lives at `<root>/<location>`, and its metadata mapping is a
/// JSON object stored next to it at `<root>/<location>.metadata.json`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, location: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if location.is_empty() || escapes {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn metadata_path(&self, location: &str) -> Result<PathBuf, StorageError> {
        let object = self.object_path(location)?;
        let mut name = object.into_os_string();
        name.push(METADATA_SUFFIX);
        Ok(PathBuf::from(name))
    }
}

fn not_found_or_io(err: std::io::Error, what: &Path) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(what.display().to_string())
    } else {
        error!("Failed to read {}: {}", what.display(), err);
        StorageError::Io(err)
    }
}

#[async_trait]
impl BackupStorage for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&self, backup: &BackupDescriptor) -> Result<ByteStream, StorageError> {
        let path = self.object_path(&backup.location)?;
        info!("Loading backup {} from {}", backup.location, path.display());
        let file = File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, &path))?;
        let stream = ReaderStream::with_capacity(file, READ_CHUNK_SIZE);
        Ok(verify_md5(
            Box::pin(stream),
            &backup.checksum,
            &backup.location,
        ))
    }

    async fn load_metadata(&self, backup: &BackupDescriptor) -> Result<Metadata, StorageError> {
        let path = self.metadata_path(&backup.location)?;
        debug!("Reading metadata from {}", path.display());
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| not_found_or_io(e, &path))?;
        let metadata: Metadata = serde_json::from_str(&json)?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_locations_outside_root() {
        let storage = LocalStorage::new("/backups");
        assert!(storage.object_path("../etc/passwd").is_err());
        assert!(storage.object_path("/etc/passwd").is_err());
        assert!(storage.object_path("").is_err());
        assert_eq!(
            storage.object_path("db/full.tar.gz").unwrap(),
            PathBuf::from("/backups/db/full.tar.gz")
        );
    }

    #[test]
    fn metadata_sits_next_to_archive() {
        let storage = LocalStorage::new("/backups");
        assert_eq!(
            storage.metadata_path("db/full.tar.gz").unwrap(),
            PathBuf::from("/backups/db/full.tar.gz.metadata.json")
        );
    }
}
