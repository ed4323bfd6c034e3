//! Storage access for PostgreSQL backup artifacts.
//!
//! Restores consume two things from storage: the archive bytes of a backup,
//! as a lazy stream, and the metadata mapping recorded for it (restore-point
//! label and, for incremental backups, the parent reference). Both are keyed
//! by a [`BackupDescriptor`], a `(location, checksum)` pair.
//!
//! Backends are provided for a local directory tree and for S3-compatible
//! object stores. Streamed content is verified against the descriptor's MD5
//! checksum as it is read.

mod checksum;
mod error;
mod integration;
mod local;
pub mod providers;
mod types;

pub use checksum::verify_md5;
pub use error::StorageError;
pub use integration::PostgresBackupStorage;
pub use local::LocalStorage;
pub use providers::*;
pub use types::*;

use async_trait::async_trait;

/// Read access to stored backups, as needed by the restore engine.
#[async_trait]
pub trait BackupStorage: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &str;

    /// Opens the archive of `backup` as a stream of chunks.
    async fn load(&self, backup: &BackupDescriptor) -> Result<ByteStream, StorageError>;

    /// Fetches the metadata mapping recorded for `backup`.
    async fn load_metadata(&self, backup: &BackupDescriptor) -> Result<Metadata, StorageError>;
}

/// Core storage provider interface for S3-compatible storage services.
#[async_trait]
pub trait StorageProvider: Send + Sync + 'static {
    /// Returns the name of the storage provider.
    fn name(&self) -> &str;

    /// Downloads an object as a stream of bytes.
    async fn download_stream(&self, bucket: &str, key: &str) -> Result<ByteStream, StorageError>;

    /// Gets metadata for an object.
    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata, StorageError>;
}

/// Factory for creating storage providers.
pub struct StorageProviderFactory;

impl StorageProviderFactory {
    pub async fn create_s3_provider(
        region: Option<String>,
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Box<dyn StorageProvider>, StorageError> {
        let kind = if endpoint.is_some() {
            ProviderKind::Other("custom-endpoint".to_string())
        } else {
            ProviderKind::Aws
        };
        let provider =
            providers::aws::S3Provider::new_with_kind(region, endpoint, access_key, secret_key, kind)
                .await?;
        Ok(Box::new(provider))
    }
}
