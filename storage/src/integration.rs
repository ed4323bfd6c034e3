use async_trait::async_trait;
use log::{info, warn};

use crate::checksum::verify_md5;
use crate::{
    BackupDescriptor, BackupStorage, ByteStream, Metadata, StorageError, StorageProvider,
    StorageProviderFactory, StorageProviderType,
};

/// PostgreSQL backups kept in an S3-compatible bucket.
///
/// A backup location is an object key relative to `prefix`; its restore
/// metadata is the object's user metadata.
pub struct PostgresBackupStorage {
    /// Storage provider
    provider: Box<dyn StorageProvider>,
    /// Bucket name
    bucket: String,
    /// Base prefix for backups
    prefix: String,
}

impl PostgresBackupStorage {
    /// Creates a new PostgreSQL backup storage
    pub async fn new(
        provider_type: StorageProviderType,
        bucket: String,
        prefix: Option<String>,
        region: Option<String>,
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, StorageError> {
        let provider = match provider_type {
            StorageProviderType::S3 => {
                StorageProviderFactory::create_s3_provider(region, endpoint, access_key, secret_key)
                    .await?
            }
            StorageProviderType::Local => {
                return Err(StorageError::Configuration(
                    "local storage is not bucket based, use LocalStorage".to_string(),
                ))
            }
        };

        Ok(Self::with_provider(provider, bucket, prefix))
    }

    pub fn with_provider(
        provider: Box<dyn StorageProvider>,
        bucket: String,
        prefix: Option<String>,
    ) -> Self {
        Self {
            provider,
            bucket,
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
        }
    }

    fn key(&self, location: &str) -> String {
        let location = location.trim_start_matches('/');
        if self.prefix.is_empty() {
            location.to_string()
        } else {
            format!("{}/{}", self.prefix, location)
        }
    }
}

#[async_trait]
impl BackupStorage for PostgresBackupStorage {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn load(&self, backup: &BackupDescriptor) -> Result<ByteStream, StorageError> {
        let key = self.key(&backup.location);
        info!("Streaming backup {}/{} from {}", self.bucket, key, self.provider.name());
        let stream = self.provider.download_stream(&self.bucket, &key).await?;
        Ok(verify_md5(stream, &backup.checksum, &backup.location))
    }

    async fn load_metadata(&self, backup: &BackupDescriptor) -> Result<Metadata, StorageError> {
        let key = self.key(&backup.location);
        let object = self.provider.get_object_metadata(&self.bucket, &key).await?;

        if let Some(etag) = object.etag.as_deref().map(|e| e.trim_matches('"')) {
            // Multipart ETags are not content MD5s, so only warn.
            if !backup.checksum.is_empty() && !etag.eq_ignore_ascii_case(&backup.checksum) {
                warn!(
                    "ETag {} of {}/{} differs from recorded checksum {}",
                    etag, self.bucket, key, backup.checksum
                );
            }
        }

        Ok(object.metadata.unwrap_or_default())
    }
}
