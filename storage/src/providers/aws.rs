use crate::{ByteStream, ObjectMetadata, StorageError, StorageProvider};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::{operation::get_object::GetObjectOutput, Client};
use chrono::{TimeZone, Utc};
use log::{debug, error, info};
use tokio_util::io::ReaderStream;

/// Which S3 service a provider talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Aws,
    /// S3-compatible service behind a custom endpoint
    Other(String),
}

pub struct S3Provider {
    /// S3 client
    client: Client,
    provider_kind: ProviderKind,
}

fn map_sdk_error(bucket: &str, key: &str, msg: String) -> StorageError {
    if msg.contains("NotFound") || msg.contains("NoSuchKey") || msg.contains("404") {
        StorageError::NotFound(format!("Object {bucket}/{key} not found"))
    } else {
        StorageError::Aws(msg)
    }
}

impl S3Provider {
    /// Creates a new S3 provider
    pub async fn new_with_kind(
        region: Option<String>,
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
        provider_kind: ProviderKind,
    ) -> Result<Self, StorageError> {
        let region = Region::new(region.unwrap_or_else(|| "us-east-1".to_string()));
        info!("Initializing S3Provider for {provider_kind:?}");

        let mut config_builder = aws_config::defaults(BehaviorVersion::v2025_01_17())
            .region(region)
            .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(3));

        match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = aws_credential_types::Credentials::new(
                    access_key, secret_key, None, None, "explicit",
                );
                config_builder = config_builder
                    .credentials_provider(SharedCredentialsProvider::new(credentials));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::Configuration(
                    "access_key and secret_key must be given together".to_string(),
                ))
            }
        }

        // S3-compatible services generally need path-style addressing.
        let force_path_style = endpoint.is_some();
        if let Some(ref ep) = endpoint {
            info!("Using custom endpoint: {ep}");
            config_builder = config_builder.endpoint_url(ep.clone());
        }

        let sdk_config = config_builder.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            provider_kind,
        })
    }

    /// Helper: fetch object from S3 with error mapping
    async fn get_object_with_error_handling(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<GetObjectOutput, StorageError> {
        self.client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to get object {bucket}/{key}: {e}");
                map_sdk_error(bucket, key, e.to_string())
            })
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    fn name(&self) -> &str {
        match self.provider_kind {
            ProviderKind::Aws => "AWS S3",
            ProviderKind::Other(ref name) => name.as_str(),
        }
    }

    async fn download_stream(&self, bucket: &str, key: &str) -> Result<ByteStream, StorageError> {
        let resp = self.get_object_with_error_handling(bucket, key).await?;
        debug!(
            "Opened {bucket}/{key} for streaming ({:?} bytes)",
            resp.content_length()
        );
        let reader = resp.body.into_async_read();
        Ok(Box::pin(ReaderStream::new(reader)))
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(bucket, key, e.to_string()))?;

        let size = resp.content_length().map(|s| s as u64);
        let last_modified = resp
            .last_modified()
            .and_then(|dt| Utc.timestamp_opt(dt.secs(), 0).single());
        let metadata = resp.metadata().filter(|meta| !meta.is_empty()).cloned();

        Ok(ObjectMetadata {
            key: key.to_string(),
            size,
            last_modified,
            etag: resp.e_tag().map(|s| s.to_string()),
            content_type: resp.content_type().map(|s| s.to_string()),
            metadata,
        })
    }
}
