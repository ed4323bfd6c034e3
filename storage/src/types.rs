use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

use crate::StorageError;

/// Lazy, finite, non-restartable sequence of archive chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Custom metadata for objects
pub type Metadata = HashMap<String, String>;

pub const LABEL_KEY: &str = "label";
pub const PARENT_LOCATION_KEY: &str = "parent_location";
pub const PARENT_CHECKSUM_KEY: &str = "parent_checksum";

/// Represents metadata for an object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Key (path) of the object
    pub key: String,
    /// Size of the object in bytes
    pub size: Option<u64>,
    /// Last modified time
    pub last_modified: Option<DateTime<Utc>>,
    /// ETag of the object
    pub etag: Option<String>,
    /// Content type of the object
    pub content_type: Option<String>,
    /// Custom metadata
    pub metadata: Option<Metadata>,
}

/// Supported storage provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageProviderType {
    /// Directory on the local filesystem
    #[serde(rename = "local")]
    Local,
    /// Amazon S3 and compatible services
    #[serde(rename = "s3")]
    S3,
}

impl std::str::FromStr for StorageProviderType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageProviderType::Local),
            "s3" => Ok(StorageProviderType::S3),
            other => Err(StorageError::Configuration(format!(
                "Unsupported storage provider: {other}"
            ))),
        }
    }
}

/// Identifies a stored backup artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackupDescriptor {
    /// Opaque storage key
    pub location: String,
    /// Hex MD5 of the stored content
    pub checksum: String,
}

impl BackupDescriptor {
    pub fn new(location: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            checksum: checksum.into(),
        }
    }
}

impl fmt::Display for BackupDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.location, self.checksum)
    }
}

/// Parsed backup metadata. A `parent` of `None` marks a full backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub label: String,
    pub parent: Option<BackupDescriptor>,
}

impl BackupMetadata {
    /// Parses the raw metadata mapping stored next to the backup at `location`.
    pub fn parse(location: &str, metadata: &Metadata) -> Result<Self, StorageError> {
        // The label names a restore point and is kept exactly as stored.
        let label = metadata
            .get(LABEL_KEY)
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                StorageError::InvalidMetadata(format!("Backup {location} has no label"))
            })?
            .clone();

        let parent = match (
            metadata.get(PARENT_LOCATION_KEY),
            metadata.get(PARENT_CHECKSUM_KEY),
        ) {
            (Some(parent_location), Some(parent_checksum)) => Some(BackupDescriptor::new(
                parent_location.clone(),
                parent_checksum.clone(),
            )),
            (None, None) => None,
            (Some(_), None) => {
                return Err(StorageError::InvalidMetadata(format!(
                    "Backup {location} has {PARENT_LOCATION_KEY} without {PARENT_CHECKSUM_KEY}"
                )))
            }
            (None, Some(_)) => {
                return Err(StorageError::InvalidMetadata(format!(
                    "Backup {location} has {PARENT_CHECKSUM_KEY} without {PARENT_LOCATION_KEY}"
                )))
            }
        };

        Ok(Self { label, parent })
    }

    pub fn is_full(&self) -> bool {
        self.parent.is_none()
    }
}
