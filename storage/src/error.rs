use std::fmt;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// AWS SDK error
    Aws(String),
    /// Streamed content does not hash to the expected checksum
    ChecksumMismatch {
        location: String,
        expected: String,
        actual: String,
    },
    /// Configuration error
    Configuration(String),
    /// Location is not a valid key for the backend
    InvalidLocation(String),
    /// Backup metadata is present but malformed
    InvalidMetadata(String),
    /// I/O error
    Io(std::io::Error),
    /// Object not found
    NotFound(String),
    /// Serialization/deserialization error
    Serialization(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Aws(msg) => write!(f, "AWS SDK error: {}", msg),
            StorageError::ChecksumMismatch {
                location,
                expected,
                actual,
            } => write!(
                f,
                "Checksum mismatch for {}: expected {}, got {}",
                location, expected, actual
            ),
            StorageError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            StorageError::InvalidLocation(msg) => write!(f, "Invalid location: {}", msg),
            StorageError::InvalidMetadata(msg) => write!(f, "Invalid metadata: {}", msg),
            StorageError::Io(err) => write!(f, "I/O error: {}", err),
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
