pub mod app;
pub mod cli;
pub mod common;
pub mod manager;
pub mod operating_system;
pub mod restore;

use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    /// The restoring process printed a message that is not a known benign warning.
    #[error("Restore diagnostic: {0}")]
    Diagnostic(String),

    #[error("Restore execution failed{}: {source}", layer_suffix(.layer))]
    Execution {
        /// Location of the chain layer being applied, when known
        layer: Option<String>,
        #[source]
        source: Box<RestoreError>,
    },

    #[error("Restore command exited with {0}")]
    CommandFailed(String),

    #[error("Restore command stopped reading its input after {0} bytes")]
    InputNotConsumed(u64),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown restore strategy: {0}")]
    UnknownStrategy(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn layer_suffix(layer: &Option<String>) -> String {
    match layer {
        Some(location) => format!(" at layer {location}"),
        None => String::new(),
    }
}

impl RestoreError {
    pub(crate) fn execution(source: RestoreError) -> Self {
        RestoreError::Execution {
            layer: None,
            source: Box::new(source),
        }
    }

    /// Attributes the error to the chain layer stored at `location`.
    pub fn in_layer(self, location: &str) -> Self {
        match self {
            RestoreError::Execution {
                layer: None,
                source,
            } => RestoreError::Execution {
                layer: Some(location.to_string()),
                source,
            },
            err @ RestoreError::Execution { .. } => err,
            other => RestoreError::Execution {
                layer: Some(location.to_string()),
                source: Box::new(other),
            },
        }
    }

    /// The chain layer an execution error was attributed to.
    pub fn layer(&self) -> Option<&str> {
        match self {
            RestoreError::Execution { layer, .. } => layer.as_deref(),
            _ => None,
        }
    }

    /// The offending diagnostic line, looking through execution wrappers.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RestoreError::Diagnostic(message) => Some(message),
            RestoreError::Execution { source, .. } => source.diagnostic(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;

// Re-export key types for convenience
pub use app::{PgApp, SystemPgApp};
pub use crate::common::{Restore, RestoreStatus};
pub use manager::PostgresRestoreManager;
pub use operating_system::{FileMode, HostOs, OperatingSystem};
pub use restore::{
    RestoreOptions, RestoreRunner, RestoreStrategy, RestoreStrategyFactory, StrategyKind,
};
