use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::BackupDescriptor;
use uuid::Uuid;

/// Restore status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreStatus {
    InProgress,
    Completed,
    Failed,
}

/// Represents a restore operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restore {
    pub id: Uuid,
    pub strategy: String,
    pub backup: BackupDescriptor,
    pub status: RestoreStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub bytes_restored: Option<u64>,
    pub error_message: Option<String>,
}

impl Restore {
    pub fn new(strategy: impl Into<String>, backup: BackupDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            backup,
            status: RestoreStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            bytes_restored: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, bytes_restored: u64) {
        self.status = RestoreStatus::Completed;
        self.end_time = Some(Utc::now());
        self.bytes_restored = Some(bytes_restored);
    }

    pub fn fail(&mut self, error_message: String) {
        self.status = RestoreStatus::Failed;
        self.end_time = Some(Utc::now());
        self.error_message = Some(error_message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_records_bytes() {
        let mut restore = Restore::new("pg_dump", BackupDescriptor::new("a", "b"));
        assert_eq!(restore.status, RestoreStatus::InProgress);
        restore.complete(42);
        assert_eq!(restore.status, RestoreStatus::Completed);
        assert_eq!(restore.bytes_restored, Some(42));
        assert!(restore.end_time.is_some());
    }

    #[test]
    fn failing_records_message() {
        let mut restore = Restore::new("pg_dump", BackupDescriptor::new("a", "b"));
        restore.fail("boom".to_string());
        assert_eq!(restore.status, RestoreStatus::Failed);
        assert_eq!(restore.error_message.as_deref(), Some("boom"));
        assert!(restore.bytes_restored.is_none());
    }
}
