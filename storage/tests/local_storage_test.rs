//! Integration tests for the local directory storage backend

use bytes::Bytes;
use futures::TryStreamExt;
use rand::Rng;
use std::fs;
use std::path::Path;
use storage::{BackupDescriptor, BackupMetadata, BackupStorage, LocalStorage, StorageError};
use tempfile::tempdir;

fn write_backup(root: &Path, location: &str, body: &[u8], metadata: &str) -> BackupDescriptor {
    let path = root.join(location);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    fs::write(root.join(format!("{location}.metadata.json")), metadata).unwrap();
    BackupDescriptor::new(location, format!("{:x}", md5::compute(body)))
}

#[tokio::test]
async fn streams_large_archive_in_chunks() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let mut body = vec![0u8; 1024 * 1024 + 17];
    rand::rng().fill(&mut body[..]);
    let backup = write_backup(dir.path(), "pg/base.tar", &body, r#"{"label": "base"}"#);

    let storage = LocalStorage::new(dir.path());
    let chunks: Vec<Bytes> = storage.load(&backup).await.unwrap().try_collect().await.unwrap();

    assert!(chunks.len() > 1, "expected a chunked stream");
    assert_eq!(chunks.concat(), body);
}

#[tokio::test]
async fn reads_metadata_side_car() {
    let dir = tempdir().unwrap();
    let backup = write_backup(
        dir.path(),
        "pg/incr-1.tar",
        b"incremental",
        r#"{"label": "incr-1", "parent_location": "pg/base.tar", "parent_checksum": "abc"}"#,
    );

    let storage = LocalStorage::new(dir.path());
    let raw = storage.load_metadata(&backup).await.unwrap();
    let parsed = BackupMetadata::parse(&backup.location, &raw).unwrap();

    assert_eq!(parsed.label, "incr-1");
    assert_eq!(parsed.parent, Some(BackupDescriptor::new("pg/base.tar", "abc")));
}

#[tokio::test]
async fn corrupted_archive_fails_checksum() {
    let dir = tempdir().unwrap();
    let mut backup = write_backup(dir.path(), "base.tar", b"original", r#"{"label": "x"}"#);
    backup.checksum = format!("{:x}", md5::compute(b"something else"));

    let storage = LocalStorage::new(dir.path());
    let result: Result<Vec<Bytes>, std::io::Error> =
        storage.load(&backup).await.unwrap().try_collect().await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn missing_backup_is_not_found() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let backup = BackupDescriptor::new("nope.tar", "");

    assert!(matches!(
        storage.load(&backup).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.load_metadata(&backup).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn malformed_metadata_is_a_serialization_error() {
    let dir = tempdir().unwrap();
    let backup = write_backup(dir.path(), "base.tar", b"x", "not json");
    let storage = LocalStorage::new(dir.path());

    assert!(matches!(
        storage.load_metadata(&backup).await,
        Err(StorageError::Serialization(_))
    ));
}
