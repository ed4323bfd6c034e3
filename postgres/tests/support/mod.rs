//! In-memory collaborators for driving restore strategies in tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use postgres::{OperatingSystem, PgApp, RestoreOptions};
use storage::{
    BackupDescriptor, BackupStorage, ByteStream, Metadata, StorageError, LABEL_KEY,
    PARENT_CHECKSUM_KEY, PARENT_LOCATION_KEY,
};

const CHUNK_SIZE: usize = 4096;

/// Shared, ordered record of everything the fakes were asked to do.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }

    /// Events starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

struct StoredBackup {
    content: Vec<u8>,
    metadata: Metadata,
}

/// Backups held in memory. Loads are recorded as `load:<location>`.
pub struct MemoryStorage {
    backups: Mutex<HashMap<String, StoredBackup>>,
    broken: Mutex<HashSet<String>>,
    log: EventLog,
}

impl MemoryStorage {
    pub fn new(log: EventLog) -> Self {
        Self {
            backups: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            log,
        }
    }

    pub fn put(&self, location: &str, content: Vec<u8>, metadata: Metadata) -> BackupDescriptor {
        let checksum = format!("{:x}", md5::compute(&content));
        self.backups
            .lock()
            .unwrap()
            .insert(location.to_string(), StoredBackup { content, metadata });
        BackupDescriptor::new(location, checksum)
    }

    pub fn put_full(&self, location: &str, label: &str, content: Vec<u8>) -> BackupDescriptor {
        self.put(location, content, metadata(label, None))
    }

    pub fn put_incremental(
        &self,
        location: &str,
        label: &str,
        parent: &BackupDescriptor,
        content: Vec<u8>,
    ) -> BackupDescriptor {
        self.put(location, content, metadata(label, Some(parent)))
    }

    /// Streams of `location` fail after their first chunk.
    pub fn break_stream(&self, location: &str) {
        self.broken.lock().unwrap().insert(location.to_string());
    }
}

pub fn metadata(label: &str, parent: Option<&BackupDescriptor>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(LABEL_KEY.to_string(), label.to_string());
    if let Some(parent) = parent {
        metadata.insert(PARENT_LOCATION_KEY.to_string(), parent.location.clone());
        metadata.insert(PARENT_CHECKSUM_KEY.to_string(), parent.checksum.clone());
    }
    metadata
}

/// Splits `content` into a chunked stream, optionally failing after the first chunk.
pub fn chunked(content: &[u8], fail_after_first: bool) -> ByteStream {
    let mut chunks: Vec<Result<Bytes, io::Error>> = content
        .chunks(CHUNK_SIZE)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    if fail_after_first {
        chunks.truncate(1);
        chunks.push(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by storage",
        )));
    }
    Box::pin(futures::stream::iter(chunks))
}

#[async_trait]
impl BackupStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, backup: &BackupDescriptor) -> Result<ByteStream, StorageError> {
        self.log.push(format!("load:{}", backup.location));
        let backups = self.backups.lock().unwrap();
        let stored = backups
            .get(&backup.location)
            .ok_or_else(|| StorageError::NotFound(backup.location.clone()))?;
        let broken = self.broken.lock().unwrap().contains(&backup.location);
        Ok(chunked(&stored.content, broken))
    }

    async fn load_metadata(&self, backup: &BackupDescriptor) -> Result<Metadata, StorageError> {
        self.backups
            .lock()
            .unwrap()
            .get(&backup.location)
            .map(|stored| stored.metadata.clone())
            .ok_or_else(|| StorageError::NotFound(backup.location.clone()))
    }
}

/// PostgreSQL service stand-in with real directories under a temp root.
pub struct FakeApp {
    pub data_dir: PathBuf,
    pub wal_archive_dir: PathBuf,
    log: EventLog,
}

impl FakeApp {
    pub fn new(root: &Path, log: EventLog) -> Self {
        let data_dir = root.join("data");
        let wal_archive_dir = root.join("wal_archive");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(&wal_archive_dir).unwrap();
        Self {
            data_dir,
            wal_archive_dir,
            log,
        }
    }
}

#[async_trait]
impl PgApp for FakeApp {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn wal_archive_dir(&self) -> &Path {
        &self.wal_archive_dir
    }

    fn owner(&self) -> &str {
        "postgres"
    }

    async fn stop_db(&self) -> postgres::Result<()> {
        self.log.push("stop_db");
        Ok(())
    }

    async fn recreate_wal_archive_dir(&self) -> postgres::Result<()> {
        self.log.push("recreate_wal_archive_dir");
        if self.wal_archive_dir.exists() {
            std::fs::remove_dir_all(&self.wal_archive_dir)?;
        }
        std::fs::create_dir_all(&self.wal_archive_dir)?;
        Ok(())
    }
}

/// Filesystem collaborator acting on real paths; ownership changes are only recorded.
pub struct RecordingOs {
    log: EventLog,
    fail_on: Mutex<Option<String>>,
}

impl RecordingOs {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_on: Mutex::new(None),
        }
    }

    /// Fails every operation whose event starts with `prefix`.
    pub fn fail_on(&self, prefix: &str) {
        *self.fail_on.lock().unwrap() = Some(prefix.to_string());
    }

    fn record(&self, event: String) -> postgres::Result<()> {
        let denied = matches!(&*self.fail_on.lock().unwrap(), Some(prefix) if event.starts_with(prefix.as_str()));
        self.log.push(event.clone());
        if denied {
            return Err(postgres::RestoreError::Permission(format!("{event} denied")));
        }
        Ok(())
    }
}

#[async_trait]
impl OperatingSystem for RecordingOs {
    async fn remove(&self, path: &Path) -> postgres::Result<()> {
        self.record(format!("remove:{}", path.display()))?;
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn create_directory(&self, path: &Path, owner: &str) -> postgres::Result<()> {
        self.record(format!("create_directory:{}:{owner}", path.display()))?;
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    async fn chmod(&self, path: &Path, mode: u32, recursive: bool) -> postgres::Result<()> {
        self.record(format!("chmod:{}:{mode:o}:{recursive}", path.display()))?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    async fn chown(&self, path: &Path, owner: &str, recursive: bool) -> postgres::Result<()> {
        self.record(format!("chown:{}:{owner}:{recursive}", path.display()))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> postgres::Result<()> {
        self.record(format!("write_file:{}", path.display()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Uncompressed, unencrypted archives extracted as the current user.
pub fn plain_options() -> RestoreOptions {
    RestoreOptions {
        compressed: false,
        encryption_key: None,
        use_sudo: false,
        ..RestoreOptions::default()
    }
}

/// Builds an in-memory tar archive of `files`.
pub fn tar_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

/// A storage, service and filesystem wired to one event log.
pub struct Harness {
    pub log: EventLog,
    pub storage: Arc<MemoryStorage>,
    pub app: Arc<FakeApp>,
    pub os: Arc<RecordingOs>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        Self {
            storage: Arc::new(MemoryStorage::new(log.clone())),
            app: Arc::new(FakeApp::new(dir.path(), log.clone())),
            os: Arc::new(RecordingOs::new(log.clone())),
            log,
            dir,
        }
    }

    pub fn runner(&self, backup: BackupDescriptor, options: RestoreOptions) -> postgres::RestoreRunner {
        postgres::RestoreRunner::new(self.storage.clone(), backup, options).unwrap()
    }
}
