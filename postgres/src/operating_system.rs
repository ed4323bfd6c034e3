//! Filesystem primitives used while preparing and finishing a restore.

use async_trait::async_trait;
use log::{debug, info};
use std::ffi::OsString;
use std::fs::Permissions;
use std::io;
use std::process::Stdio;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::{RestoreError, Result};

/// Permission modes applied during restores.
pub struct FileMode;

impl FileMode {
    /// `rwx------`
    pub const SET_USR_RWX: u32 = 0o700;
    /// `rw-------`
    pub const SET_USR_RW: u32 = 0o600;
}

/// Filesystem collaborator. `owner` is used as both user and group.
#[async_trait]
pub trait OperatingSystem: Send + Sync {
    /// Removes `path` recursively. A missing path is not an error.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Creates `path` (and parents) owned by `owner`.
    async fn create_directory(&self, path: &Path, owner: &str) -> Result<()>;

    async fn chmod(&self, path: &Path, mode: u32, recursive: bool) -> Result<()>;

    async fn chown(&self, path: &Path, owner: &str, recursive: bool) -> Result<()>;

    /// Writes `contents` as-is, replacing any existing file.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Operates on the host filesystem.
///
/// With `use_sudo` every primitive runs as root through `sudo`, since the
/// data directory ends up owned by the PostgreSQL account with mode 0700.
/// Without it the agent's own privileges are used and only ownership changes
/// shell out to `chown`.
pub struct HostOs {
    use_sudo: bool,
}

impl HostOs {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    /// Command line for `program args..`, prefixed with `sudo` when configured.
    fn argv(&self, program: &str, args: Vec<OsString>) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if self.use_sudo {
            argv.push(OsString::from("sudo"));
        }
        argv.push(OsString::from(program));
        argv.extend(args);
        argv
    }

    fn remove_argv(&self, path: &Path) -> Vec<OsString> {
        self.argv("rm", vec!["-rf".into(), path.into()])
    }

    fn mkdir_argv(&self, path: &Path) -> Vec<OsString> {
        self.argv("mkdir", vec!["-p".into(), path.into()])
    }

    fn chmod_argv(&self, path: &Path, mode: u32, recursive: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if recursive {
            args.push("-R".into());
        }
        args.push(format!("{mode:o}").into());
        args.push(path.into());
        self.argv("chmod", args)
    }

    fn chown_argv(&self, path: &Path, owner: &str, recursive: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if recursive {
            args.push("-R".into());
        }
        args.push(format!("{owner}:{owner}").into());
        args.push(path.into());
        self.argv("chown", args)
    }

    fn write_argv(&self, path: &Path) -> Vec<OsString> {
        self.argv("tee", vec![path.into()])
    }

    /// Runs `argv`, feeding `input` on stdin when given.
    async fn run(&self, argv: Vec<OsString>, input: Option<&[u8]>) -> Result<()> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RestoreError::Io(io::Error::other("empty command line")));
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Running {cmd:?}");
        let mut child = cmd.spawn()?;
        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), input) {
            stdin.write_all(input).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RestoreError::Permission(format!(
                "{} failed ({}): {}",
                argv.iter()
                    .map(|a| a.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn chmod_tree(path: PathBuf, mode: u32, recursive: bool) -> io::Result<usize> {
    let walker = WalkDir::new(&path)
        .follow_links(false)
        .max_depth(if recursive { usize::MAX } else { 0 });

    let mut changed = 0;
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        // Symlink modes are ignored on Linux; setting them would follow the link.
        if entry.file_type().is_symlink() {
            continue;
        }
        std::fs::set_permissions(entry.path(), Permissions::from_mode(mode))?;
        changed += 1;
    }
    Ok(changed)
}

#[async_trait]
impl OperatingSystem for HostOs {
    async fn remove(&self, path: &Path) -> Result<()> {
        if self.use_sudo {
            info!("Removing {}", path.display());
            return self.run(self.remove_argv(path), None).await;
        }

        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist, nothing to remove", path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        info!("Removing {}", path.display());
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn create_directory(&self, path: &Path, owner: &str) -> Result<()> {
        if self.use_sudo {
            self.run(self.mkdir_argv(path), None).await?;
        } else {
            tokio::fs::create_dir_all(path).await?;
        }
        self.chown(path, owner, false).await
    }

    async fn chmod(&self, path: &Path, mode: u32, recursive: bool) -> Result<()> {
        if self.use_sudo {
            return self.run(self.chmod_argv(path, mode, recursive), None).await;
        }

        let target = path.to_path_buf();
        let changed = tokio::task::spawn_blocking(move || chmod_tree(target, mode, recursive))
            .await
            .map_err(|e| RestoreError::Io(io::Error::other(e)))??;
        debug!("Set mode {:o} on {} entries under {}", mode, changed, path.display());
        Ok(())
    }

    async fn chown(&self, path: &Path, owner: &str, recursive: bool) -> Result<()> {
        self.run(self.chown_argv(path, owner, recursive), None).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.use_sudo {
            return self.run(self.write_argv(path), Some(contents)).await;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}
