use futures::StreamExt;
use log::{debug, info, warn};
use std::io;
use std::process::Stdio;
use storage::ByteStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

use crate::restore::classifier::ErrorClassifier;
use crate::restore::command::RestoreCommand;
use crate::{RestoreError, Result};

/// Pipes a backup stream into a restore command.
///
/// The child's stderr is drained on its own task for the lifetime of the
/// process, so a chatty child can never stall the stdin writer on a full pipe.
#[derive(Debug, Clone)]
pub struct StreamingRestoreExecutor {
    classifier: ErrorClassifier,
}

fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut diagnostics = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut diagnostics).await {
            // The process is gone; whatever was captured is all there is.
            warn!("Could not read restore diagnostics: {e}");
        }
        diagnostics
    })
}

async fn abort(mut child: Child, stderr: JoinHandle<Vec<u8>>) {
    if let Err(e) = child.start_kill() {
        debug!("Restore process already exited: {e}");
    }
    let _ = child.wait().await;
    let _ = stderr.await;
}

impl StreamingRestoreExecutor {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Streams `stream` into `command` and returns the number of bytes written.
    pub async fn execute(&self, mut stream: ByteStream, command: &RestoreCommand) -> Result<u64> {
        debug!("Running restore command: {command}");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command.render())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RestoreError::execution(RestoreError::Io(e)))?;

        let (Some(mut stdin), Some(stderr)) = (child.stdin.take(), child.stderr.take()) else {
            return Err(RestoreError::execution(RestoreError::Io(io::Error::other(
                "restore process pipes were not captured",
            ))));
        };
        let diagnostics = drain_stderr(stderr);

        let mut content_length: u64 = 0;
        let mut input_closed = false;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Backup stream failed after {content_length} bytes: {e}");
                    drop(stdin);
                    abort(child, diagnostics).await;
                    return Err(RestoreError::execution(RestoreError::Io(e)));
                }
            };

            match stdin.write_all(&chunk).await {
                Ok(()) => content_length += chunk.len() as u64,
                // Only a failed write reveals unread input; a child that exits
                // before a buffered write is drained goes unnoticed.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    warn!("Restore process closed its input after {content_length} bytes");
                    input_closed = true;
                    break;
                }
                Err(e) => {
                    drop(stdin);
                    abort(child, diagnostics).await;
                    return Err(RestoreError::execution(RestoreError::Io(e)));
                }
            }
        }
        // Closing stdin signals end of input.
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| RestoreError::execution(RestoreError::Io(e)))?;
        let diagnostics = diagnostics.await.unwrap_or_else(|e| {
            warn!("Restore diagnostics task failed: {e}");
            Vec::new()
        });

        self.classifier.check(&diagnostics)?;

        if !status.success() {
            return Err(RestoreError::execution(RestoreError::CommandFailed(
                status.to_string(),
            )));
        }
        if input_closed {
            return Err(RestoreError::execution(RestoreError::InputNotConsumed(
                content_length,
            )));
        }

        info!("Restored {} bytes from stream.", content_length);
        Ok(content_length)
    }
}
