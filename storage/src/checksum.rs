//! MD5 verification of streamed backup content.

use futures::stream::{self, StreamExt};
use log::debug;
use std::io;

use crate::{ByteStream, StorageError};

struct VerifyState {
    inner: ByteStream,
    context: Option<md5::Context>,
    expected: String,
    location: String,
}

/// Wraps `stream` so that, once exhausted, its MD5 digest is compared with
/// `expected`. A mismatch is yielded as a final `InvalidData` error item.
///
/// An empty `expected` disables verification.
pub fn verify_md5(stream: ByteStream, expected: &str, location: &str) -> ByteStream {
    if expected.is_empty() {
        debug!("No checksum recorded for {location}, skipping verification");
        return stream;
    }

    let state = VerifyState {
        inner: stream,
        context: Some(md5::Context::new()),
        expected: expected.to_ascii_lowercase(),
        location: location.to_string(),
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        if state.context.is_none() {
            return None;
        }
        match state.inner.next().await {
            Some(Ok(chunk)) => {
                if let Some(context) = state.context.as_mut() {
                    context.consume(&chunk);
                }
                Some((Ok(chunk), state))
            }
            Some(Err(e)) => {
                state.context = None;
                Some((Err(e), state))
            }
            None => {
                let Some(context) = state.context.take() else {
                    return None;
                };
                let actual = format!("{:x}", context.compute());
                if actual == state.expected {
                    debug!("Checksum verified for {}", state.location);
                    None
                } else {
                    let err = StorageError::ChecksumMismatch {
                        location: state.location.clone(),
                        expected: state.expected.clone(),
                        actual,
                    };
                    Some((Err(io::Error::new(io::ErrorKind::InvalidData, err)), state))
                }
            }
        }
    }))
}
