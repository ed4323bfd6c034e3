use log::debug;
use regex::Regex;

use crate::{RestoreError, Result};

/// Separates benign diagnostics of a restoring process from fatal ones.
///
/// Patterns match from the start of a line.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    ignored: Vec<Regex>,
}

impl ErrorClassifier {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignored = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})")).map_err(|e| {
                    RestoreError::Config(format!("invalid ignored error pattern {p:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ignored })
    }

    pub fn is_ignored(&self, message: &str) -> bool {
        self.ignored.iter().any(|regex| regex.is_match(message))
    }

    /// Fails on the first line of `stderr` that no ignored pattern matches.
    ///
    /// Empty output is always accepted.
    pub fn check(&self, stderr: &[u8]) -> Result<()> {
        if stderr.is_empty() {
            return Ok(());
        }

        let text = String::from_utf8_lossy(stderr);
        for message in text.lines().filter(|line| !line.trim().is_empty()) {
            if !self.is_ignored(message) {
                return Err(RestoreError::Diagnostic(message.to_string()));
            }
            debug!("Ignoring benign restore message: {message}");
        }
        Ok(())
    }
}
