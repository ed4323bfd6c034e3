use std::fmt;
use std::path::Path;

use crate::restore::RestoreOptions;

const UNZIP_CMD: &str = "gzip -d -c";

/// Shell pipeline fed with a backup stream on stdin:
/// `[decrypt | ][unzip | ]<base>`.
#[derive(Clone, PartialEq, Eq)]
pub struct RestoreCommand {
    base: String,
    unzip: bool,
    decrypt_key: Option<String>,
}

impl RestoreCommand {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            unzip: false,
            decrypt_key: None,
        }
    }

    pub fn from_options(base: impl Into<String>, options: &RestoreOptions) -> Self {
        Self {
            base: base.into(),
            unzip: options.compressed,
            decrypt_key: options.encryption_key.clone(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The full command line handed to `sh -c`.
    pub fn render(&self) -> String {
        self.pipeline(self.decrypt_key.as_deref())
    }

    fn pipeline(&self, key: Option<&str>) -> String {
        let mut cmd = String::new();
        if let Some(key) = key {
            cmd.push_str(&format!(
                "openssl enc -d -aes-256-cbc -salt -pass pass:{} | ",
                shell_quote(key)
            ));
        }
        if self.unzip {
            cmd.push_str(UNZIP_CMD);
            cmd.push_str(" | ");
        }
        cmd.push_str(&self.base);
        cmd
    }
}

// Keeps the decryption key out of logs.
impl fmt::Display for RestoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.decrypt_key.as_ref().map(|_| "****");
        f.write_str(&self.pipeline(masked))
    }
}

impl fmt::Debug for RestoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RestoreCommand({self})")
    }
}

/// Prefixes `cmd` with `sudo -u <owner>` when requested.
pub fn as_owner(owner: &str, use_sudo: bool, cmd: &str) -> String {
    if use_sudo {
        format!("sudo -u {} {}", shell_quote(owner), cmd)
    } else {
        cmd.to_string()
    }
}

pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Single-quotes `value` for `sh` unless it is made only of safe characters.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(compressed: bool, key: Option<&str>) -> RestoreOptions {
        RestoreOptions {
            compressed,
            encryption_key: key.map(str::to_string),
            ..RestoreOptions::default()
        }
    }

    #[test]
    fn plain_command_is_just_the_base() {
        let cmd = RestoreCommand::from_options("psql -U os_admin", &options(false, None));
        assert_eq!(cmd.render(), "psql -U os_admin");
    }

    #[test]
    fn compressed_and_encrypted_pipeline_order() {
        let cmd = RestoreCommand::from_options("tar xCf /data -", &options(true, Some("k3y")));
        assert_eq!(
            cmd.render(),
            "openssl enc -d -aes-256-cbc -salt -pass pass:k3y | gzip -d -c | tar xCf /data -"
        );
    }

    #[test]
    fn display_masks_the_key() {
        let cmd = RestoreCommand::from_options("tar xf -", &options(false, Some("s3cret")));
        assert!(!cmd.to_string().contains("s3cret"));
        assert!(!format!("{cmd:?}").contains("s3cret"));
        assert!(cmd.render().contains("s3cret"));
    }

    #[test]
    fn sudo_prefix_is_optional() {
        assert_eq!(as_owner("postgres", true, "tar xf -"), "sudo -u postgres tar xf -");
        assert_eq!(as_owner("postgres", false, "tar xf -"), "tar xf -");
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/var/lib/postgresql/data"), "/var/lib/postgresql/data");
        assert_eq!(shell_quote("/mnt/my wal"), "'/mnt/my wal'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
